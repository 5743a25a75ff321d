use futures::TryStreamExt as _;
use mongodb::bson::{Bson, Document};
use tracing::trace;

use crate::{
    constants::{FIRST_REC_NUM, REC_NUM_FIELD},
    store::FindSpec,
    Result,
    ShelterError,
};
use super::coll::AnimalShelter;

#[allow(clippy::multiple_inherent_impl, reason = "multiple impl blocks for AnimalShelter are intentional for organization")]
impl AnimalShelter {
    /// Returns the record number the next created document will receive.
    ///
    /// The answer is one more than the larger of the highest stored `rec_num`
    /// and the last number the store's counter handed out, so numbers freed by
    /// a delete are not offered again. A collection that has never been
    /// numbered yields 1.
    ///
    /// This is a plain read: calling it does not reserve the number.
    ///
    /// # Errors
    ///
    /// Returns `ShelterError::InvalidRecordNumber` if the stored maximum is not
    /// an integer, or a store error if a lookup fails.
    pub async fn next_record_number(&self) -> Result<i64> {
        let stored = self.stored_maximum().await?;
        let issued = self.store.counter_value(REC_NUM_FIELD).await?;
        let next = match stored.max(issued) {
            Some(current) => successor(current)?,
            None => FIRST_REC_NUM,
        };
        trace!("Next rec_num for {} is {}", self.name(), next);
        Ok(next)
    }

    /// Takes the next record number from the store's counter.
    ///
    /// The counter is first raised to the highest stored `rec_num`, which
    /// covers documents numbered before the counter existed and `rec_num`
    /// values written by `update`.
    pub(crate) async fn reserve_record_number(&self) -> Result<i64> {
        let floor = self
            .stored_maximum()
            .await?
            .unwrap_or(FIRST_REC_NUM.saturating_sub(1));
        let rec_num = self.store.advance_counter(REC_NUM_FIELD, floor).await?;
        trace!("Reserved rec_num {} for {}", rec_num, self.name());
        Ok(rec_num)
    }

    /// Highest `rec_num` currently stored. A top document without one counts
    /// as unnumbered.
    async fn stored_maximum(&self) -> Result<Option<i64>> {
        let mut projection = Document::new();
        projection.insert(REC_NUM_FIELD, 1_i32);
        let mut sort = Document::new();
        sort.insert(REC_NUM_FIELD, -1_i32);
        let spec = FindSpec::new().projection(projection).sort(sort).limit(1);

        let mut top = self.store.find(Document::new(), spec).await?;
        match top.try_next().await? {
            Some(doc) => Ok(Some(record_number_of(&doc)?.unwrap_or(0))),
            None => Ok(None),
        }
    }
}

fn successor(current: i64) -> Result<i64> {
    current.checked_add(1).ok_or_else(|| {
        ShelterError::InvalidRecordNumber {
            value: current.to_string(),
        }
    })
}

/// Reads `rec_num` from a document, tolerating every numeric BSON width.
#[allow(clippy::as_conversions, reason = "finite doubles are truncated like an integer cast")]
fn record_number_of(doc: &Document) -> Result<Option<i64>> {
    let invalid = |value: &Bson| {
        ShelterError::InvalidRecordNumber {
            value: value.to_string(),
        }
    };
    match doc.get(REC_NUM_FIELD) {
        None | Some(&Bson::Null) => Ok(None),
        Some(&Bson::Int32(n)) => Ok(Some(i64::from(n))),
        Some(&Bson::Int64(n)) => Ok(Some(n)),
        Some(&Bson::Double(n)) if n.is_finite() => Ok(Some(n.trunc() as i64)),
        Some(value @ &Bson::String(ref text)) => text.trim().parse::<i64>().map(Some).map_err(|_| invalid(value)),
        Some(other) => Err(invalid(other)),
    }
}
