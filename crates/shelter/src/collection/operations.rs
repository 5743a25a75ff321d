use futures::stream;
use mongodb::bson::{Bson, Document};
use tracing::{debug, error, trace, warn};

use crate::{
    constants::{ID_FIELD, REC_NUM_FIELD},
    store::{DocumentStream, FindSpec},
    Result,
};
use super::{coll::AnimalShelter, input::documents_from};

#[allow(clippy::multiple_inherent_impl, reason = "multiple impl blocks for AnimalShelter are intentional for organization")]
impl AnimalShelter {
    /// Inserts one document, or each document of a list in order, giving every
    /// inserted document the next `rec_num`.
    ///
    /// Any caller-supplied `_id` or `rec_num` is discarded first: the store
    /// assigns `_id` and the accessor assigns `rec_num` from the store's
    /// counter, so a number is never handed out twice. The whole list is
    /// numbered and inserted under the accessor's lock, so it receives
    /// consecutive numbers when other tasks create through the same accessor.
    ///
    /// Returns `Ok(true)` when every document was inserted. Returns `Ok(false)`
    /// as soon as an insert is not acknowledged; documents inserted before it
    /// stay inserted.
    ///
    /// # Errors
    ///
    /// - `ShelterError::EmptyInput` for null or an empty list.
    /// - `ShelterError::WrongElementType` for a scalar, or a list holding a
    ///   non-document. Both are detected before the store is touched.
    /// - `ShelterError::InvalidRecordNumber` if the stored maximum `rec_num`
    ///   is not an integer.
    /// - Store errors from the lookup, the counter or the insert.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use shelter::{bson::doc, AnimalShelter};
    /// # async fn example(shelter: &AnimalShelter) -> shelter::Result<()> {
    /// shelter.create(doc! { "name": "Rex" }).await?;
    /// shelter
    ///     .create(vec![doc! { "name": "Bella" }, doc! { "name": "Max" }])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create<D>(&self, data: D) -> Result<bool>
    where
        D: Into<Bson>,
    {
        let documents = documents_from(data.into())?;
        trace!("Creating {} document(s) in {}", documents.len(), self.name());

        let _numbering = self.numbering.lock().await;
        for mut document in documents {
            document.remove(ID_FIELD);
            document.remove(REC_NUM_FIELD);

            let rec_num = self.reserve_record_number().await?;
            document.insert(REC_NUM_FIELD, rec_num);

            let outcome = self.store.insert_one(document).await.map_err(|e| {
                error!("Insert of rec_num {} into {} failed: {}", rec_num, self.name(), e);
                e
            })?;
            if !outcome.succeeded() {
                warn!(
                    "Insert of rec_num {} into {} was not acknowledged, stopping",
                    rec_num,
                    self.name()
                );
                return Ok(false);
            }
            debug!("Inserted rec_num {} into {}", rec_num, self.name());
        }
        Ok(true)
    }

    /// Like [`create`](Self::create), for data arriving as JSON.
    ///
    /// # Errors
    ///
    /// Returns `ShelterError::Bson` if the value cannot be represented as BSON
    /// (for example, an unsigned integer above `i64::MAX`), and otherwise the
    /// same errors as `create`.
    pub async fn create_json(&self, data: serde_json::Value) -> Result<bool> {
        let data = mongodb::bson::to_bson(&data)?;
        self.create(data).await
    }

    /// Streams every document matching `filter`, without the `_id` field.
    ///
    /// `None` yields an empty stream without querying the store. An empty
    /// filter document matches everything.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query cannot be issued; errors while
    /// iterating arrive as stream items.
    pub async fn read(&self, filter: Option<Document>) -> Result<DocumentStream> {
        let Some(filter) = filter
        else {
            trace!("Read on {} without a filter, nothing to return", self.name());
            return Ok(Box::pin(stream::empty::<Result<Document>>()));
        };

        trace!("Reading from {} with filter {}", self.name(), filter);
        let mut projection = Document::new();
        projection.insert(ID_FIELD, 0_i32);
        self.store.find(filter, FindSpec::new().projection(projection)).await
    }

    /// Sets the fields of `new_values` on every document matching `filter` and
    /// returns how many documents changed.
    ///
    /// Failures are logged and reported as 0; use
    /// [`try_update`](Self::try_update) to see the error. `new_values` may
    /// overwrite `rec_num`.
    pub async fn update(&self, filter: Document, new_values: Document) -> u64 {
        match self.try_update(filter, new_values).await {
            Ok(modified) => modified,
            Err(e) => {
                error!("Update on {} failed: {}", self.name(), e);
                0
            },
        }
    }

    /// Sets the fields of `new_values` on every document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the store error, for example a malformed filter or an attempt
    /// to change `_id`.
    pub async fn try_update(&self, filter: Document, new_values: Document) -> Result<u64> {
        trace!("Updating {} where {} with {}", self.name(), filter, new_values);
        let mut update = Document::new();
        update.insert("$set", new_values);
        let modified = self.store.update_many(filter, update).await?;
        debug!("Modified {} document(s) in {}", modified, self.name());
        Ok(modified)
    }

    /// Removes every document matching `filter` and returns how many were
    /// removed.
    ///
    /// Failures are logged and reported as 0; use
    /// [`try_delete`](Self::try_delete) to see the error. An empty filter
    /// removes everything.
    pub async fn delete(&self, filter: Document) -> u64 {
        match self.try_delete(filter).await {
            Ok(deleted) => deleted,
            Err(e) => {
                error!("Delete on {} failed: {}", self.name(), e);
                0
            },
        }
    }

    /// Removes every document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn try_delete(&self, filter: Document) -> Result<u64> {
        trace!("Deleting from {} where {}", self.name(), filter);
        let deleted = self.store.delete_many(filter).await?;
        debug!("Deleted {} document(s) from {}", deleted, self.name());
        Ok(deleted)
    }
}
