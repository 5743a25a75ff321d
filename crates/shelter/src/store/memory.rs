use std::collections::HashMap;

use async_stream::stream;
use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::{
    comparison::compare_values,
    constants::ID_FIELD,
    filtering::{lookup_path, matches_filter},
    projection::project_document,
    Result,
    ShelterError,
};
use super::{DocumentStore, DocumentStream, FindSpec, InsertOutcome};

/// A [`DocumentStore`] that keeps one collection in process memory.
///
/// Documents keep insertion order, which is the natural order `find` returns
/// without a sort. Filters are evaluated by [`crate::filtering`]; updates
/// support `$set` and `$unset`. Counters live beside the documents and survive
/// deletes, like the server-side counter collection. Nothing is persisted.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use futures::TryStreamExt as _;
/// use shelter::{bson::doc, AnimalShelter, ConfigKey, ConnectionArgs, MemoryStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> shelter::Result<()> {
/// let config = ConnectionArgs::new().named(ConfigKey::Password, "secret").resolve()?;
/// let shelter = AnimalShelter::with_store(Arc::new(MemoryStore::new()), config).await?;
///
/// shelter.create(doc! { "name": "Rex" }).await?;
/// let found: Vec<_> = shelter.read(Some(doc! { "name": "Rex" })).await?.try_collect().await?;
/// assert_eq!(found[0].get_i64("rec_num").ok(), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Stored documents, each carrying an `_id`.
    documents: RwLock<Vec<Document>>,
    /// Last value handed out per named counter.
    counters:  Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self { Self::default() }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize { self.documents.read().await.len() }

    /// Returns true when nothing is stored.
    pub async fn is_empty(&self) -> bool { self.documents.read().await.is_empty() }

    /// Returns a copy of every stored document, `_id` included.
    pub async fn snapshot(&self) -> Vec<Document> { self.documents.read().await.clone() }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<()> { Ok(()) }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<DocumentStream> {
        trace!("Memory find with filter {}", filter);
        let mut matched = Vec::new();
        for doc in self.documents.read().await.iter() {
            if matches_filter(doc, &filter)? {
                matched.push(doc.clone());
            }
        }

        if let Some(sort) = spec.sort.as_ref() {
            sort_documents(&mut matched, sort)?;
        }
        // A negative limit behaves like its absolute value; zero means no limit.
        if let Some(limit) = spec.limit
            && limit != 0
        {
            matched.truncate(usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX));
        }
        let results = match spec.projection {
            Some(ref projection) => {
                matched
                    .iter()
                    .map(|doc| project_document(doc, projection))
                    .collect::<Result<Vec<_>>>()?
            },
            None => matched,
        };
        debug!("Memory find matched {} documents", results.len());

        Ok(Box::pin(stream! {
            for doc in results {
                yield Ok::<Document, ShelterError>(doc);
            }
        }))
    }

    async fn insert_one(&self, document: Document) -> Result<InsertOutcome> {
        let mut documents = self.documents.write().await;

        let id = match document.get(ID_FIELD) {
            Some(id) => {
                if documents.iter().any(|stored| stored.get(ID_FIELD) == Some(id)) {
                    return Err(ShelterError::DuplicateKey {
                        id: id.to_string(),
                    });
                }
                id.clone()
            },
            None => Bson::ObjectId(ObjectId::new()),
        };

        let mut stored = Document::new();
        stored.insert(ID_FIELD, id.clone());
        for (field, value) in document {
            if field != ID_FIELD {
                stored.insert(field, value);
            }
        }
        documents.push(stored);
        trace!("Memory insert assigned _id {}", id);

        Ok(InsertOutcome {
            acknowledged: true,
            inserted_id:  Some(id),
        })
    }

    async fn update_many(&self, filter: Document, update: Document) -> Result<u64> {
        let operations = parse_update(&update)?;
        let mut documents = self.documents.write().await;

        // Compute every change first so a failing document leaves the rest untouched.
        let mut changes = Vec::new();
        for (index, doc) in documents.iter().enumerate() {
            if !matches_filter(doc, &filter)? {
                continue;
            }
            let mut updated = doc.clone();
            for operation in &operations {
                operation.apply(&mut updated)?;
            }
            if updated.get(ID_FIELD) != doc.get(ID_FIELD) {
                return Err(ShelterError::InvalidFilter {
                    reason: "performing an update on the path '_id' would modify the immutable field '_id'"
                        .to_owned(),
                });
            }
            if updated != *doc {
                changes.push((index, updated));
            }
        }

        let modified = changes.len();
        for (index, updated) in changes {
            if let Some(slot) = documents.get_mut(index) {
                *slot = updated;
            }
        }
        Ok(u64::try_from(modified).unwrap_or(u64::MAX))
    }

    async fn delete_many(&self, filter: Document) -> Result<u64> {
        let mut documents = self.documents.write().await;

        let mut keep = Vec::with_capacity(documents.len());
        for doc in documents.iter() {
            keep.push(!matches_filter(doc, &filter)?);
        }
        let before = documents.len();
        let mut flags = keep.into_iter();
        documents.retain(|_| flags.next().unwrap_or(true));

        Ok(u64::try_from(before.saturating_sub(documents.len())).unwrap_or(u64::MAX))
    }

    async fn counter_value(&self, counter: &str) -> Result<Option<i64>> {
        Ok(self.counters.lock().await.get(counter).copied())
    }

    async fn advance_counter(&self, counter: &str, floor: i64) -> Result<i64> {
        let mut counters = self.counters.lock().await;
        let current = counters.get(counter).copied().map_or(floor, |value| value.max(floor));
        let next = current.checked_add(1).ok_or_else(|| {
            ShelterError::InvalidRecordNumber {
                value: current.to_string(),
            }
        })?;
        counters.insert(counter.to_owned(), next);
        trace!("Memory counter {} advanced to {}", counter, next);
        Ok(next)
    }
}

/// Stable multi-key sort following a `{field: 1 | -1, ...}` document.
fn sort_documents(documents: &mut [Document], sort: &Document) -> Result<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match *direction {
            Bson::Int32(1) | Bson::Int64(1) => false,
            Bson::Int32(-1) | Bson::Int64(-1) => true,
            Bson::Double(d) if d == 1.0 => false,
            Bson::Double(d) if d == -1.0 => true,
            _ => {
                return Err(ShelterError::InvalidFilter {
                    reason: format!("invalid sort direction for '{}': {}", field, direction),
                });
            },
        };
        keys.push((field.as_str(), descending));
    }

    documents.sort_by(|a, b| {
        keys.iter().fold(std::cmp::Ordering::Equal, |ordering, &(field, descending)| {
            ordering.then_with(|| {
                let by_field = compare_values(lookup_path(a, field), lookup_path(b, field));
                if descending { by_field.reverse() } else { by_field }
            })
        })
    });
    Ok(())
}

/// One field-level change from an update document.
#[derive(Debug)]
enum UpdateOperation {
    /// `$set: {path: value}`
    Set(String, Bson),
    /// `$unset: {path: ""}`
    Unset(String),
}

impl UpdateOperation {
    fn apply(&self, doc: &mut Document) -> Result<()> {
        match *self {
            Self::Set(ref path, ref value) => set_path(doc, path, value.clone()),
            Self::Unset(ref path) => {
                unset_path(doc, path);
                Ok(())
            },
        }
    }
}

fn parse_update(update: &Document) -> Result<Vec<UpdateOperation>> {
    let invalid = |reason: String| {
        ShelterError::InvalidFilter {
            reason,
        }
    };
    if update.is_empty() {
        return Err(invalid("update document must not be empty".to_owned()));
    }

    let mut operations = Vec::new();
    for (op, fields) in update {
        let Bson::Document(ref fields) = *fields
        else {
            return Err(invalid(format!("modifier {} expects a document", op)));
        };
        for (path, value) in fields {
            match op.as_str() {
                "$set" => operations.push(UpdateOperation::Set(path.clone(), value.clone())),
                "$unset" => operations.push(UpdateOperation::Unset(path.clone())),
                other if other.starts_with('$') => {
                    return Err(invalid(format!("unsupported update operator: {}", other)));
                },
                _ => return Err(invalid("update document requires atomic operators".to_owned())),
            }
        }
    }
    Ok(operations)
}

/// Sets a possibly dotted path, creating intermediate documents.
fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        },
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(&mut Bson::Document(ref mut inner)) => set_path(inner, rest, value),
                _ => {
                    Err(ShelterError::InvalidFilter {
                        reason: format!("cannot create field '{}' in a non-document value", rest),
                    })
                },
            }
        },
    }
}

fn unset_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        },
        Some((head, rest)) => {
            if let Some(&mut Bson::Document(ref mut inner)) = doc.get_mut(head) {
                unset_path(inner, rest);
            }
        },
    }
}
