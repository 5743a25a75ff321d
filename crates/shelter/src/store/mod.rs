//! The document-store seam.
//!
//! [`DocumentStore`] is the narrow contract the accessor needs from a database:
//! a liveness check, filtered find, single insert, bulk update and bulk delete.
//! [`MongoStore`] speaks to a real server through the official driver;
//! [`MemoryStore`] keeps documents in process and evaluates the commonly used
//! part of the filter language. Both keep named sequence counters next to the
//! collection for record numbering.

use std::{fmt::Debug, pin::Pin};

use async_trait::async_trait;
use futures::Stream;
use mongodb::bson::{Bson, Document};

use crate::Result;

/// In-process store.
pub mod memory;
/// MongoDB-backed store.
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A lazy, single-pass sequence of documents.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Document>> + Send>>;

/// Find modifiers, mirroring the driver's projection/sort/limit options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    /// Fields to include (`1`) or exclude (`0`)
    pub projection: Option<Document>,
    /// Sort keys, `1` ascending and `-1` descending
    pub sort:       Option<Document>,
    /// Maximum number of documents to return
    pub limit:      Option<i64>,
}

impl FindSpec {
    /// Creates an empty spec: every field, natural order, no limit.
    pub const fn new() -> Self {
        Self {
            projection: None,
            sort:       None,
            limit:      None,
        }
    }

    /// Sets the projection.
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Sets the sort keys.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the limit.
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What the store reported for a single insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// Whether the server acknowledged the write
    pub acknowledged: bool,
    /// The identifier assigned to the new document, if one was reported
    pub inserted_id:  Option<Bson>,
}

impl InsertOutcome {
    /// Returns true when the insert was acknowledged and yielded a usable id.
    pub fn succeeded(&self) -> bool {
        self.acknowledged && self.inserted_id.as_ref().is_some_and(|id| !matches!(*id, Bson::Null))
    }
}

/// Operations the accessor consumes from a document store.
///
/// Implementations are bound to one collection. All filters and updates use the
/// MongoDB query and update document formats.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Runs a no-op command to confirm the server is reachable and the
    /// credentials are accepted.
    async fn ping(&self) -> Result<()>;

    /// Returns documents matching `filter`, shaped by `spec`.
    async fn find(&self, filter: Document, spec: FindSpec) -> Result<DocumentStream>;

    /// Inserts one document.
    async fn insert_one(&self, document: Document) -> Result<InsertOutcome>;

    /// Applies `update` to every match and returns the number of documents changed.
    async fn update_many(&self, filter: Document, update: Document) -> Result<u64>;

    /// Removes every match and returns the number of documents removed.
    async fn delete_many(&self, filter: Document) -> Result<u64>;

    /// Returns the last value handed out by the named counter, if it exists.
    async fn counter_value(&self, counter: &str) -> Result<Option<i64>>;

    /// Atomically raises the named counter to at least `floor`, increments it
    /// and returns the new value. A missing counter is created.
    ///
    /// Values returned by one counter never repeat, even across processes
    /// sharing the store.
    async fn advance_counter(&self, counter: &str, floor: i64) -> Result<i64>;
}
