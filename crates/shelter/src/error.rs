use thiserror::Error;

/// Error type for the shelter data-access layer.
///
/// Construction-time failures (`ConfigError`, `ConnectionFailed`) and create-path
/// validation failures (`EmptyInput`, `WrongElementType`) are kept apart from
/// failures reported by the document store itself, so callers can tell a bad
/// argument from an unhealthy database.
#[derive(Error, Debug)]
pub enum ShelterError {
    /// Connection arguments could not be resolved into a usable configuration
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// Session establishment or the liveness check failed
    #[error("Mongo connection failed: {source}")]
    ConnectionFailed {
        #[source]
        source: Box<Self>,
    },

    /// `create` was given nothing to save
    #[error("Nothing to save, data is empty")]
    EmptyInput,

    /// `create` was given something other than a document or a list of documents
    #[error("create() expects a document or a list of documents, found {found}")]
    WrongElementType {
        found: String,
    },

    /// A stored `rec_num` cannot be interpreted as an integer
    #[error("Stored rec_num is not an integer: {value}")]
    InvalidRecordNumber {
        value: String,
    },

    /// A filter or update uses syntax the store cannot evaluate
    #[error("Invalid filter: {reason}")]
    InvalidFilter {
        reason: String,
    },

    /// A document with the same `_id` is already stored
    #[error("Duplicate key: a document with _id {id} already exists")]
    DuplicateKey {
        id: String,
    },

    /// The MongoDB driver reported a failure
    #[error("MongoDB error: {source}")]
    Mongo {
        #[from]
        source: mongodb::error::Error,
    },

    /// Writing results failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A value could not be converted to BSON
    #[error("BSON conversion error: {source}")]
    Bson {
        #[from]
        source: mongodb::bson::ser::Error,
    },

    /// Generic error for unexpected conditions
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ShelterError {
    /// Wraps a failure raised while opening or verifying a session.
    pub(crate) fn connection(source: Self) -> Self {
        Self::ConnectionFailed {
            source: Box::new(source),
        }
    }

    /// Returns true for caller errors detected before any store call.
    pub const fn is_validation(&self) -> bool { matches!(self, Self::EmptyInput | Self::WrongElementType { .. }) }
}

/// Result type alias for shelter operations.
pub type Result<T> = std::result::Result<T, ShelterError>;
