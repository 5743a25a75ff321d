pub mod collection;
pub mod comparison;
pub mod config;
pub mod constants;
pub mod error;
pub mod filtering;
pub mod projection;
pub mod store;

pub use collection::AnimalShelter;
pub use config::{ConfigKey, ConfigValue, ConnectionArgs, ConnectionConfig, Password};
pub use error::{Result, ShelterError};
pub use mongodb::bson;
pub use store::{DocumentStore, DocumentStream, FindSpec, InsertOutcome, MemoryStore, MongoStore};
