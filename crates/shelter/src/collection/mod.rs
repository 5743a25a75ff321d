/// Core accessor implementation.
pub mod coll;
/// Create-input validation.
pub mod input;
/// Record numbering.
pub mod numbering;
/// Collection CRUD operations.
pub mod operations;
#[cfg(test)]
/// Accessor tests.
pub mod tests;

pub use coll::*;
