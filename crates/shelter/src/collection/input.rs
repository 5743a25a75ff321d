use mongodb::bson::{Bson, Document};

use crate::{Result, ShelterError};

/// Splits `create` input into the documents to insert.
///
/// A single document yields one entry; an array yields its elements in order.
/// Every element is checked before anything is returned, so a bad element
/// later in the list rejects the whole call up front.
pub(crate) fn documents_from(data: Bson) -> Result<Vec<Document>> {
    match data {
        Bson::Null | Bson::Undefined => Err(ShelterError::EmptyInput),
        Bson::Document(doc) => Ok(vec![doc]),
        Bson::Array(items) => {
            if items.is_empty() {
                return Err(ShelterError::EmptyInput);
            }
            items
                .into_iter()
                .map(|item| {
                    match item {
                        Bson::Document(doc) => Ok(doc),
                        other => Err(wrong_type(&other)),
                    }
                })
                .collect()
        },
        other => Err(wrong_type(&other)),
    }
}

fn wrong_type(value: &Bson) -> ShelterError {
    ShelterError::WrongElementType {
        found: format!("{:?}", value.element_type()),
    }
}
