//! Document projection utilities.

use mongodb::bson::{Bson, Document};

use crate::{comparison::as_number, constants::ID_FIELD, Result, ShelterError};

/// Shapes a document with a projection document such as `{"rec_num": 1}` or
/// `{"_id": 0}`.
///
/// Inclusion projections keep `_id` unless it is explicitly excluded.
/// Inclusion and exclusion cannot be mixed except for `_id`.
pub fn project_document(doc: &Document, projection: &Document) -> Result<Document> {
    if projection.is_empty() {
        return Ok(doc.clone());
    }

    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for (field, flag) in projection {
        let keep = projection_flag(field, flag)?;
        if field == ID_FIELD {
            include_id = keep;
        }
        else if keep {
            included.push(field.as_str());
        }
        else {
            excluded.push(field.as_str());
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(ShelterError::InvalidFilter {
            reason: "cannot mix inclusion and exclusion in a projection".to_owned(),
        });
    }

    let mut projected = Document::new();
    if included.is_empty() {
        for (field, value) in doc {
            let dropped = excluded.contains(&field.as_str()) || (field == ID_FIELD && !include_id);
            if !dropped {
                projected.insert(field.clone(), value.clone());
            }
        }
    }
    else {
        for (field, value) in doc {
            let kept = included.contains(&field.as_str()) || (field == ID_FIELD && include_id);
            if kept {
                projected.insert(field.clone(), value.clone());
            }
        }
    }
    Ok(projected)
}

fn projection_flag(field: &str, flag: &Bson) -> Result<bool> {
    match *flag {
        Bson::Boolean(keep) => Ok(keep),
        _ => {
            as_number(flag).map(|n| n != 0.0).ok_or_else(|| {
                ShelterError::InvalidFilter {
                    reason: format!("unsupported projection value for '{}': {}", field, flag),
                }
            })
        },
    }
}
