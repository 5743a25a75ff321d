//! Query-document evaluation for the in-memory store.
//!
//! Supports field equality (including null-matches-missing and array
//! membership), dotted paths into embedded documents, the comparison operators
//! `$eq $ne $gt $gte $lt $lte $in $nin $exists`, and the logical operators
//! `$and $or $nor`. Anything else is rejected with `InvalidFilter`.

use std::cmp::Ordering;

use mongodb::bson::{Bson, Document};

use crate::{
    comparison::{as_number, compare_bson_values, values_equal},
    Result,
    ShelterError,
};

/// Resolves a dotted path such as `"outcome.type"` against a document.
pub fn lookup_path<'doc>(doc: &'doc Document, path: &str) -> Option<&'doc Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match *current {
            Bson::Document(ref inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Checks whether a document satisfies a query document.
pub fn matches_filter(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let matches = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches_filter(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            },
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches_filter(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            },
            "$nor" => {
                let mut none = true;
                for clause in clauses(key, condition)? {
                    if matches_filter(doc, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            },
            op if op.starts_with('$') => {
                return Err(invalid(format!("unknown top level operator: {}", op)));
            },
            path => matches_condition(lookup_path(doc, path), condition)?,
        };
        if !matches {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Extracts the sub-filters of a logical operator.
fn clauses<'f>(op: &str, condition: &'f Bson) -> Result<Vec<&'f Document>> {
    let Bson::Array(ref items) = *condition
    else {
        return Err(invalid(format!("{} must be an array", op)));
    };
    if items.is_empty() {
        return Err(invalid(format!("{} must be a nonempty array", op)));
    }
    items
        .iter()
        .map(|item| {
            match *item {
                Bson::Document(ref clause) => Ok(clause),
                _ => Err(invalid(format!("{} entries must be documents", op))),
            }
        })
        .collect()
}

/// Evaluates the condition attached to one field path.
fn matches_condition(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    if let Bson::Document(ref operators) = *condition
        && operators.keys().next().is_some_and(|k| k.starts_with('$'))
    {
        for (op, operand) in operators {
            if !apply_operator(value, op, operand)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    Ok(equals_or_contains(value, condition))
}

fn apply_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> Result<bool> {
    let matched = match op {
        "$eq" => equals_or_contains(value, operand),
        "$ne" => !equals_or_contains(value, operand),
        "$gt" => compares(value, operand, |o| o == Ordering::Greater),
        "$gte" => compares(value, operand, |o| o != Ordering::Less),
        "$lt" => compares(value, operand, |o| o == Ordering::Less),
        "$lte" => compares(value, operand, |o| o != Ordering::Greater),
        "$in" => in_list(value, operand)?,
        "$nin" => !in_list(value, operand)?,
        "$exists" => value.is_some() == truthy(operand),
        other => return Err(invalid(format!("unknown operator: {}", other))),
    };
    Ok(matched)
}

/// Equality with MongoDB semantics: `null` matches a missing field and an
/// array field matches when any element equals the target.
fn equals_or_contains(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(*target, Bson::Null),
        Some(&Bson::Array(ref items)) => {
            values_equal(&Bson::Array(items.clone()), target) || items.iter().any(|item| values_equal(item, target))
        },
        Some(found) => values_equal(found, target),
    }
}

/// Range comparison; only values of the same kind compare.
fn compares<F>(value: Option<&Bson>, operand: &Bson, accept: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    let same_kind = |candidate: &Bson| {
        let both_numbers = as_number(candidate).is_some() && as_number(operand).is_some();
        both_numbers || std::mem::discriminant(candidate) == std::mem::discriminant(operand)
    };
    match value {
        // A missing field ranges like null.
        None => matches!(*operand, Bson::Null) && accept(Ordering::Equal),
        Some(&Bson::Array(ref items)) => {
            items
                .iter()
                .any(|item| same_kind(item) && accept(compare_bson_values(item, operand)))
        },
        Some(found) => same_kind(found) && accept(compare_bson_values(found, operand)),
    }
}

fn in_list(value: Option<&Bson>, operand: &Bson) -> Result<bool> {
    let Bson::Array(ref candidates) = *operand
    else {
        return Err(invalid("$in/$nin needs an array".to_owned()));
    };
    Ok(candidates
        .iter()
        .any(|candidate| equals_or_contains(value, candidate)))
}

fn truthy(value: &Bson) -> bool {
    match *value {
        Bson::Boolean(b) => b,
        Bson::Null | Bson::Undefined => false,
        _ => as_number(value).is_none_or(|n| n != 0.0),
    }
}

fn invalid(reason: String) -> ShelterError {
    ShelterError::InvalidFilter {
        reason,
    }
}
