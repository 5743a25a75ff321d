//! Comparison utilities for sorting and matching BSON values.
//!
//! Values of different kinds order by MongoDB's cross-type ordering
//! (null < numbers < strings < documents < arrays < ...). Numbers compare by
//! value regardless of their BSON width.

use std::cmp::Ordering;

use mongodb::bson::Bson;

/// Rank of a value's kind in the cross-type sort order.
fn type_order(value: &Bson) -> u8 {
    match *value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Returns the numeric value of `Int32`, `Int64` and `Double` values.
#[allow(clippy::as_conversions, reason = "i64 to f64 is the intended lossy widening")]
pub fn as_number(value: &Bson) -> Option<f64> {
    match *value {
        Bson::Int32(n) => Some(f64::from(n)),
        Bson::Int64(n) => Some(n as f64),
        Bson::Double(n) => Some(n),
        _ => None,
    }
}

/// Returns the value as an exact integer for the integral BSON widths.
fn as_integer(value: &Bson) -> Option<i64> {
    match *value {
        Bson::Int32(n) => Some(i64::from(n)),
        Bson::Int64(n) => Some(n),
        _ => None,
    }
}

/// Orders two numeric values. Integer pairs compare exactly; a pair
/// involving a double compares as `f64`.
pub fn compare_numbers(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(ia), Some(ib)) = (as_integer(a), as_integer(b)) {
        return Some(ia.cmp(&ib));
    }
    as_number(a)?.partial_cmp(&as_number(b)?)
}

/// Compares two BSON values for sorting purposes.
pub fn compare_bson_values(a: &Bson, b: &Bson) -> Ordering {
    let type_a = type_order(a);
    let type_b = type_order(b);

    if type_a != type_b {
        return type_a.cmp(&type_b);
    }

    match (a, b) {
        (&Bson::String(ref sa), &Bson::String(ref sb)) => sa.cmp(sb),
        (&Bson::Boolean(ba), &Bson::Boolean(bb)) => ba.cmp(&bb),
        (&Bson::DateTime(da), &Bson::DateTime(db)) => da.timestamp_millis().cmp(&db.timestamp_millis()),
        (&Bson::ObjectId(oa), &Bson::ObjectId(ob)) => oa.bytes().cmp(&ob.bytes()),
        (&Bson::Timestamp(ta), &Bson::Timestamp(tb)) => (ta.time, ta.increment).cmp(&(tb.time, tb.increment)),
        (&Bson::Array(ref aa), &Bson::Array(ref ab)) => {
            for (va, vb) in aa.iter().zip(ab.iter()) {
                let ordering = compare_bson_values(va, vb);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            aa.len().cmp(&ab.len())
        },
        (&Bson::Document(ref da), &Bson::Document(ref db)) => {
            for ((ka, va), (kb, vb)) in da.iter().zip(db.iter()) {
                let ordering = ka.cmp(kb).then_with(|| compare_bson_values(va, vb));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            da.len().cmp(&db.len())
        },
        _ => compare_numbers(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Compares two optional values; a missing field sorts like null.
pub fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    compare_bson_values(a.unwrap_or(&Bson::Null), b.unwrap_or(&Bson::Null))
}

/// Equality as the query engine sees it: numbers match across widths.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if as_number(a).is_some() && as_number(b).is_some() {
        return compare_numbers(a, b) == Some(Ordering::Equal);
    }
    a == b
}
