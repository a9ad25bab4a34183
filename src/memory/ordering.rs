use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::value::DataValue;

/// Orders values the way a document store sorts mixed fields: by type class
/// first, then by value inside the class.
pub struct ValueOrdering;

impl ValueOrdering {
    pub fn compare(a: &DataValue, b: &DataValue) -> Ordering {
        use DataValue::*;
        match (a, b) {
            (Null, Null) => Ordering::Equal,
            (Int(x), Int(y)) => x.cmp(y),
            (x, y) if x.is_numeric() && y.is_numeric() => {
                let (fx, fy) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
            }
            (Text(x), Text(y)) => x.cmp(y),
            (Bool(x), Bool(y)) => x.cmp(y),
            (x, y) if Self::instant(x).is_some() && Self::instant(y).is_some() => Self::instant(x).cmp(&Self::instant(y)),
            (Array(x), Array(y)) => Self::compare_seq(x.iter(), y.iter()),
            (Document(x), Document(y)) => {
                for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                    let ord = ka.cmp(kb).then_with(|| Self::compare(va, vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            (lhs, rhs) => Self::type_rank(lhs).cmp(&Self::type_rank(rhs)),
        }
    }

    /// Directional comparison for `$sort`.
    pub fn compare_directed(a: &DataValue, b: &DataValue, ascending: bool) -> Ordering {
        let ord = Self::compare(a, b);
        if ascending { ord } else { ord.reverse() }
    }

    /// Equality across numeric kinds and across dates and timestamps.
    pub fn equals(a: &DataValue, b: &DataValue) -> bool {
        Self::comparable(a, b) && Self::compare(a, b) == Ordering::Equal
    }

    /// Range operators only match values of the same type class.
    pub fn comparable(a: &DataValue, b: &DataValue) -> bool {
        Self::type_rank(a) == Self::type_rank(b)
    }

    /// Point in time of a date or timestamp. Dates are taken at UTC midnight.
    pub fn instant(value: &DataValue) -> Option<DateTime<Utc>> {
        match value {
            DataValue::Timestamp(ts) => Some(*ts),
            DataValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|n| n.and_utc()),
            _ => None,
        }
    }

    fn compare_seq<'a>(
        mut a: impl Iterator<Item = &'a DataValue>,
        mut b: impl Iterator<Item = &'a DataValue>,
    ) -> Ordering {
        loop {
            match (a.next(), b.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(x), Some(y)) => {
                    let ord = Self::compare(x, y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }

    fn type_rank(v: &DataValue) -> u8 {
        match v {
            DataValue::Null => 0,
            DataValue::Int(_) | DataValue::Float(_) => 1,
            DataValue::Text(_) => 2,
            DataValue::Document(_) => 3,
            DataValue::Array(_) => 4,
            DataValue::Bool(_) => 5,
            DataValue::Date(_) | DataValue::Timestamp(_) => 6,
        }
    }
}
