use std::fmt::Display;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta, Utc};
use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};

use crate::value::DataValue;

/// A runtime parameter supplied by the operator.
///
/// Hashable so a sorted list of bindings can take part in a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamValue {
    Int(i64),
    Float(OrderedFloat<f64>),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Duration(TimeDelta),
}

impl ParamValue {
    pub fn float(value: f64) -> Self {
        ParamValue::Float(OrderedFloat(value))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
            ParamValue::Date(_) => "date",
            ParamValue::Timestamp(_) => "timestamp",
            ParamValue::Duration(_) => "duration",
        }
    }

    /// Literal used when the value is placed inside a document pipeline.
    /// Durations become whole milliseconds, the unit date arithmetic uses there.
    pub fn to_data_value(&self) -> DataValue {
        match self {
            ParamValue::Int(i) => DataValue::Int(*i),
            ParamValue::Float(f) => DataValue::Float(f.into_inner()),
            ParamValue::Text(s) => DataValue::Text(s.clone()),
            ParamValue::Date(d) => DataValue::Date(*d),
            ParamValue::Timestamp(ts) => DataValue::Timestamp(*ts),
            ParamValue::Duration(d) => DataValue::Int(d.num_milliseconds()),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_data_value().serialize(serializer)
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{}", x.into_inner()),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ParamValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ParamValue::Duration(d) => write!(f, "{}s", d.num_seconds()),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(value: NaiveDate) -> Self {
        ParamValue::Date(value)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParamValue::Timestamp(value)
    }
}

impl From<TimeDelta> for ParamValue {
    fn from(value: TimeDelta) -> Self {
        ParamValue::Duration(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_stays_integer_in_documents() {
        assert_eq!(ParamValue::from(7).to_data_value(), DataValue::Int(7));
    }

    #[test]
    fn duration_becomes_milliseconds() {
        let window = ParamValue::from(TimeDelta::hours(24));
        assert_eq!(window.to_data_value(), DataValue::Int(86_400_000));
    }

    #[test]
    fn floats_are_hashable_and_comparable() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ParamValue::float(0.5));
        set.insert(ParamValue::float(0.5));
        assert_eq!(set.len(), 1);
    }
}
