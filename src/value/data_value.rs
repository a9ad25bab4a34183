use std::fmt::Display;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Ordered field map used for documents and pipeline stages.
pub type Document = IndexMap<String, DataValue>;

/// Common value model shared by documents, pipeline literals and table cells.
///
/// Unlike `serde_json::Value` it keeps integers, floats and temporal values
/// apart, which is what lets a bound pipeline carry `7` instead of `"7"` and
/// lets the renderer hand real timestamps to a chart axis.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum DataValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Array(Vec<DataValue>),
    Document(Document),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataValue::Int(_) | DataValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Int(i) => Some(*i as f64),
            DataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataValue::Int(i) => Some(*i),
            DataValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            DataValue::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<DataValue>> {
        match self {
            DataValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "bool",
            DataValue::Int(_) => "int",
            DataValue::Float(_) => "float",
            DataValue::Text(_) => "text",
            DataValue::Date(_) => "date",
            DataValue::Timestamp(_) => "timestamp",
            DataValue::Array(_) => "array",
            DataValue::Document(_) => "document",
        }
    }

    /// Resolve a dotted path (`a.b.c`) through nested documents.
    pub fn get_path(&self, path: &str) -> Option<&DataValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                DataValue::Document(map) => map.get(segment)?,
                DataValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Stable string used to group equal values together.
    pub fn canonical_key(&self) -> String {
        format!("{self:?}")
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn document<I, K>(fields: I) -> DataValue
    where
        I: IntoIterator<Item = (K, DataValue)>,
        K: Into<String>,
    {
        DataValue::Document(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DataValue::Int(i),
                None => n.as_f64().map(DataValue::Float).unwrap_or(DataValue::Null),
            },
            Value::String(s) => DataValue::Text(s),
            Value::Array(items) => DataValue::Array(items.into_iter().map(DataValue::from).collect()),
            Value::Object(map) => DataValue::Document(
                map.into_iter().map(|(k, v)| (k, DataValue::from(v))).collect(),
            ),
        }
    }
}

impl From<&Value> for DataValue {
    fn from(value: &Value) -> Self {
        DataValue::from(value.clone())
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Int(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Float(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Bool(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::Text(value)
    }
}

impl From<NaiveDate> for DataValue {
    fn from(value: NaiveDate) -> Self {
        DataValue::Date(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::Timestamp(value)
    }
}

impl Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataValue::Null => Ok(()),
            DataValue::Bool(b) => write!(f, "{b}"),
            DataValue::Int(i) => write!(f, "{i}"),
            DataValue::Float(x) => write!(f, "{x}"),
            DataValue::Text(s) => f.write_str(s),
            DataValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DataValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            DataValue::Array(_) | DataValue::Document(_) => write!(f, "{}", self.to_json()),
        }
    }
}
