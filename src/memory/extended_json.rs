use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::value::DataValue;

/// Converts a snapshot value, understanding the relaxed extended-JSON
/// wrappers an export tool writes: `$date`, `$numberLong`, `$numberInt`,
/// `$numberDouble` and `$oid`.
pub fn from_extended_json(value: Value) -> DataValue {
    match value {
        Value::Object(map) => match unwrap_extended(&map) {
            Some(value) => value,
            None => DataValue::Document(map.into_iter().map(|(k, v)| (k, from_extended_json(v))).collect()),
        },
        Value::Array(items) => DataValue::Array(items.into_iter().map(from_extended_json).collect()),
        other => DataValue::from(other),
    }
}

fn unwrap_extended(map: &Map<String, Value>) -> Option<DataValue> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    match key.as_str() {
        "$date" => parse_date(inner),
        "$numberLong" | "$numberInt" => inner.as_str()?.parse::<i64>().ok().map(DataValue::Int),
        "$numberDouble" => inner.as_str()?.parse::<f64>().ok().map(DataValue::Float),
        "$oid" => inner.as_str().map(|s| DataValue::Text(s.to_string())),
        _ => None,
    }
}

fn parse_date(inner: &Value) -> Option<DataValue> {
    let millis = match inner {
        Value::String(text) => {
            return DateTime::parse_from_rfc3339(text).ok().map(|ts| DataValue::Timestamp(ts.with_timezone(&Utc)));
        }
        Value::Number(n) => n.as_i64()?,
        Value::Object(nested) => nested.get("$numberLong")?.as_str()?.parse::<i64>().ok()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single().map(DataValue::Timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dates_in_every_layout() {
        let expected = DataValue::Timestamp(Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap());
        assert_eq!(from_extended_json(json!({"$date": "2025-05-01T08:00:00Z"})), expected);
        assert_eq!(from_extended_json(json!({"$date": 1746086400000i64})), expected);
        assert_eq!(from_extended_json(json!({"$date": {"$numberLong": "1746086400000"}})), expected);
    }

    #[test]
    fn wrappers_nest_inside_documents() {
        let doc = from_extended_json(json!({
            "_id": {"$oid": "65f0c0ffee"},
            "readings": [{"at": {"$date": "2025-05-01T08:00:00Z"}, "hr": {"$numberInt": "72"}}]
        }));
        assert_eq!(doc.get_path("_id"), Some(&DataValue::Text("65f0c0ffee".into())));
        assert_eq!(doc.get_path("readings.0.hr"), Some(&DataValue::Int(72)));
        assert!(matches!(doc.get_path("readings.0.at"), Some(DataValue::Timestamp(_))));
    }

    #[test]
    fn ordinary_single_key_documents_are_kept() {
        let doc = from_extended_json(json!({"$gte": 5}));
        assert_eq!(doc, DataValue::document([("$gte", DataValue::Int(5))]));
    }
}
