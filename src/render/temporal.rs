use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{executor::TabularResult, value::DataValue};

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Reads one string as a timestamp or calendar date.
pub fn parse_temporal(text: &str) -> Option<DataValue> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(DataValue::Timestamp(ts.with_timezone(&Utc)));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(DataValue::Timestamp(naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().map(DataValue::Date)
}

/// Converts every text column whose non-null values all parse as temporal.
///
/// Columns with a single unparseable value, or with no text at all, are left
/// alone.
pub fn coerce_temporal_columns(result: &mut TabularResult) {
    for column in result.columns.clone() {
        let mut parsed = Vec::with_capacity(result.rows.len());
        let mut saw_text = false;
        let mut convertible = true;
        for row in &result.rows {
            match row.get_or_null(&column) {
                DataValue::Null => parsed.push(DataValue::Null),
                DataValue::Text(text) => match parse_temporal(text) {
                    Some(value) => {
                        saw_text = true;
                        parsed.push(value);
                    }
                    None => {
                        convertible = false;
                        break;
                    }
                },
                _ => {
                    convertible = false;
                    break;
                }
            }
        }
        if !(convertible && saw_text) {
            continue;
        }
        for (row, value) in result.rows.iter_mut().zip(parsed) {
            row.0.insert(column.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Row;
    use chrono::TimeZone;

    #[test]
    fn accepts_common_layouts() {
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_temporal("2025-05-01T08:30:00Z"), Some(DataValue::Timestamp(at)));
        assert_eq!(parse_temporal("2025-05-01 08:30:00"), Some(DataValue::Timestamp(at)));
        assert_eq!(parse_temporal("2025-05-01T08:30:00.000"), Some(DataValue::Timestamp(at)));
        assert_eq!(
            parse_temporal("2025-05-01"),
            Some(DataValue::Date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()))
        );
        assert_eq!(parse_temporal("80-100%"), None);
    }

    #[test]
    fn converts_only_fully_parseable_columns() {
        let mut result = TabularResult::new(
            vec!["day".into(), "label".into()],
            vec![
                Row::from_iter([("day", DataValue::Text("2025-05-01".into())), ("label", DataValue::Text("2025-05-01".into()))]),
                Row::from_iter([("day", DataValue::Null), ("label", DataValue::Text("soon".into()))]),
            ],
        );
        coerce_temporal_columns(&mut result);
        assert!(matches!(result.rows[0].get("day"), Some(DataValue::Date(_))));
        assert_eq!(result.rows[1].get("day"), Some(&DataValue::Null));
        assert_eq!(result.rows[0].get("label"), Some(&DataValue::Text("2025-05-01".into())));
    }
}
