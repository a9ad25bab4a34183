use regex::RegexBuilder;

use crate::{
    memory::{lookup, Expression, PipelineError, ValueOrdering},
    value::{DataValue, Document},
};

/// Evaluates `$match` filters.
pub struct Matcher;

impl Matcher {
    pub fn matches(filter: &Document, doc: &Document) -> Result<bool, PipelineError> {
        for (key, condition) in filter {
            let ok = match key.as_str() {
                "$and" => Self::each(key, condition, doc)?.iter().all(|m| *m),
                "$or" => Self::each(key, condition, doc)?.iter().any(|m| *m),
                "$nor" => !Self::each(key, condition, doc)?.iter().any(|m| *m),
                "$expr" => Expression::truthy(&Expression::evaluate(condition, doc)?),
                op if op.starts_with('$') => return Err(PipelineError::UnknownOperator(op.to_string())),
                path => Self::field_matches(lookup(doc, path), condition)?,
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn each(operator: &str, condition: &DataValue, doc: &Document) -> Result<Vec<bool>, PipelineError> {
        let clauses = condition
            .as_array()
            .ok_or_else(|| PipelineError::expression(operator, "expects an array of filters"))?;
        clauses
            .iter()
            .map(|clause| {
                let clause = clause
                    .as_document()
                    .ok_or_else(|| PipelineError::expression(operator, "entries must be filter documents"))?;
                Self::matches(clause, doc)
            })
            .collect()
    }

    fn is_operator_document(condition: &DataValue) -> bool {
        condition
            .as_document()
            .is_some_and(|d| !d.is_empty() && d.keys().all(|k| k.starts_with('$')))
    }

    fn field_matches(value: Option<&DataValue>, condition: &DataValue) -> Result<bool, PipelineError> {
        if !Self::is_operator_document(condition) {
            return Ok(Self::equals(value, condition));
        }
        let Some(operators) = condition.as_document() else {
            return Ok(false);
        };
        let options = operators.get("$options").and_then(DataValue::as_str).unwrap_or("");
        for (operator, argument) in operators {
            let ok = match operator.as_str() {
                "$eq" => Self::equals(value, argument),
                "$ne" => !Self::equals(value, argument),
                "$gt" | "$gte" | "$lt" | "$lte" => Self::range(operator, value, argument),
                "$in" => Self::candidates(operator, argument)?.iter().any(|c| Self::equals(value, c)),
                "$nin" => !Self::candidates(operator, argument)?.iter().any(|c| Self::equals(value, c)),
                "$exists" => value.is_some() == Expression::truthy(argument),
                "$size" => match (value, argument.as_i64()) {
                    (Some(DataValue::Array(items)), Some(n)) => items.len() as i64 == n,
                    _ => false,
                },
                "$regex" => Self::regex(value, argument, options)?,
                "$options" => true,
                "$not" => !Self::field_matches(value, argument)?,
                other => return Err(PipelineError::UnknownOperator(other.to_string())),
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Null matches both null and missing fields. An array field matches when
    /// the whole array or any element is equal.
    fn equals(value: Option<&DataValue>, expected: &DataValue) -> bool {
        match value {
            None => expected.is_null(),
            Some(actual) => {
                ValueOrdering::equals(actual, expected)
                    || matches!(actual, DataValue::Array(items) if items.iter().any(|v| ValueOrdering::equals(v, expected)))
            }
        }
    }

    fn range(operator: &str, value: Option<&DataValue>, bound: &DataValue) -> bool {
        let test = |v: &DataValue| {
            if !ValueOrdering::comparable(v, bound) {
                return false;
            }
            let ord = ValueOrdering::compare(v, bound);
            match operator {
                "$gt" => ord.is_gt(),
                "$gte" => ord.is_ge(),
                "$lt" => ord.is_lt(),
                _ => ord.is_le(),
            }
        };
        match value {
            None => false,
            Some(DataValue::Array(items)) => items.iter().any(test),
            Some(v) => test(v),
        }
    }

    fn candidates<'a>(operator: &str, argument: &'a DataValue) -> Result<&'a Vec<DataValue>, PipelineError> {
        argument.as_array().ok_or_else(|| PipelineError::expression(operator, "expects an array"))
    }

    fn regex(value: Option<&DataValue>, pattern: &DataValue, options: &str) -> Result<bool, PipelineError> {
        let pattern = pattern.as_str().ok_or_else(|| PipelineError::expression("$regex", "expects a string pattern"))?;
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .build()
            .map_err(|e| PipelineError::expression("$regex", e.to_string()))?;
        Ok(value.and_then(DataValue::as_str).is_some_and(|s| regex.is_match(s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match DataValue::from(value) {
            DataValue::Document(d) => d,
            _ => panic!("fixture must be an object"),
        }
    }

    fn matches(filter: serde_json::Value, target: serde_json::Value) -> bool {
        Matcher::matches(&doc(filter), &doc(target)).unwrap()
    }

    #[test]
    fn equality_and_ranges() {
        let reading = json!({"patient_id": 7, "spo2": 90, "heart_rate": 72});
        assert!(matches(json!({"patient_id": 7}), reading.clone()));
        assert!(!matches(json!({"patient_id": 8}), reading.clone()));
        assert!(matches(json!({"spo2": {"$lt": 92}}), reading.clone()));
        assert!(!matches(json!({"spo2": {"$lt": "92"}}), reading.clone()));
        assert!(matches(json!({"heart_rate": {"$exists": true}, "blood_pressure": {"$exists": false}}), reading));
    }

    #[test]
    fn timestamps_compare_with_timestamps_only() {
        let since = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let mut target = Document::new();
        target.insert("timestamp".into(), DataValue::Timestamp(since + chrono::TimeDelta::hours(3)));
        let filter = Document::from_iter([(
            "timestamp".to_string(),
            DataValue::document([("$gte", DataValue::Timestamp(since))]),
        )]);
        assert!(Matcher::matches(&filter, &target).unwrap());

        target.insert("timestamp".into(), DataValue::Text("2025-05-02".into()));
        assert!(!Matcher::matches(&filter, &target).unwrap());
    }

    #[test]
    fn logical_combinators_and_sets() {
        let alert = json!({"severity": "high", "tags": ["fall", "night"]});
        assert!(matches(json!({"$or": [{"severity": "low"}, {"tags": "fall"}]}), alert.clone()));
        assert!(matches(json!({"severity": {"$in": ["high", "critical"]}}), alert.clone()));
        assert!(matches(json!({"severity": {"$nin": ["low"]}}), alert.clone()));
        assert!(!matches(json!({"$and": [{"severity": "high"}, {"tags": {"$size": 3}}]}), alert.clone()));
        assert!(matches(json!({"severity": {"$regex": "^HI", "$options": "i"}}), alert));
    }

    #[test]
    fn null_matches_missing() {
        assert!(matches(json!({"acknowledged_by": null}), json!({"id": 1})));
    }
}
