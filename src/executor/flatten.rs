use indexmap::{IndexMap, IndexSet};

use crate::{
    executor::{Row, TabularResult},
    value::{DataValue, Document},
};

/// Flattens heterogeneous documents into one table.
///
/// Nested documents become dotted column names (`device.battery`). Arrays
/// stay as single cells. The column set is the union of every observed
/// field in first-seen order and absent cells are null. A literal dotted key
/// that collides with a nested path within one document keeps both values;
/// the later one gets a `_2`, `_3`, ... suffix.
pub fn flatten_documents(documents: Vec<DataValue>) -> TabularResult {
    let mut columns: IndexSet<String> = IndexSet::new();
    let mut flat_docs: Vec<IndexMap<String, DataValue>> = Vec::with_capacity(documents.len());

    for doc in documents {
        let mut flat = IndexMap::new();
        match doc {
            DataValue::Document(fields) => flatten_into("", fields, &mut flat),
            other => {
                flat.insert("value".to_string(), other);
            }
        }
        for key in flat.keys() {
            if !columns.contains(key) {
                columns.insert(key.clone());
            }
        }
        flat_docs.push(flat);
    }

    let rows = flat_docs
        .into_iter()
        .map(|mut flat| {
            Row(columns
                .iter()
                .map(|c| (c.clone(), flat.swap_remove(c).unwrap_or(DataValue::Null)))
                .collect())
        })
        .collect();

    TabularResult::new(columns.into_iter().collect(), rows)
}

fn flatten_into(prefix: &str, fields: Document, out: &mut IndexMap<String, DataValue>) {
    for (key, value) in fields {
        let name = if prefix.is_empty() { key } else { format!("{prefix}.{key}") };
        match value {
            DataValue::Document(inner) if !inner.is_empty() => flatten_into(&name, inner, out),
            other => {
                let mut candidate = name.clone();
                let mut n = 2;
                while out.contains_key(&candidate) {
                    candidate = format!("{name}_{n}");
                    n += 1;
                }
                out.insert(candidate, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heterogeneous_documents_share_a_union_of_columns() {
        let result = flatten_documents(vec![DataValue::from(json!({"a": 1})), DataValue::from(json!({"b": 2}))]);
        assert_eq!(result.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(result.rows[0].get("a"), Some(&DataValue::Int(1)));
        assert_eq!(result.rows[0].get("b"), Some(&DataValue::Null));
        assert_eq!(result.rows[1].get("a"), Some(&DataValue::Null));
        assert_eq!(result.rows[1].get("b"), Some(&DataValue::Int(2)));
    }

    #[test]
    fn nested_fields_become_dotted_columns() {
        let result = flatten_documents(vec![DataValue::from(json!({
            "_id": {"patient_id": 3, "day": "2025-05-01"},
            "avg": 71.5,
            "readings": [1, 2]
        }))]);
        assert_eq!(result.columns, vec!["_id.patient_id", "_id.day", "avg", "readings"]);
        assert_eq!(result.rows[0].get("readings"), Some(&DataValue::from(json!([1, 2]))));
    }

    #[test]
    fn column_order_follows_first_sighting() {
        let result = flatten_documents(vec![
            DataValue::from(json!({"b": 1, "a": 1})),
            DataValue::from(json!({"c": 1, "a": 2})),
        ]);
        assert_eq!(result.columns, vec!["b", "a", "c"]);
    }

    #[test]
    fn dotted_keys_do_not_overwrite_nested_paths() {
        let result = flatten_documents(vec![DataValue::from(json!({"a.b": 1, "a": {"b": 2}, "a.b_2": 3}))]);
        assert_eq!(result.columns, vec!["a.b", "a.b_2", "a.b_2_2"]);
        assert_eq!(result.rows[0].get("a.b"), Some(&DataValue::Int(1)));
        assert_eq!(result.rows[0].get("a.b_2"), Some(&DataValue::Int(2)));
        assert_eq!(result.rows[0].get("a.b_2_2"), Some(&DataValue::Int(3)));
    }
}
