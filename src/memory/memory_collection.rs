use std::path::Path;

use serde_json::Value;

use crate::{
    memory::{from_extended_json, SnapshotError},
    value::{DataValue, Document},
};

/// Documents of one collection, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryCollection {
    pub name: String,
    documents: Vec<Document>,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), documents: Vec::new() }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Appends every object of a JSON array; anything that is not an object
    /// is skipped. Returns how many documents were added.
    pub fn add_batch(&mut self, items: Vec<Value>) -> usize {
        let before = self.documents.len();
        for item in items {
            if let DataValue::Document(doc) = from_extended_json(item) {
                self.documents.push(doc);
            }
        }
        self.documents.len() - before
    }

    /// Replaces (or with `keep`, extends) the contents from a JSON array.
    pub fn load_from_json(&mut self, json_value: Value, keep: bool, origin: &str) -> Result<usize, SnapshotError> {
        let Value::Array(items) = json_value else {
            return Err(SnapshotError::NotAnArray { path: origin.to_string() });
        };
        if !keep {
            self.documents.clear();
        }
        Ok(self.add_batch(items))
    }

    pub async fn load_from_file(&mut self, file_path: &Path) -> Result<usize, SnapshotError> {
        let path = file_path.display().to_string();
        let content = tokio::fs::read_to_string(file_path)
            .await
            .map_err(|e| SnapshotError::Io { path: path.clone(), message: e.to_string() })?;
        let json_value = serde_json::from_str::<Value>(&content)
            .map_err(|e| SnapshotError::Json { path: path.clone(), message: e.to_string() })?;
        self.load_from_json(json_value, false, &path)
    }

    /// Approximate storage footprint: the serialized size of every document.
    pub fn storage_size(&self) -> u64 {
        self.documents
            .iter()
            .map(|doc| serde_json::to_vec(doc).map(|bytes| bytes.len() as u64).unwrap_or(0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_objects_and_skips_scalars() {
        let mut coll = MemoryCollection::new("alerts");
        let added = coll
            .load_from_json(json!([{"severity": "high"}, 3, {"severity": "low"}]), false, "inline")
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(coll.count(), 2);
        assert!(coll.storage_size() > 0);
    }

    #[test]
    fn rejects_non_arrays() {
        let mut coll = MemoryCollection::new("alerts");
        let err = coll.load_from_json(json!({"severity": "high"}), false, "inline").unwrap_err();
        assert_eq!(err, SnapshotError::NotAnArray { path: "inline".into() });
    }
}
