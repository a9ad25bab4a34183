use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    catalog::BackendKind,
    executor::{AggregateOptions, DocumentClient, ExecutionError},
    memory::{MemoryCollection, Pipeline, SnapshotError},
    value::{DataValue, Document},
};

const SERVER_VERSION: &str = concat!("vitalboard-memory/", env!("CARGO_PKG_VERSION"));

/// Document backend held entirely in memory.
///
/// Filled from JSON snapshot files (one array per collection) and queried
/// with the same aggregation pipelines a document server would receive.
pub struct MemoryDocumentStore {
    database: String,
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryDocumentStore {
    pub fn new(database: &str) -> Self {
        Self { database: database.to_string(), collections: RwLock::new(HashMap::new()) }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Creates or replaces `name` with the documents of a JSON array.
    pub fn load_from_json(&self, name: &str, json_value: Value) -> Result<usize, SnapshotError> {
        let mut collection = MemoryCollection::new(name);
        let added = collection.load_from_json(json_value, false, name)?;
        self.write().insert(name.to_string(), collection);
        Ok(added)
    }

    pub async fn load_from_file(&self, name: &str, file_path: &Path) -> Result<usize, SnapshotError> {
        let mut collection = MemoryCollection::new(name);
        let added = collection.load_from_file(file_path).await?;
        self.write().insert(name.to_string(), collection);
        Ok(added)
    }

    /// Loads every `<collection>.json` file in `dir`. Files that fail to load
    /// are logged and skipped; the number of loaded collections is returned.
    pub async fn load_snapshot_dir(&self, dir: &Path) -> Result<usize, SnapshotError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| SnapshotError::Io { path: dir.display().to_string(), message: e.to_string() })?;

        let mut loaded = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(SnapshotError::Io { path: dir.display().to_string(), message: e.to_string() }),
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match self.load_from_file(&name, &path).await {
                Ok(count) => {
                    info!(collection = %name, documents = count, "snapshot loaded");
                    loaded += 1;
                }
                Err(error) => warn!(%error, "snapshot skipped"),
            }
        }
        Ok(loaded)
    }

    fn snapshot(&self, collection: &str) -> Result<Vec<Document>, ExecutionError> {
        self.read()
            .get(collection)
            .map(|c| c.documents().to_vec())
            .ok_or_else(|| ExecutionError::UnknownCollection(collection.to_string()))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, MemoryCollection>> {
        self.collections.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, MemoryCollection>> {
        self.collections.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentClient for MemoryDocumentStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn aggregate(
        &self,
        collection: &str,
        stages: &[DataValue],
        options: &AggregateOptions,
    ) -> Result<Vec<DataValue>, ExecutionError> {
        let pipeline = Pipeline::parse(stages).map_err(|e| ExecutionError::backend(BackendKind::Document, e))?;
        let documents = self.snapshot(collection)?;
        debug!(collection, stages = stages.len(), allow_disk_use = options.allow_disk_use, "aggregating in memory");
        let out = pipeline.run(documents).map_err(|e| ExecutionError::backend(BackendKind::Document, e))?;
        Ok(out.into_iter().map(DataValue::Document).collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>, ExecutionError> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn estimated_document_count(&self, collection: &str) -> Result<u64, ExecutionError> {
        self.read()
            .get(collection)
            .map(|c| c.count() as u64)
            .ok_or_else(|| ExecutionError::UnknownCollection(collection.to_string()))
    }

    async fn storage_size(&self) -> Result<u64, ExecutionError> {
        Ok(self.read().values().map(MemoryCollection::storage_size).sum())
    }

    async fn server_version(&self) -> Result<Option<String>, ExecutionError> {
        Ok(Some(SERVER_VERSION.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binder::{BoundQuery, ParameterContext, QueryBinder},
        catalog::{QueryCatalog, SchemaQualifier},
        executor::{DocumentExecutor, QueryExecutor},
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn store() -> Arc<MemoryDocumentStore> {
        let store = MemoryDocumentStore::new("eldercare");
        store
            .load_from_json(
                "sensor_readings",
                json!([
                    {"patient_id": 1, "timestamp": {"$date": "2025-05-01T08:10:00Z"}, "heart_rate": 70, "spo2": 97, "blood_pressure": "118/76"},
                    {"patient_id": 1, "timestamp": {"$date": "2025-05-01T08:40:00Z"}, "heart_rate": 80, "spo2": 90, "blood_pressure": "142/90"},
                    {"patient_id": 2, "timestamp": {"$date": "2025-05-01T09:05:00Z"}, "heart_rate": 65, "spo2": 88},
                    {"patient_id": 1, "timestamp": {"$date": "2025-03-01T09:05:00Z"}, "heart_rate": 99, "spo2": 99}
                ]),
            )
            .unwrap();
        store
            .load_from_json(
                "device_status",
                json!([
                    {"sensor_id": "s1", "patient_id": 1, "timestamp": {"$date": "2025-05-01T08:00:00Z"}, "battery_level": 85, "is_active": true},
                    {"sensor_id": "s2", "patient_id": 2, "timestamp": {"$date": "2025-05-01T08:00:00Z"}, "battery_level": 12, "is_active": true},
                    {"sensor_id": "s3", "patient_id": 3, "timestamp": {"$date": "2025-05-01T08:00:00Z"}, "is_active": false}
                ]),
            )
            .unwrap();
        store
            .load_from_json(
                "alerts",
                json!([
                    {"patient_id": 1, "alert_type": "fall", "severity": "high", "timestamp": {"$date": "2025-05-01T08:00:00Z"}},
                    {"patient_id": 2, "alert_type": "hr", "severity": "low", "timestamp": {"$date": "2025-05-01T09:00:00Z"}}
                ]),
            )
            .unwrap();
        store
            .load_from_json(
                "audit_logs",
                json!([
                    {"user_id": 1, "action": "login", "timestamp": {"$date": "2025-05-01T08:00:00Z"}},
                    {"user_id": 2, "action": "login", "timestamp": {"$date": "2025-05-02T08:00:00Z"}}
                ]),
            )
            .unwrap();
        store.into_shared()
    }

    fn context() -> ParameterContext {
        ParameterContext::new()
            .with("patient_id", 1)
            .with("battery_threshold", 20)
            .with("since", Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap())
    }

    async fn run(name: &str) -> crate::executor::TabularResult {
        let catalog = QueryCatalog::builtin(SchemaQualifier::default()).unwrap();
        let bound = QueryBinder::bind(catalog.get(name).unwrap(), &context()).unwrap();
        DocumentExecutor::new(store(), AggregateOptions::default()).execute(&bound).await.unwrap()
    }

    #[tokio::test]
    async fn every_builtin_document_query_runs() {
        let catalog = QueryCatalog::builtin(SchemaQualifier::default()).unwrap();
        let exec = DocumentExecutor::new(store(), AggregateOptions::default());
        for def in catalog.of_backend(BackendKind::Document) {
            let bound = QueryBinder::bind(def, &context()).unwrap();
            assert!(matches!(bound, BoundQuery::Document(_)));
            if let Err(e) = exec.execute(&bound).await {
                panic!("{} failed: {e}", def.name);
            }
        }
    }

    #[tokio::test]
    async fn heart_rate_trend_is_hourly_and_windowed() {
        let result = run("传感器: 患者心率趋势").await;
        assert_eq!(result.columns, vec!["_id", "avg_heart_rate", "count"]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows[0].get("avg_heart_rate"), Some(&DataValue::Float(75.0)));
        assert_eq!(result.rows[0].get("count"), Some(&DataValue::Int(2)));
    }

    #[tokio::test]
    async fn low_battery_uses_the_threshold_parameter() {
        let result = run("设备: 低电量设备警报").await;
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows[0].get("_id"), Some(&DataValue::Text("s2".into())));
    }

    #[tokio::test]
    async fn overview_reports_collections() {
        let exec = DocumentExecutor::new(store(), AggregateOptions::default());
        let overview = exec.overview().await.unwrap();
        assert_eq!(overview.collections, 4);
        assert_eq!(overview.total_documents, 11);
        assert_eq!(overview.database, "eldercare");
    }

    #[tokio::test]
    async fn unknown_collection_is_an_error() {
        let err = store().aggregate("nope", &[], &AggregateOptions::default()).await.unwrap_err();
        assert_eq!(err, ExecutionError::UnknownCollection("nope".into()));
    }

    #[tokio::test]
    async fn snapshot_directory_loading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alerts.json"), r#"[{"severity": "high"}]"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = MemoryDocumentStore::new("eldercare");
        assert_eq!(store.load_snapshot_dir(dir.path()).await.unwrap(), 1);
        assert_eq!(store.list_collections().await.unwrap(), vec!["alerts".to_string()]);
        assert_eq!(store.estimated_document_count("alerts").await.unwrap(), 1);
    }
}
