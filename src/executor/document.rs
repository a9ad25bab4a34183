use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::{
    binder::BoundQuery,
    catalog::BackendKind,
    executor::{flatten_documents, ExecutionError, QueryExecutor, TabularResult},
    value::DataValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Lets large `$group`/`$sort` stages spill to disk on the server.
    pub allow_disk_use: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self { allow_disk_use: true }
    }
}

/// Driver seam for document backends.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    fn database(&self) -> &str;

    async fn aggregate(
        &self,
        collection: &str,
        stages: &[DataValue],
        options: &AggregateOptions,
    ) -> Result<Vec<DataValue>, ExecutionError>;

    async fn list_collections(&self) -> Result<Vec<String>, ExecutionError>;

    async fn estimated_document_count(&self, collection: &str) -> Result<u64, ExecutionError>;

    async fn storage_size(&self) -> Result<u64, ExecutionError>;

    async fn server_version(&self) -> Result<Option<String>, ExecutionError>;
}

/// Summary numbers shown above the document panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOverview {
    pub database: String,
    pub collections: usize,
    pub total_documents: u64,
    pub storage_bytes: u64,
    pub version: Option<String>,
}

impl DocumentOverview {
    /// Labelled, display-formatted figures.
    pub fn metrics(&self) -> Vec<(&'static str, String)> {
        vec![
            ("DB", self.database.clone()),
            ("Collections", group_thousands(self.collections as u64)),
            ("Total docs (est.)", group_thousands(self.total_documents)),
            ("Storage", format!("{:.1} MB", self.storage_bytes as f64 / 1024.0 / 1024.0)),
            ("Version", self.version.clone().unwrap_or_else(|| "unknown".to_string())),
        ]
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub struct DocumentExecutor {
    client: Arc<dyn DocumentClient>,
    options: AggregateOptions,
}

impl DocumentExecutor {
    pub fn new(client: Arc<dyn DocumentClient>, options: AggregateOptions) -> Self {
        Self { client, options }
    }

    pub async fn overview(&self) -> Result<DocumentOverview, ExecutionError> {
        let collections = self.client.list_collections().await?;
        let mut total_documents = 0;
        for name in &collections {
            total_documents += self.client.estimated_document_count(name).await?;
        }
        Ok(DocumentOverview {
            database: self.client.database().to_string(),
            collections: collections.len(),
            total_documents,
            storage_bytes: self.client.storage_size().await?,
            version: self.client.server_version().await?,
        })
    }
}

#[async_trait]
impl QueryExecutor for DocumentExecutor {
    fn backend(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn execute(&self, query: &BoundQuery) -> Result<TabularResult, ExecutionError> {
        let BoundQuery::Document(pipeline) = query else {
            return Err(ExecutionError::BackendMismatch { backend: BackendKind::Document, found: query.backend() });
        };
        let documents = self.client.aggregate(&pipeline.collection, &pipeline.stages, &self.options).await?;
        let result = flatten_documents(documents);
        info!(backend = "document", collection = %pipeline.collection, rows = result.len(), "query executed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::BoundPipeline;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeClient {
        seen_options: Mutex<Vec<AggregateOptions>>,
    }

    #[async_trait]
    impl DocumentClient for FakeClient {
        fn database(&self) -> &str {
            "eldercare"
        }

        async fn aggregate(
            &self,
            collection: &str,
            _stages: &[DataValue],
            options: &AggregateOptions,
        ) -> Result<Vec<DataValue>, ExecutionError> {
            self.seen_options.lock().unwrap().push(*options);
            match collection {
                "alerts" => Ok(vec![
                    DataValue::from(json!({"_id": {"type": "fall"}, "n": 2})),
                    DataValue::from(json!({"_id": {"type": "hr"}, "n": 1, "extra": true})),
                ]),
                other => Err(ExecutionError::UnknownCollection(other.to_string())),
            }
        }

        async fn list_collections(&self) -> Result<Vec<String>, ExecutionError> {
            Ok(vec!["alerts".into(), "sensor_readings".into()])
        }

        async fn estimated_document_count(&self, collection: &str) -> Result<u64, ExecutionError> {
            Ok(if collection == "alerts" { 1_200 } else { 1_000_000 })
        }

        async fn storage_size(&self) -> Result<u64, ExecutionError> {
            Ok(3 * 1024 * 1024 + 512 * 1024)
        }

        async fn server_version(&self) -> Result<Option<String>, ExecutionError> {
            Ok(None)
        }
    }

    fn pipeline(collection: &str) -> BoundQuery {
        BoundQuery::Document(BoundPipeline { collection: collection.into(), stages: vec![] })
    }

    #[tokio::test]
    async fn flattens_and_forwards_disk_use() {
        let client = Arc::new(FakeClient::default());
        let exec = DocumentExecutor::new(client.clone(), AggregateOptions { allow_disk_use: true });
        let result = exec.execute(&pipeline("alerts")).await.unwrap();
        assert_eq!(result.columns, vec!["_id.type", "n", "extra"]);
        assert_eq!(result.rows[0].get("extra"), Some(&DataValue::Null));
        assert!(client.seen_options.lock().unwrap()[0].allow_disk_use);
    }

    #[tokio::test]
    async fn unknown_collection_surfaces_as_execution_error() {
        let exec = DocumentExecutor::new(Arc::new(FakeClient::default()), AggregateOptions::default());
        let err = exec.execute(&pipeline("nope")).await.unwrap_err();
        assert_eq!(err, ExecutionError::UnknownCollection("nope".into()));
    }

    #[tokio::test]
    async fn overview_sums_estimated_counts() {
        let exec = DocumentExecutor::new(Arc::new(FakeClient::default()), AggregateOptions::default());
        let overview = exec.overview().await.unwrap();
        assert_eq!(overview.total_documents, 1_001_200);
        assert_eq!(
            overview.metrics(),
            vec![
                ("DB", "eldercare".to_string()),
                ("Collections", "2".to_string()),
                ("Total docs (est.)", "1,001,200".to_string()),
                ("Storage", "3.5 MB".to_string()),
                ("Version", "unknown".to_string()),
            ]
        );
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(12_345_678), "12,345,678");
    }
}
