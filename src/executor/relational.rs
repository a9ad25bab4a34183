use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use tracing::info;

use crate::{
    binder::{BoundQuery, BoundStatement},
    catalog::BackendKind,
    executor::{ExecutionError, QueryExecutor, TabularResult},
    value::DataValue,
};

/// Raw answer of a relational driver: projection names plus positional cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<DataValue>>,
}

/// Driver seam for relational backends.
///
/// Implementations acquire a pooled connection for the duration of one call.
#[async_trait]
pub trait RelationalClient: Send + Sync {
    async fn fetch(&self, statement: &BoundStatement) -> Result<RawRows, ExecutionError>;
}

pub struct RelationalExecutor {
    client: Arc<dyn RelationalClient>,
}

impl RelationalExecutor {
    pub fn new(client: Arc<dyn RelationalClient>) -> Self {
        Self { client }
    }

    /// `SELECT a.id, b.id` projects `id` twice; the second becomes `id_2`.
    fn unique_columns(columns: Vec<String>) -> Vec<String> {
        let mut used: HashSet<String> = HashSet::with_capacity(columns.len());
        let mut out = Vec::with_capacity(columns.len());
        for name in columns {
            let mut candidate = name.clone();
            let mut n = 2;
            while used.contains(&candidate) {
                candidate = format!("{name}_{n}");
                n += 1;
            }
            used.insert(candidate.clone());
            out.push(candidate);
        }
        out
    }
}

#[async_trait]
impl QueryExecutor for RelationalExecutor {
    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn execute(&self, query: &BoundQuery) -> Result<TabularResult, ExecutionError> {
        let BoundQuery::Relational(statement) = query else {
            return Err(ExecutionError::BackendMismatch { backend: BackendKind::Relational, found: query.backend() });
        };
        let raw = self.client.fetch(statement).await?;
        let columns = Self::unique_columns(raw.columns);
        let result = TabularResult::from_cells(columns, raw.rows);
        info!(backend = "relational", rows = result.len(), "query executed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::BoundPipeline;
    use std::sync::Mutex;

    struct FakeClient {
        answer: Result<RawRows, ExecutionError>,
        seen: Mutex<Vec<BoundStatement>>,
    }

    #[async_trait]
    impl RelationalClient for FakeClient {
        async fn fetch(&self, statement: &BoundStatement) -> Result<RawRows, ExecutionError> {
            self.seen.lock().unwrap().push(statement.clone());
            self.answer.clone()
        }
    }

    fn executor(answer: Result<RawRows, ExecutionError>) -> (RelationalExecutor, Arc<FakeClient>) {
        let client = Arc::new(FakeClient { answer, seen: Mutex::new(vec![]) });
        (RelationalExecutor::new(client.clone()), client)
    }

    fn statement() -> BoundQuery {
        BoundQuery::Relational(BoundStatement { text: "SELECT 1".into(), binds: Default::default() })
    }

    #[tokio::test]
    async fn materializes_rows_in_projection_order() {
        let (exec, client) = executor(Ok(RawRows {
            columns: vec!["battery_range".into(), "device_count".into()],
            rows: vec![vec![DataValue::Text("80-100%".into()), DataValue::Int(3)]],
        }));
        let result = exec.execute(&statement()).await.unwrap();
        assert_eq!(result.columns, vec!["battery_range", "device_count"]);
        assert_eq!(result.rows[0].get("device_count"), Some(&DataValue::Int(3)));
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_projection_names_get_a_suffix() {
        let (exec, _) = executor(Ok(RawRows {
            columns: vec!["id".into(), "name".into(), "id".into(), "id".into()],
            rows: vec![vec![DataValue::Int(1), DataValue::Text("a".into()), DataValue::Int(2), DataValue::Int(3)]],
        }));
        let result = exec.execute(&statement()).await.unwrap();
        assert_eq!(result.columns, vec!["id", "name", "id_2", "id_3"]);
        assert_eq!(result.rows[0].get("id_2"), Some(&DataValue::Int(2)));
        assert_eq!(result.rows[0].get("id_3"), Some(&DataValue::Int(3)));
    }

    #[tokio::test]
    async fn rejects_document_artifacts_without_calling_the_driver() {
        let (exec, client) = executor(Ok(RawRows::default()));
        let query = BoundQuery::Document(BoundPipeline { collection: "alerts".into(), stages: vec![] });
        let err = exec.execute(&query).await.unwrap_err();
        assert_eq!(err, ExecutionError::BackendMismatch { backend: BackendKind::Relational, found: BackendKind::Document });
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn driver_errors_pass_through() {
        let (exec, _) = executor(Err(ExecutionError::connection(BackendKind::Relational, "refused")));
        assert!(exec.execute(&statement()).await.unwrap_err().is_connection());
    }
}
