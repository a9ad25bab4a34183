use async_trait::async_trait;

use crate::{
    binder::BoundQuery,
    catalog::BackendKind,
    executor::{ExecutionError, TabularResult},
};

/// Runs a bound query against one backend and normalizes the answer.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn backend(&self) -> BackendKind;

    async fn execute(&self, query: &BoundQuery) -> Result<TabularResult, ExecutionError>;
}
