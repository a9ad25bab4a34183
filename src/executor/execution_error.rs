use thiserror::Error;

use crate::catalog::BackendKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("cannot reach {backend} backend: {message}")]
    Connection { backend: BackendKind, message: String },
    #[error("{backend} backend rejected the query: {message}")]
    Backend { backend: BackendKind, message: String },
    #[error("executor for {backend} received a {found} query")]
    BackendMismatch { backend: BackendKind, found: BackendKind },
    #[error("unknown collection `{0}`")]
    UnknownCollection(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ExecutionError {
    pub fn connection(backend: BackendKind, message: impl ToString) -> Self {
        ExecutionError::Connection { backend, message: message.to_string() }
    }

    pub fn backend(backend: BackendKind, message: impl ToString) -> Self {
        ExecutionError::Backend { backend, message: message.to_string() }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ExecutionError::Connection { .. })
    }
}
