use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("cannot read snapshot `{path}`: {message}")]
    Io { path: String, message: String },
    #[error("snapshot `{path}` is not valid JSON: {message}")]
    Json { path: String, message: String },
    #[error("snapshot `{path}` must hold a JSON array of documents")]
    NotAnArray { path: String },
}
