use thiserror::Error;

/// Failures while loading or registering catalog entries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("query `{0}` is already registered")]
    DuplicateName(String),
    #[error("query `{query}` references undeclared placeholder `:{placeholder}`")]
    UndeclaredPlaceholder { query: String, placeholder: String },
    #[error("`{0}` is not a valid schema name")]
    InvalidSchemaName(String),
    #[error("catalog version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("cannot read catalog {path}: {message}")]
    Io { path: String, message: String },
    #[error("malformed catalog: {0}")]
    Malformed(String),
}
