use thiserror::Error;

/// Binding failures. Raised before anything is sent to a backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("query `{query}` is missing parameters: {}", names.join(", "))]
    MissingParameters { query: String, names: Vec<String> },
    #[error("query `{query}` references undeclared placeholder `:{placeholder}`")]
    UndeclaredPlaceholder { query: String, placeholder: String },
}
