use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("chart field `{role}` refers to missing column `{column}`")]
    MissingColumn { role: String, column: String },
    #[error("column `{column}` holds a non-numeric {found} value")]
    NonNumeric { column: String, found: String },
}
