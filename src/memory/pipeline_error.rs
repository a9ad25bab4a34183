use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("unrecognized pipeline stage `{0}`")]
    UnknownStage(String),
    #[error("unrecognized expression operator `{0}`")]
    UnknownOperator(String),
    #[error("unrecognized accumulator `{0}`")]
    UnknownAccumulator(String),
    #[error("invalid `{stage}` stage: {message}")]
    InvalidStage { stage: String, message: String },
    #[error("`{operator}` {message}")]
    InvalidExpression { operator: String, message: String },
}

impl PipelineError {
    pub fn stage(stage: &str, message: impl Into<String>) -> Self {
        PipelineError::InvalidStage { stage: stage.to_string(), message: message.into() }
    }

    pub fn expression(operator: &str, message: impl Into<String>) -> Self {
        PipelineError::InvalidExpression { operator: operator.to_string(), message: message.into() }
    }
}
