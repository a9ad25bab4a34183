use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cannot read config `{path}`: {message}")]
    Io { path: String, message: String },
    #[error("config `{path}` is malformed: {message}")]
    Malformed { path: String, message: String },
    #[error("invalid value `{value}` for {field}: {reason}")]
    Invalid { field: String, value: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::Invalid { field: field.to_string(), value: value.to_string(), reason: reason.to_string() }
    }
}
