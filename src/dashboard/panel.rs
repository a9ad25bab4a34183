use std::{fmt::Display, sync::Arc};

use serde::Serialize;
use thiserror::Error;

use crate::{
    binder::BindError,
    catalog::BackendKind,
    dashboard::ControlsError,
    executor::{ExecutionError, TabularResult},
    render::{ChartOutput, RenderError},
};

/// Coarse classification shown to the operator next to a failed panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PanelErrorKind {
    Connection,
    MissingParameter,
    Binding,
    Execution,
    Render,
    Selection,
}

impl Display for PanelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PanelErrorKind::Connection => "connection",
            PanelErrorKind::MissingParameter => "missing parameter",
            PanelErrorKind::Binding => "binding",
            PanelErrorKind::Execution => "execution",
            PanelErrorKind::Render => "render",
            PanelErrorKind::Selection => "selection",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanelError {
    #[error("unknown query `{0}`")]
    UnknownQuery(String),
    #[error("query `{query}` is not available to role `{role}`")]
    NotVisible { query: String, role: String },
    #[error("{0} backend is not configured")]
    BackendUnavailable(BackendKind),
    #[error(transparent)]
    Controls(#[from] ControlsError),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl PanelError {
    pub fn kind(&self) -> PanelErrorKind {
        match self {
            PanelError::UnknownQuery(_) | PanelError::NotVisible { .. } => PanelErrorKind::Selection,
            PanelError::BackendUnavailable(_) => PanelErrorKind::Connection,
            PanelError::Controls(_) => PanelErrorKind::Binding,
            PanelError::Bind(BindError::MissingParameters { .. }) => PanelErrorKind::MissingParameter,
            PanelError::Bind(_) => PanelErrorKind::Binding,
            PanelError::Execution(e) if e.is_connection() => PanelErrorKind::Connection,
            PanelError::Execution(_) => PanelErrorKind::Execution,
        }
    }
}

/// One executed panel. A chart that could not be shaped falls back to a
/// table and keeps the reason in `render_error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelOutput {
    pub query: String,
    pub backend: BackendKind,
    pub result: Arc<TabularResult>,
    pub chart: ChartOutput,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub render_error: Option<RenderError>,
}

impl PanelOutput {
    /// Kind of the degradation this panel carries, if any.
    pub fn error_kind(&self) -> Option<PanelErrorKind> {
        self.render_error.as_ref().map(|_| PanelErrorKind::Render)
    }
}

fn serialize_error<S: serde::Serializer>(error: &Option<RenderError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// The query chosen for each backend panel. `None` leaves the panel idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelSelection {
    pub relational: Option<String>,
    pub document: Option<String>,
}

impl PanelSelection {
    pub fn new(relational: Option<&str>, document: Option<&str>) -> Self {
        Self { relational: relational.map(str::to_string), document: document.map(str::to_string) }
    }

    pub fn get(&self, backend: BackendKind) -> Option<&str> {
        match backend {
            BackendKind::Relational => self.relational.as_deref(),
            BackendKind::Document => self.document.as_deref(),
        }
    }
}

/// Outcome of both panels. Each side succeeds or fails on its own.
#[derive(Debug)]
pub struct PanelReport {
    pub relational: Option<Result<PanelOutput, PanelError>>,
    pub document: Option<Result<PanelOutput, PanelError>>,
}

impl PanelReport {
    pub fn get(&self, backend: BackendKind) -> Option<&Result<PanelOutput, PanelError>> {
        match backend {
            BackendKind::Relational => self.relational.as_ref(),
            BackendKind::Document => self.document.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        let missing = PanelError::from(BindError::MissingParameters { query: "q".into(), names: vec!["patient_id".into()] });
        assert_eq!(missing.kind(), PanelErrorKind::MissingParameter);

        let down = PanelError::from(ExecutionError::connection(BackendKind::Relational, "refused"));
        assert_eq!(down.kind(), PanelErrorKind::Connection);

        let rejected = PanelError::from(ExecutionError::backend(BackendKind::Relational, "syntax error"));
        assert_eq!(rejected.kind(), PanelErrorKind::Execution);
        assert!(rejected.to_string().contains("syntax error"));

        let hidden = PanelError::NotVisible { query: "q".into(), role: "patient".into() };
        assert_eq!(hidden.kind(), PanelErrorKind::Selection);
    }
}
