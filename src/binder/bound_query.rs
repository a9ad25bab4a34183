use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    binder::{PositionalStatement, SqlScanner},
    catalog::BackendKind,
    value::{DataValue, ParamValue},
};

/// Relational artifact: untouched statement text plus typed bind variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundStatement {
    pub text: String,
    pub binds: IndexMap<String, ParamValue>,
}

impl BoundStatement {
    /// Positional form for drivers that only speak `$n`.
    pub fn positional(&self) -> PositionalStatement {
        SqlScanner::to_positional(&self.text)
    }
}

/// Document artifact: a pipeline with every placeholder resolved to a typed
/// literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundPipeline {
    pub collection: String,
    pub stages: Vec<DataValue>,
}

/// Fully bound, backend-ready query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BoundQuery {
    Relational(BoundStatement),
    Document(BoundPipeline),
}

impl BoundQuery {
    pub fn backend(&self) -> BackendKind {
        match self {
            BoundQuery::Relational(_) => BackendKind::Relational,
            BoundQuery::Document(_) => BackendKind::Document,
        }
    }
}
