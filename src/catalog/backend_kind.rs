use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// The two kinds of data store a query can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Statement text with typed bind variables.
    Relational,
    /// Aggregation pipeline over a document collection.
    Document,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Relational => "relational",
            BackendKind::Document => "document",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relational" | "postgres" | "sql" => Ok(BackendKind::Relational),
            "document" | "mongo" | "mongodb" => Ok(BackendKind::Document),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}
