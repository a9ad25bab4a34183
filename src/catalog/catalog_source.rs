use std::{fs, path::Path};

use serde::Deserialize;

use crate::catalog::{CatalogError, ChartSpec, PipelineNode, QueryDefinition};

/// Version of the catalog document format this crate understands.
pub const CATALOG_VERSION: u32 = 1;

static BUILTIN_CATALOG: &str = include_str!("../../catalogs/eldercare.json");

/// Static, versioned description of the query catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSource {
    pub version: u32,
    #[serde(default)]
    pub relational: Vec<RelationalEntry>,
    #[serde(default)]
    pub document: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationalEntry {
    pub name: String,
    pub sql: String,
    #[serde(default)]
    pub chart: ChartSpec,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    pub collection: String,
    pub aggregate: Vec<PipelineNode>,
    #[serde(default)]
    pub chart: ChartSpec,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub params: Vec<String>,
}

impl CatalogSource {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(text).map_err(|e| CatalogError::Malformed(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    pub fn check_version(&self) -> Result<(), CatalogError> {
        if self.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion { found: self.version, expected: CATALOG_VERSION });
        }
        Ok(())
    }

    /// Relational entries first, then document entries, each in file order.
    pub fn into_definitions(self) -> Vec<QueryDefinition> {
        let relational = self.relational.into_iter().map(|e| {
            QueryDefinition::relational(&e.name, &e.sql)
                .with_chart(e.chart)
                .with_roles(e.tags)
                .with_params(e.params)
        });
        let document = self.document.into_iter().map(|e| {
            QueryDefinition::document(&e.name, &e.collection, e.aggregate)
                .with_chart(e.chart)
                .with_roles(e.tags)
                .with_params(e.params)
        });
        relational.chain(document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BackendKind, QueryCatalog, SchemaQualifier};

    #[test]
    fn builtin_catalog_loads_and_validates() {
        let catalog = QueryCatalog::builtin(SchemaQualifier::default()).unwrap();
        assert_eq!(catalog.of_backend(BackendKind::Relational).count(), 14);
        assert_eq!(catalog.of_backend(BackendKind::Document).count(), 12);
        assert!(catalog.get("患者: 我的设备电池状态").is_some());
        assert!(catalog.get("管理员: 设备电池状态分布").unwrap().params.is_empty());
    }

    #[test]
    fn rejects_other_versions() {
        let err = QueryCatalog::load(
            CatalogSource::from_json_str(r#"{"version": 9}"#).unwrap(),
            SchemaQualifier::default(),
        )
        .unwrap_err();
        assert_eq!(err, CatalogError::UnsupportedVersion { found: 9, expected: CATALOG_VERSION });
    }

    #[test]
    fn decodes_entries_with_defaults() {
        let source = CatalogSource::from_json_str(
            r#"{
                "version": 1,
                "relational": [{"name": "n", "sql": "SELECT 1"}],
                "document": [{"name": "d", "collection": "alerts", "aggregate": [{"$limit": 1}], "tags": ["admin"]}]
            }"#,
        )
        .unwrap();
        let defs = source.into_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].chart, ChartSpec::Table);
        assert!(defs[0].roles.is_empty());
        assert_eq!(defs[1].roles, vec!["admin".to_string()]);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(CatalogSource::from_json_str("{"), Err(CatalogError::Malformed(_))));
    }
}
