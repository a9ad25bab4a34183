use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::CatalogError;

/// Token that relational templates use in front of every table name.
pub const SCHEMA_TOKEN: &str = "{S}.";

pub const DEFAULT_SCHEMA: &str = "public";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,62}$").expect("identifier pattern"));

/// Resolves `{S}.` table qualification to the configured schema.
///
/// This is a structural rewrite of catalog text done once at load time. It is
/// independent of parameter binding and never sees operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaQualifier {
    schema: String,
}

impl SchemaQualifier {
    pub fn new(schema: &str) -> Result<Self, CatalogError> {
        if !IDENTIFIER.is_match(schema) {
            return Err(CatalogError::InvalidSchemaName(schema.to_string()));
        }
        Ok(Self { schema: schema.to_string() })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn qualify(&self, statement: &str) -> String {
        statement.replace(SCHEMA_TOKEN, &format!("{}.", self.schema))
    }
}

impl Default for SchemaQualifier {
    fn default() -> Self {
        Self { schema: DEFAULT_SCHEMA.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_every_table_reference() {
        let q = SchemaQualifier::new("eldercare").unwrap();
        let sql = q.qualify("SELECT * FROM {S}.alert a JOIN {S}.patient p ON a.id = p.id");
        assert_eq!(sql, "SELECT * FROM eldercare.alert a JOIN eldercare.patient p ON a.id = p.id");
    }

    #[test]
    fn leaves_placeholders_alone() {
        let q = SchemaQualifier::default();
        assert_eq!(q.qualify("WHERE id = :patient_id"), "WHERE id = :patient_id");
    }

    #[test]
    fn rejects_non_identifiers() {
        assert_eq!(
            SchemaQualifier::new("public; DROP TABLE x"),
            Err(CatalogError::InvalidSchemaName("public; DROP TABLE x".into()))
        );
        assert!(SchemaQualifier::new("").is_err());
    }
}
