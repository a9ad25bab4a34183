use std::collections::HashMap;

use tracing::{debug, info};

use crate::catalog::{
    role_filter, BackendKind, CatalogError, CatalogSource, QueryDefinition, QueryTemplate, SchemaQualifier,
};

/// Collects definitions, qualifies their relational templates and enforces
/// the catalog invariants. Consumed by [`QueryCatalogBuilder::build`].
#[derive(Debug, Default)]
pub struct QueryCatalogBuilder {
    qualifier: SchemaQualifier,
    definitions: Vec<QueryDefinition>,
    index: HashMap<String, usize>,
}

impl QueryCatalogBuilder {
    pub fn new(qualifier: SchemaQualifier) -> Self {
        Self { qualifier, ..Default::default() }
    }

    /// Add a definition. Fails on a duplicate name or when the template
    /// references a placeholder the definition does not declare.
    pub fn register(&mut self, definition: QueryDefinition) -> Result<(), CatalogError> {
        if self.index.contains_key(&definition.name) {
            return Err(CatalogError::DuplicateName(definition.name));
        }

        let mut definition = definition;
        if let QueryTemplate::Relational { statement } = &mut definition.template {
            *statement = self.qualifier.qualify(statement);
        }

        if let Some(placeholder) = definition.undeclared_placeholders().into_iter().next() {
            return Err(CatalogError::UndeclaredPlaceholder { query: definition.name, placeholder });
        }

        debug!(query = %definition.name, backend = %definition.backend(), "registered query");
        self.index.insert(definition.name.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    pub fn build(self) -> QueryCatalog {
        QueryCatalog {
            schema: self.qualifier.schema().to_string(),
            definitions: self.definitions,
            index: self.index,
        }
    }
}

/// Immutable registry of query definitions, built once at startup and
/// shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct QueryCatalog {
    schema: String,
    definitions: Vec<QueryDefinition>,
    index: HashMap<String, usize>,
}

impl QueryCatalog {
    /// Register every entry of `source`, relational entries first.
    pub fn load(source: CatalogSource, qualifier: SchemaQualifier) -> Result<Self, CatalogError> {
        source.check_version()?;
        let version = source.version;
        let mut builder = QueryCatalogBuilder::new(qualifier);
        for definition in source.into_definitions() {
            builder.register(definition)?;
        }
        let catalog = builder.build();
        info!(version, schema = %catalog.schema, queries = catalog.len(), "query catalog loaded");
        Ok(catalog)
    }

    /// The catalog compiled into the binary, qualified with `qualifier`.
    pub fn builtin(qualifier: SchemaQualifier) -> Result<Self, CatalogError> {
        Self::load(CatalogSource::builtin()?, qualifier)
    }

    pub fn all(&self) -> &[QueryDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&QueryDefinition> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    pub fn of_backend(&self, backend: BackendKind) -> impl Iterator<Item = &QueryDefinition> {
        self.definitions.iter().filter(move |d| d.backend() == backend)
    }

    pub fn visible_to(&self, role: &str) -> Vec<&QueryDefinition> {
        role_filter::visible_to(role, self)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
