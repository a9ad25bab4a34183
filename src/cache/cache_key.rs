use std::fmt::Display;

use crate::{binder::ParameterContext, catalog::BackendKind, value::ParamValue};

/// Identity of one cached execution: backend, query name and the sorted
/// parameter values the query declares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub backend: BackendKind,
    pub query: String,
    pub params: Vec<(String, ParamValue)>,
}

impl CacheKey {
    pub fn new(backend: BackendKind, query: impl Into<String>, mut params: Vec<(String, ParamValue)>) -> Self {
        params.sort_by(|a, b| a.0.cmp(&b.0));
        Self { backend, query: query.into(), params }
    }

    /// Key over the declared subset of `context`. Undeclared values do not
    /// split the cache.
    pub fn for_query(backend: BackendKind, query: &str, declared: &[String], context: &ParameterContext) -> Self {
        Self::new(backend, query, context.sorted_bindings(declared))
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.backend, self.query)?;
        for (name, value) in &self.params {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}
