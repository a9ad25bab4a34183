use indexmap::IndexMap;
use tracing::debug;

use crate::{
    binder::{BindError, BoundPipeline, BoundQuery, BoundStatement, ParameterContext, SqlScanner},
    catalog::{PipelineNode, QueryDefinition, QueryTemplate},
    value::DataValue,
};

/// Turns a catalog definition plus operator parameters into a backend-ready
/// artifact.
///
/// Relational statements are never rewritten: values travel next to the text
/// as bind variables. Document pipelines are bound by walking the template
/// tree and replacing placeholder nodes with typed literals.
pub struct QueryBinder;

impl QueryBinder {
    pub fn bind(definition: &QueryDefinition, context: &ParameterContext) -> Result<BoundQuery, BindError> {
        let missing = context.missing(&definition.params);
        if !missing.is_empty() {
            return Err(BindError::MissingParameters { query: definition.name.clone(), names: missing });
        }

        let bound = match &definition.template {
            QueryTemplate::Relational { statement } => {
                BoundQuery::Relational(Self::bind_statement(definition, statement, context)?)
            }
            QueryTemplate::Document { collection, pipeline } => {
                let stages = pipeline
                    .iter()
                    .map(|stage| Self::bind_node(definition, stage, context))
                    .collect::<Result<Vec<_>, _>>()?;
                BoundQuery::Document(BoundPipeline { collection: collection.clone(), stages })
            }
        };

        debug!(query = %definition.name, backend = %bound.backend(), "bound query");
        Ok(bound)
    }

    fn bind_statement(
        definition: &QueryDefinition,
        statement: &str,
        context: &ParameterContext,
    ) -> Result<BoundStatement, BindError> {
        if let Some(span) = SqlScanner::scan(statement).into_iter().find(|s| !definition.declares(&s.name)) {
            return Err(BindError::UndeclaredPlaceholder { query: definition.name.clone(), placeholder: span.name });
        }

        let mut binds = IndexMap::with_capacity(definition.params.len());
        for name in &definition.params {
            if let Some(value) = context.get(name) {
                binds.insert(name.clone(), value.clone());
            }
        }

        Ok(BoundStatement { text: statement.to_string(), binds })
    }

    fn bind_node(
        definition: &QueryDefinition,
        node: &PipelineNode,
        context: &ParameterContext,
    ) -> Result<DataValue, BindError> {
        match node {
            PipelineNode::Literal(value) => Ok(value.clone()),
            PipelineNode::Placeholder(name) => {
                let value = context.get(name).filter(|_| definition.declares(name)).ok_or_else(|| {
                    BindError::UndeclaredPlaceholder { query: definition.name.clone(), placeholder: name.clone() }
                })?;
                Ok(value.to_data_value())
            }
            PipelineNode::Array(items) => Ok(DataValue::Array(
                items.iter().map(|n| Self::bind_node(definition, n, context)).collect::<Result<_, _>>()?,
            )),
            PipelineNode::Document(fields) => {
                let mut doc = IndexMap::with_capacity(fields.len());
                for (key, value) in fields {
                    doc.insert(key.clone(), Self::bind_node(definition, value, context)?);
                }
                Ok(DataValue::Document(doc))
            }
        }
    }
}
