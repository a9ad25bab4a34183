use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::value::DataValue;

/// A leaf string is a placeholder only when it is exactly `:identifier`.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([A-Za-z_][A-Za-z0-9_]*)$").expect("placeholder pattern"));

/// One node of a document pipeline template.
///
/// Placeholders are recognized once, when the template is decoded, by exact
/// match on a whole string leaf. A `:name` sequence inside a longer literal
/// stays literal text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum PipelineNode {
    Literal(DataValue),
    Placeholder(String),
    Array(Vec<PipelineNode>),
    Document(IndexMap<String, PipelineNode>),
}

impl PipelineNode {
    /// Distinct placeholder names in first-seen, depth-first order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_placeholders(&mut names);
        names
    }

    fn collect_placeholders(&self, names: &mut Vec<String>) {
        match self {
            PipelineNode::Literal(_) => {}
            PipelineNode::Placeholder(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            PipelineNode::Array(items) => items.iter().for_each(|n| n.collect_placeholders(names)),
            PipelineNode::Document(fields) => fields.values().for_each(|n| n.collect_placeholders(names)),
        }
    }

    /// JSON rendering of the template, placeholders shown as `:name`.
    pub fn to_json(&self) -> Value {
        match self {
            PipelineNode::Literal(v) => v.to_json(),
            PipelineNode::Placeholder(name) => Value::String(format!(":{name}")),
            PipelineNode::Array(items) => Value::Array(items.iter().map(PipelineNode::to_json).collect()),
            PipelineNode::Document(fields) => Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<Value> for PipelineNode {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => match PLACEHOLDER.captures(&s) {
                Some(caps) => PipelineNode::Placeholder(caps[1].to_string()),
                None => PipelineNode::Literal(DataValue::Text(s)),
            },
            Value::Array(items) => PipelineNode::Array(items.into_iter().map(PipelineNode::from).collect()),
            Value::Object(map) => PipelineNode::Document(
                map.into_iter().map(|(k, v)| (k, PipelineNode::from(v))).collect(),
            ),
            scalar => PipelineNode::Literal(DataValue::from(scalar)),
        }
    }
}

/// Decode a list of JSON stages into template nodes.
pub fn pipeline_from_json(stages: Vec<Value>) -> Vec<PipelineNode> {
    stages.into_iter().map(PipelineNode::from).collect()
}
