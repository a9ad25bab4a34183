use std::collections::BTreeMap;

use crate::value::ParamValue;

/// Named runtime values collected from the operator for one interaction.
///
/// Kept sorted by name so the subset a query uses is already in cache-key
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterContext {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.values.insert(name.to_string(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Every name of `declared` absent from this context, in declared order.
    pub fn missing(&self, declared: &[String]) -> Vec<String> {
        declared.iter().filter(|name| !self.contains(name)).cloned().collect()
    }

    /// The bindings for `declared`, sorted by name. Names absent from the
    /// context are skipped.
    pub fn sorted_bindings(&self, declared: &[String]) -> Vec<(String, ParamValue)> {
        self.values
            .iter()
            .filter(|(name, _)| declared.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for ParameterContext {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}
