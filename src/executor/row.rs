use indexmap::IndexMap;
use serde::Serialize;

use crate::value::DataValue;

/// One result row, keyed by column name in projection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub IndexMap<String, DataValue>);

impl Row {
    pub fn get(&self, key: &str) -> Option<&DataValue> { self.0.get(key) }
    pub fn get_or_null(&self, key: &str) -> &DataValue { self.0.get(key).unwrap_or(&DataValue::Null) }
    pub fn into_value(self) -> DataValue { DataValue::Document(self.0) }
}

impl<K: Into<String>> FromIterator<(K, DataValue)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, DataValue)>>(iter: T) -> Self {
        Row(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
