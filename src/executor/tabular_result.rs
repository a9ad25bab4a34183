use serde::Serialize;

use crate::{executor::Row, value::DataValue};

/// Ordered columns plus rows, the shape every backend is normalized into.
///
/// Every row carries every column; cells a backend did not produce are
/// [`DataValue::Null`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Builds a result from positional cells. Short rows are padded with nulls.
    pub fn from_cells(columns: Vec<String>, cells: Vec<Vec<DataValue>>) -> Self {
        let rows = cells
            .into_iter()
            .map(|mut values| {
                values.resize(columns.len(), DataValue::Null);
                Row(columns.iter().cloned().zip(values).collect())
            })
            .collect();
        Self { columns, rows }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Values of one column in row order, `None` when the column is absent.
    pub fn column_values(&self, name: &str) -> Option<Vec<&DataValue>> {
        if !self.has_column(name) {
            return None;
        }
        Some(self.rows.iter().map(|r| r.get_or_null(name)).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
