use serde::Serialize;

use crate::{executor::Row, value::DataValue};

/// Chart-ready data handed to whatever draws the panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartOutput {
    NoData,
    Table { columns: Vec<String>, rows: Vec<Row> },
    Line(Series),
    Bar(Series),
    Pie { names_field: String, values_field: String, names: Vec<DataValue>, values: Vec<DataValue> },
    Heatmap(HeatmapGrid),
    Treemap { nodes: Vec<TreemapNode> },
}

impl ChartOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            ChartOutput::NoData => "no_data",
            ChartOutput::Table { .. } => "table",
            ChartOutput::Line(_) => "line",
            ChartOutput::Bar(_) => "bar",
            ChartOutput::Pie { .. } => "pie",
            ChartOutput::Heatmap(_) => "heatmap",
            ChartOutput::Treemap { .. } => "treemap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub x_field: String,
    pub y_field: String,
    pub x: Vec<DataValue>,
    pub y: Vec<DataValue>,
}

/// Pivot of `values` over `rows` x `cols`. `cells[r][c]` is the mean of the
/// matching values, `None` when no row hit that pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapGrid {
    pub rows_field: String,
    pub cols_field: String,
    pub values_field: String,
    pub row_labels: Vec<DataValue>,
    pub col_labels: Vec<DataValue>,
    pub cells: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreemapNode {
    pub id: String,
    pub parent: Option<String>,
    pub label: String,
    pub value: f64,
}
