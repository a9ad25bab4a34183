use indexmap::IndexMap;

use crate::{
    catalog::ChartSpec,
    executor::TabularResult,
    render::{coerce_temporal_columns, ChartOutput, HeatmapGrid, RenderError, Series, TreemapNode},
    value::DataValue,
};

/// Shapes a tabular result into chart-ready data according to a
/// [`ChartSpec`]. Stateless.
pub struct ChartRenderer;

impl ChartRenderer {
    pub fn render(result: &TabularResult, spec: &ChartSpec) -> Result<ChartOutput, RenderError> {
        if result.is_empty() {
            return Ok(ChartOutput::NoData);
        }
        for (role, column) in spec.field_roles() {
            if !result.has_column(column) {
                return Err(RenderError::MissingColumn { role: role.to_string(), column: column.to_string() });
            }
        }

        let mut result = result.clone();
        coerce_temporal_columns(&mut result);

        let output = match spec {
            ChartSpec::Table | ChartSpec::Other => Self::table(&result),
            ChartSpec::Line { x, y } => ChartOutput::Line(Self::series(&result, x, y)),
            ChartSpec::Bar { x, y } => ChartOutput::Bar(Self::series(&result, x, y)),
            ChartSpec::Pie { names, values } => ChartOutput::Pie {
                names_field: names.clone(),
                values_field: values.clone(),
                names: Self::column(&result, names),
                values: Self::column(&result, values),
            },
            ChartSpec::Heatmap { rows, cols, values } => ChartOutput::Heatmap(Self::heatmap(&result, rows, cols, values)?),
            ChartSpec::Treemap { path, values } => ChartOutput::Treemap { nodes: Self::treemap(&result, path, values)? },
        };
        Ok(output)
    }

    /// Plain table rendering, also the fallback when a chart cannot be drawn.
    pub fn table(result: &TabularResult) -> ChartOutput {
        if result.is_empty() {
            return ChartOutput::NoData;
        }
        ChartOutput::Table { columns: result.columns.clone(), rows: result.rows.clone() }
    }

    fn column(result: &TabularResult, name: &str) -> Vec<DataValue> {
        result.rows.iter().map(|r| r.get_or_null(name).clone()).collect()
    }

    fn series(result: &TabularResult, x: &str, y: &str) -> Series {
        Series {
            x_field: x.to_string(),
            y_field: y.to_string(),
            x: Self::column(result, x),
            y: Self::column(result, y),
        }
    }

    fn numeric(column: &str, value: &DataValue) -> Result<Option<f64>, RenderError> {
        match value {
            DataValue::Null => Ok(None),
            other => other
                .as_f64()
                .map(Some)
                .ok_or_else(|| RenderError::NonNumeric { column: column.to_string(), found: other.type_name().to_string() }),
        }
    }

    fn heatmap(result: &TabularResult, rows: &str, cols: &str, values: &str) -> Result<HeatmapGrid, RenderError> {
        let mut row_keys: IndexMap<String, DataValue> = IndexMap::new();
        let mut col_keys: IndexMap<String, DataValue> = IndexMap::new();
        let mut sums: IndexMap<(usize, usize), (f64, usize)> = IndexMap::new();

        for row in &result.rows {
            let r = row.get_or_null(rows);
            let c = row.get_or_null(cols);
            let (ri, _) = row_keys.insert_full(r.canonical_key(), r.clone());
            let (ci, _) = col_keys.insert_full(c.canonical_key(), c.clone());
            if let Some(v) = Self::numeric(values, row.get_or_null(values))? {
                let cell = sums.entry((ri, ci)).or_insert((0.0, 0));
                cell.0 += v;
                cell.1 += 1;
            }
        }

        let cells = (0..row_keys.len())
            .map(|ri| {
                (0..col_keys.len())
                    .map(|ci| sums.get(&(ri, ci)).map(|(sum, n)| sum / *n as f64))
                    .collect()
            })
            .collect();

        Ok(HeatmapGrid {
            rows_field: rows.to_string(),
            cols_field: cols.to_string(),
            values_field: values.to_string(),
            row_labels: row_keys.into_values().collect(),
            col_labels: col_keys.into_values().collect(),
            cells,
        })
    }

    /// One node per distinct path prefix. Leaves sum the rows that reach them
    /// and every parent sums its children.
    fn treemap(result: &TabularResult, path: &[String], values: &str) -> Result<Vec<TreemapNode>, RenderError> {
        let mut nodes: IndexMap<String, TreemapNode> = IndexMap::new();

        for row in &result.rows {
            let amount = Self::numeric(values, row.get_or_null(values))?.unwrap_or(0.0);
            let mut parent: Option<String> = None;
            for level in path {
                let label = row.get_or_null(level).to_string();
                let id = match &parent {
                    Some(p) => format!("{p}/{label}"),
                    None => label.clone(),
                };
                let node = nodes.entry(id.clone()).or_insert_with(|| TreemapNode {
                    id: id.clone(),
                    parent: parent.clone(),
                    label,
                    value: 0.0,
                });
                node.value += amount;
                parent = Some(id);
            }
        }

        Ok(nodes.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Row;
    use serde_json::json;

    fn result(rows: serde_json::Value) -> TabularResult {
        let docs = rows.as_array().unwrap().iter().map(DataValue::from).collect();
        crate::executor::flatten_documents(docs)
    }

    fn every_kind() -> Vec<ChartSpec> {
        vec![
            ChartSpec::Table,
            ChartSpec::Line { x: "x".into(), y: "y".into() },
            ChartSpec::Bar { x: "x".into(), y: "y".into() },
            ChartSpec::Pie { names: "n".into(), values: "v".into() },
            ChartSpec::Heatmap { rows: "r".into(), cols: "c".into(), values: "v".into() },
            ChartSpec::Treemap { path: vec!["a".into()], values: "v".into() },
            ChartSpec::Other,
        ]
    }

    #[test]
    fn empty_results_render_no_data_for_every_kind() {
        let empty = TabularResult::empty(vec![]);
        for spec in every_kind() {
            assert_eq!(ChartRenderer::render(&empty, &spec).unwrap(), ChartOutput::NoData, "{}", spec.kind());
        }
    }

    #[test]
    fn battery_pie_scenario() {
        let data = TabularResult::new(
            vec!["battery_range".into(), "device_count".into()],
            vec![Row::from_iter([
                ("battery_range", DataValue::Text("80-100%".into())),
                ("device_count", DataValue::Int(3)),
            ])],
        );
        let spec = ChartSpec::Pie { names: "battery_range".into(), values: "device_count".into() };
        assert_eq!(
            ChartRenderer::render(&data, &spec).unwrap(),
            ChartOutput::Pie {
                names_field: "battery_range".into(),
                values_field: "device_count".into(),
                names: vec![DataValue::Text("80-100%".into())],
                values: vec![DataValue::Int(3)],
            }
        );
    }

    #[test]
    fn missing_column_names_the_role() {
        let data = result(json!([{"patient_name": "Li", "n": 1}]));
        let spec = ChartSpec::Bar { x: "patient_name".into(), y: "alert_count".into() };
        assert_eq!(
            ChartRenderer::render(&data, &spec).unwrap_err(),
            RenderError::MissingColumn { role: "y".into(), column: "alert_count".into() }
        );
    }

    #[test]
    fn line_axis_gets_parsed_timestamps() {
        let data = result(json!([
            {"time": "2025-05-01 08:00:00", "heart_rate": 70},
            {"time": "2025-05-01 09:00:00", "heart_rate": 75}
        ]));
        let ChartOutput::Line(series) = ChartRenderer::render(&data, &ChartSpec::Line { x: "time".into(), y: "heart_rate".into() }).unwrap() else {
            panic!("expected a line chart");
        };
        assert!(series.x.iter().all(|v| matches!(v, DataValue::Timestamp(_))));
        assert_eq!(series.y, vec![DataValue::Int(70), DataValue::Int(75)]);
    }

    #[test]
    fn heatmap_averages_duplicates() {
        let data = result(json!([
            {"day": "Mon", "hour": 8, "hr": 70},
            {"day": "Mon", "hour": 8, "hr": 80},
            {"day": "Tue", "hour": 9, "hr": 60}
        ]));
        let spec = ChartSpec::Heatmap { rows: "day".into(), cols: "hour".into(), values: "hr".into() };
        let ChartOutput::Heatmap(grid) = ChartRenderer::render(&data, &spec).unwrap() else {
            panic!("expected a heatmap");
        };
        assert_eq!(grid.row_labels, vec![DataValue::Text("Mon".into()), DataValue::Text("Tue".into())]);
        assert_eq!(grid.col_labels, vec![DataValue::Int(8), DataValue::Int(9)]);
        assert_eq!(grid.cells, vec![vec![Some(75.0), None], vec![None, Some(60.0)]]);
    }

    #[test]
    fn heatmap_rejects_text_values() {
        let data = result(json!([{"day": "Mon", "hour": 8, "hr": "high"}]));
        let spec = ChartSpec::Heatmap { rows: "day".into(), cols: "hour".into(), values: "hr".into() };
        assert_eq!(
            ChartRenderer::render(&data, &spec).unwrap_err(),
            RenderError::NonNumeric { column: "hr".into(), found: "text".into() }
        );
    }

    #[test]
    fn treemap_parents_sum_their_leaves() {
        let data = result(json!([
            {"ward": "A", "room": "1", "n": 2},
            {"ward": "A", "room": "2", "n": 3},
            {"ward": "B", "room": "1", "n": 4}
        ]));
        let spec = ChartSpec::Treemap { path: vec!["ward".into(), "room".into()], values: "n".into() };
        let ChartOutput::Treemap { nodes } = ChartRenderer::render(&data, &spec).unwrap() else {
            panic!("expected a treemap");
        };
        let by_id = |id: &str| nodes.iter().find(|n| n.id == id).unwrap().clone();
        assert_eq!(by_id("A").value, 5.0);
        assert_eq!(by_id("A/2").parent.as_deref(), Some("A"));
        assert_eq!(by_id("B/1").value, 4.0);
        assert_eq!(nodes.len(), 5);
    }

    #[test]
    fn unknown_kind_renders_table() {
        let data = result(json!([{"a": 1}]));
        assert!(matches!(ChartRenderer::render(&data, &ChartSpec::Other).unwrap(), ChartOutput::Table { .. }));
    }
}
