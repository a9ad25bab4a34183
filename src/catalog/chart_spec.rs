use serde::{Deserialize, Serialize};

/// Declarative mapping from result columns to a visualization.
///
/// Each variant carries exactly the field roles its kind needs, so a `pie`
/// without `names` is rejected when the catalog is decoded. A `type` that is
/// not known decodes to [`ChartSpec::Other`] and renders as a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChartSpec {
    #[default]
    Table,
    Line { x: String, y: String },
    Bar { x: String, y: String },
    Pie { names: String, values: String },
    Heatmap { rows: String, cols: String, values: String },
    Treemap { path: Vec<String>, values: String },
    #[serde(other)]
    Other,
}

impl ChartSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ChartSpec::Table | ChartSpec::Other => "table",
            ChartSpec::Line { .. } => "line",
            ChartSpec::Bar { .. } => "bar",
            ChartSpec::Pie { .. } => "pie",
            ChartSpec::Heatmap { .. } => "heatmap",
            ChartSpec::Treemap { .. } => "treemap",
        }
    }

    /// `(role, column)` pairs this spec reads from a result.
    pub fn field_roles(&self) -> Vec<(&'static str, &str)> {
        match self {
            ChartSpec::Table | ChartSpec::Other => vec![],
            ChartSpec::Line { x, y } | ChartSpec::Bar { x, y } => vec![("x", x.as_str()), ("y", y.as_str())],
            ChartSpec::Pie { names, values } => vec![("names", names.as_str()), ("values", values.as_str())],
            ChartSpec::Heatmap { rows, cols, values } => vec![
                ("rows", rows.as_str()),
                ("cols", cols.as_str()),
                ("values", values.as_str()),
            ],
            ChartSpec::Treemap { path, values } => {
                let mut roles: Vec<(&'static str, &str)> = path.iter().map(|p| ("path", p.as_str())).collect();
                roles.push(("values", values.as_str()));
                roles
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_known_kinds() {
        let pie: ChartSpec = serde_json::from_value(json!({"type": "pie", "names": "battery_range", "values": "device_count"})).unwrap();
        assert_eq!(pie, ChartSpec::Pie { names: "battery_range".into(), values: "device_count".into() });

        let tree: ChartSpec = serde_json::from_value(json!({"type": "treemap", "path": ["ward", "room"], "values": "n"})).unwrap();
        assert_eq!(tree.field_roles(), vec![("path", "ward"), ("path", "room"), ("values", "n")]);
    }

    #[test]
    fn unknown_kind_falls_back_to_table() {
        let spec: ChartSpec = serde_json::from_value(json!({"type": "sankey"})).unwrap();
        assert_eq!(spec, ChartSpec::Other);
        assert_eq!(spec.kind(), "table");
    }

    #[test]
    fn kind_requires_its_field_roles() {
        let result = serde_json::from_value::<ChartSpec>(json!({"type": "bar", "x": "patient_name"}));
        assert!(result.is_err());
    }
}
