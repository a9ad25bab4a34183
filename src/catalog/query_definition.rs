use crate::{binder::SqlScanner, catalog::{BackendKind, ChartSpec, PipelineNode}, catalog::role_filter};

/// The backend-specific body of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTemplate {
    /// Statement text with named `:param` placeholders.
    Relational { statement: String },
    /// Aggregation pipeline run against `collection`.
    Document { collection: String, pipeline: Vec<PipelineNode> },
}

/// A named, role-tagged entry of the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDefinition {
    /// Unique, human-readable name.
    pub name: String,
    pub template: QueryTemplate,
    pub chart: ChartSpec,
    /// Role tags. Empty means visible to every role.
    pub roles: Vec<String>,
    /// Declared parameter names, in the order the operator is asked for them.
    pub params: Vec<String>,
}

impl QueryDefinition {
    pub fn relational(name: &str, statement: &str) -> Self {
        Self::with_template(name, QueryTemplate::Relational { statement: statement.to_string() })
    }

    pub fn document(name: &str, collection: &str, pipeline: Vec<PipelineNode>) -> Self {
        Self::with_template(name, QueryTemplate::Document { collection: collection.to_string(), pipeline })
    }

    fn with_template(name: &str, template: QueryTemplate) -> Self {
        Self {
            name: name.to_string(),
            template,
            chart: ChartSpec::Table,
            roles: vec![],
            params: vec![],
        }
    }

    pub fn with_chart(mut self, chart: ChartSpec) -> Self {
        self.chart = chart;
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn backend(&self) -> BackendKind {
        match self.template {
            QueryTemplate::Relational { .. } => BackendKind::Relational,
            QueryTemplate::Document { .. } => BackendKind::Document,
        }
    }

    /// Placeholder names the template actually references, first-seen order.
    pub fn referenced_placeholders(&self) -> Vec<String> {
        match &self.template {
            QueryTemplate::Relational { statement } => {
                let mut names: Vec<String> = Vec::new();
                for span in SqlScanner::scan(statement) {
                    if !names.contains(&span.name) {
                        names.push(span.name);
                    }
                }
                names
            }
            QueryTemplate::Document { pipeline, .. } => {
                let mut names: Vec<String> = Vec::new();
                for name in pipeline.iter().flat_map(PipelineNode::placeholders) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                names
            }
        }
    }

    /// Referenced placeholders that are missing from `params`.
    pub fn undeclared_placeholders(&self) -> Vec<String> {
        self.referenced_placeholders()
            .into_iter()
            .filter(|name| !self.declares(name))
            .collect()
    }

    pub fn declares(&self, param: &str) -> bool {
        self.params.iter().any(|p| p == param)
    }

    pub fn is_visible_to(&self, role: &str) -> bool {
        role_filter::is_visible(self, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::pipeline_from_json;
    use serde_json::json;

    #[test]
    fn relational_placeholders_skip_casts_and_literals() {
        let def = QueryDefinition::relational(
            "steps",
            "SELECT AVG(stepcount)::numeric(10,1) AS avg_steps, ':not_a_param' AS note \
             FROM s.healthrecord WHERE patientid = :patient_id AND day::date = CURRENT_DATE",
        )
        .with_params(["patient_id"]);
        assert_eq!(def.referenced_placeholders(), vec!["patient_id".to_string()]);
        assert!(def.undeclared_placeholders().is_empty());
    }

    #[test]
    fn reports_undeclared_document_placeholders() {
        let def = QueryDefinition::document(
            "trend",
            "sensor_readings",
            pipeline_from_json(vec![json!({"$match": {"patient_id": ":patient_id", "ts": {"$gte": ":since"}}})]),
        )
        .with_params(["patient_id"]);
        assert_eq!(def.backend(), BackendKind::Document);
        assert_eq!(def.undeclared_placeholders(), vec!["since".to_string()]);
    }
}
