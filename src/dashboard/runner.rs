use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    binder::{BoundQuery, ParameterContext, QueryBinder},
    cache::{CacheKey, ResultCache, DEFAULT_TTL},
    catalog::{BackendKind, QueryCatalog, QueryDefinition},
    config::DashboardConfig,
    dashboard::{OperatorControls, PanelError, PanelOutput, PanelReport, PanelSelection},
    executor::{
        DocumentExecutor, DocumentOverview, ExecutionError, MongoDocumentClient, PgRelationalClient, QueryExecutor,
        RelationalExecutor,
    },
    memory::MemoryDocumentStore,
    render::ChartRenderer,
};

/// Drives one dashboard: role filtering, binding, cached execution and
/// chart shaping for the relational and document panels.
pub struct Dashboard {
    catalog: Arc<QueryCatalog>,
    relational: Option<Arc<dyn QueryExecutor>>,
    document: Option<Arc<dyn QueryExecutor>>,
    overview: Option<Arc<DocumentExecutor>>,
    cache: Arc<ResultCache>,
    ttl: Duration,
}

impl Dashboard {
    pub fn new(catalog: Arc<QueryCatalog>, cache: Arc<ResultCache>, ttl: Duration) -> Self {
        Self { catalog, relational: None, document: None, overview: None, cache, ttl }
    }

    /// Dashboard with no backends and the default cache lifetime.
    pub fn detached(catalog: Arc<QueryCatalog>) -> Self {
        Self::new(catalog, Arc::new(ResultCache::default()), DEFAULT_TTL)
    }

    pub fn with_relational(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.relational = Some(executor);
        self
    }

    pub fn with_document(mut self, executor: Arc<DocumentExecutor>) -> Self {
        let document: Arc<dyn QueryExecutor> = executor.clone();
        self.document = Some(document);
        self.overview = Some(executor);
        self
    }

    /// Wires the backends enabled in `config`. The relational pool and the
    /// document server client connect lazily. A snapshot directory replaces
    /// the document server with the in-memory store.
    pub async fn from_config(catalog: Arc<QueryCatalog>, config: &DashboardConfig) -> Result<Self, ExecutionError> {
        let mut dashboard = Self::new(catalog, Arc::new(ResultCache::default()), config.cache_ttl());

        if config.relational.enabled {
            let client = PgRelationalClient::connect(&config.relational.uri, config.relational.pool_size)?;
            dashboard = dashboard.with_relational(Arc::new(RelationalExecutor::new(Arc::new(client))));
        }

        if config.document.enabled {
            match &config.document.snapshot_dir {
                Some(dir) => {
                    let store = MemoryDocumentStore::new(&config.document.database);
                    let loaded = store
                        .load_snapshot_dir(dir)
                        .await
                        .map_err(|e| ExecutionError::connection(BackendKind::Document, e))?;
                    info!(database = %config.document.database, collections = loaded, "document store ready");
                    let executor = DocumentExecutor::new(store.into_shared(), config.document.aggregate_options());
                    dashboard = dashboard.with_document(Arc::new(executor));
                }
                None => {
                    let client = MongoDocumentClient::connect(&config.document.uri, &config.document.database).await?;
                    let executor = DocumentExecutor::new(Arc::new(client), config.document.aggregate_options());
                    dashboard = dashboard.with_document(Arc::new(executor));
                }
            }
        }

        Ok(dashboard)
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Queries the role may pick, optionally narrowed to one backend.
    pub fn visible_queries(&self, role: &str, backend: Option<BackendKind>) -> Vec<&QueryDefinition> {
        self.catalog
            .visible_to(role)
            .into_iter()
            .filter(|def| backend.is_none_or(|b| def.backend() == b))
            .collect()
    }

    /// Binds without executing, for previewing what would be sent.
    pub fn bind(&self, name: &str, context: &ParameterContext) -> Result<BoundQuery, PanelError> {
        let definition = self.catalog.get(name).ok_or_else(|| PanelError::UnknownQuery(name.to_string()))?;
        Ok(QueryBinder::bind(definition, context)?)
    }

    /// Runs one query for `role` and shapes its chart.
    pub async fn run(&self, role: &str, name: &str, context: &ParameterContext) -> Result<PanelOutput, PanelError> {
        let outcome = self.run_inner(role, name, context).await;
        if let Err(error) = &outcome {
            warn!(query = name, role, kind = %error.kind(), %error, "panel failed");
        }
        outcome
    }

    async fn run_inner(&self, role: &str, name: &str, context: &ParameterContext) -> Result<PanelOutput, PanelError> {
        let definition = self.catalog.get(name).ok_or_else(|| PanelError::UnknownQuery(name.to_string()))?;
        if !definition.is_visible_to(role) {
            return Err(PanelError::NotVisible { query: name.to_string(), role: role.to_string() });
        }

        let backend = definition.backend();
        let bound = QueryBinder::bind(definition, context)?;
        let executor = self.executor(backend).ok_or(PanelError::BackendUnavailable(backend))?;

        let key = CacheKey::for_query(backend, &definition.name, &definition.params, context);
        let result = self.cache.get_or_compute(&key, self.ttl, || async { executor.execute(&bound).await }).await?;

        let (chart, render_error) = match ChartRenderer::render(&result, &definition.chart) {
            Ok(chart) => (chart, None),
            Err(error) => {
                warn!(query = name, %error, "chart fell back to table");
                (ChartRenderer::table(&result), Some(error))
            }
        };

        Ok(PanelOutput { query: definition.name.clone(), backend, result, chart, render_error })
    }

    /// Runs the selected relational and document queries side by side.
    pub async fn run_panels(&self, role: &str, selection: &PanelSelection, context: &ParameterContext) -> PanelReport {
        let run_side = |backend: BackendKind| {
            let name = selection.get(backend).map(str::to_string);
            let context = context.clone();
            async move {
                match name {
                    Some(name) => Some(self.run(role, &name, &context).await),
                    None => None,
                }
            }
        };
        let (relational, document) = tokio::join!(run_side(BackendKind::Relational), run_side(BackendKind::Document));
        PanelReport { relational, document }
    }

    /// Reacts to the operator changing a selection. Nothing runs unless the
    /// controls ask for automatic execution.
    pub async fn on_selection_change(
        &self,
        controls: &OperatorControls,
        selection: &PanelSelection,
        now: DateTime<Utc>,
    ) -> Result<Option<PanelReport>, PanelError> {
        if !controls.auto_run {
            return Ok(None);
        }
        let context = controls.to_context(now)?;
        Ok(Some(self.run_panels(&controls.role, selection, &context).await))
    }

    pub async fn document_overview(&self) -> Result<DocumentOverview, PanelError> {
        let executor = self.overview.as_ref().ok_or(PanelError::BackendUnavailable(BackendKind::Document))?;
        Ok(executor.overview().await?)
    }

    fn executor(&self, backend: BackendKind) -> Option<&Arc<dyn QueryExecutor>> {
        match backend {
            BackendKind::Relational => self.relational.as_ref(),
            BackendKind::Document => self.document.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binder::BoundStatement,
        catalog::SchemaQualifier,
        dashboard::PanelErrorKind,
        executor::{AggregateOptions, RawRows, RelationalClient},
        render::{ChartOutput, RenderError},
        value::{DataValue, ParamValue},
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    const PATIENT_BATTERY: &str = "患者: 我的设备电池状态";
    const ADMIN_BATTERY: &str = "管理员: 设备电池状态分布";
    const LOW_BATTERY: &str = "设备: 低电量设备警报";

    struct FakeClient {
        answer: Result<RawRows, ExecutionError>,
        calls: AtomicUsize,
        seen: Mutex<Vec<BoundStatement>>,
    }

    impl FakeClient {
        fn battery() -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(RawRows {
                    columns: vec!["battery_range".into(), "device_count".into()],
                    rows: vec![vec![DataValue::Text("80-100%".into()), DataValue::Int(3)]],
                }),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(vec![]),
            })
        }

        fn renamed_count() -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(RawRows {
                    columns: vec!["battery_range".into(), "devices".into()],
                    rows: vec![vec![DataValue::Text("0-20%".into()), DataValue::Int(2)]],
                }),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(vec![]),
            })
        }

        fn down() -> Arc<Self> {
            Arc::new(Self {
                answer: Err(ExecutionError::connection(BackendKind::Relational, "connection refused")),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl RelationalClient for FakeClient {
        async fn fetch(&self, statement: &BoundStatement) -> Result<RawRows, ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(statement.clone());
            self.answer.clone()
        }
    }

    fn catalog() -> Arc<QueryCatalog> {
        Arc::new(QueryCatalog::builtin(SchemaQualifier::default()).unwrap())
    }

    fn dashboard(client: Arc<FakeClient>) -> Dashboard {
        Dashboard::detached(catalog()).with_relational(Arc::new(RelationalExecutor::new(client)))
    }

    fn document_executor() -> Arc<DocumentExecutor> {
        let store = MemoryDocumentStore::new("eldercare");
        store
            .load_from_json(
                "device_status",
                json!([
                    {"sensor_id": "s1", "battery_level": 85, "is_active": true, "timestamp": {"$date": "2025-05-01T08:00:00Z"}},
                    {"sensor_id": "s2", "battery_level": 12, "is_active": true, "timestamp": {"$date": "2025-05-01T08:00:00Z"}}
                ]),
            )
            .unwrap();
        Arc::new(DocumentExecutor::new(store.into_shared(), AggregateOptions::default()))
    }

    #[tokio::test]
    async fn patient_battery_renders_a_pie() {
        let client = FakeClient::battery();
        let board = dashboard(client.clone());
        let ctx = ParameterContext::new().with("patient_id", 1);

        let panel = board.run("patient", PATIENT_BATTERY, &ctx).await.unwrap();
        assert_eq!(panel.backend, BackendKind::Relational);
        assert_eq!(panel.render_error, None);
        assert_eq!(panel.error_kind(), None);
        match &panel.chart {
            ChartOutput::Pie { names_field, values_field, names, values } => {
                assert_eq!(names_field, "battery_range");
                assert_eq!(values_field, "device_count");
                assert_eq!(names, &vec![DataValue::Text("80-100%".into())]);
                assert_eq!(values, &vec![DataValue::Int(3)]);
            }
            other => panic!("expected a pie, got {other:?}"),
        }

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].binds.len(), 1);
        assert_eq!(seen[0].binds.get("patient_id"), Some(&ParamValue::Int(1)));
    }

    #[tokio::test]
    async fn missing_chart_column_falls_back_to_a_table() {
        let board = dashboard(FakeClient::renamed_count());

        let panel = board.run("admin", ADMIN_BATTERY, &ParameterContext::new()).await.unwrap();
        assert_eq!(panel.result.len(), 1);
        match &panel.chart {
            ChartOutput::Table { columns, rows } => {
                assert_eq!(columns, &vec!["battery_range".to_string(), "devices".to_string()]);
                assert_eq!(rows.len(), 1);
            }
            other => panic!("expected a table, got {other:?}"),
        }
        assert!(matches!(
            &panel.render_error,
            Some(RenderError::MissingColumn { column, .. }) if column == "device_count"
        ));
        assert_eq!(panel.error_kind(), Some(PanelErrorKind::Render));
    }

    #[tokio::test]
    async fn document_server_is_wired_without_a_snapshot_dir() {
        let mut config = DashboardConfig::new();
        config.relational.enabled = false;
        config.document.snapshot_dir = None;

        let board = Dashboard::from_config(catalog(), &config).await.unwrap();
        assert!(board.relational.is_none());
        assert!(board.document.is_some());
        assert!(board.overview.is_some());
    }

    #[tokio::test]
    async fn admin_query_needs_no_parameters() {
        let client = FakeClient::battery();
        let board = dashboard(client.clone());

        let panel = board.run("admin", ADMIN_BATTERY, &ParameterContext::new()).await.unwrap();
        assert!(matches!(panel.chart, ChartOutput::Pie { .. }));
        assert!(client.seen.lock().unwrap()[0].binds.is_empty());
    }

    #[tokio::test]
    async fn selection_must_be_visible_to_the_role() {
        let board = dashboard(FakeClient::battery());
        let err = board.run("patient", ADMIN_BATTERY, &ParameterContext::new()).await.unwrap_err();
        assert_eq!(err.kind(), PanelErrorKind::Selection);

        let err = board.run("admin", "no such query", &ParameterContext::new()).await.unwrap_err();
        assert_eq!(err, PanelError::UnknownQuery("no such query".into()));
    }

    #[tokio::test]
    async fn missing_parameters_fail_before_execution() {
        let client = FakeClient::battery();
        let board = dashboard(client.clone());
        let err = board.run("patient", PATIENT_BATTERY, &ParameterContext::new()).await.unwrap_err();
        assert_eq!(err.kind(), PanelErrorKind::MissingParameter);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_runs_hit_the_cache() {
        let client = FakeClient::battery();
        let board = dashboard(client.clone());
        let ctx = ParameterContext::new().with("patient_id", 1);

        let first = board.run("patient", PATIENT_BATTERY, &ctx).await.unwrap();
        let second = board.run("patient", PATIENT_BATTERY, &ctx).await.unwrap();
        assert!(Arc::ptr_eq(&first.result, &second.result));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        board.run("patient", PATIENT_BATTERY, &ctx.clone().with("patient_id", 2)).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_failing_backend_leaves_the_other_panel_intact() {
        let board = dashboard(FakeClient::down()).with_document(document_executor());
        let ctx = ParameterContext::new().with("battery_threshold", 20);
        let selection = PanelSelection::new(Some(ADMIN_BATTERY), Some(LOW_BATTERY));

        let report = board.run_panels("admin", &selection, &ctx).await;
        let relational = report.relational.unwrap().unwrap_err();
        assert_eq!(relational.kind(), PanelErrorKind::Connection);

        let document = report.document.unwrap().unwrap();
        assert_eq!(document.result.len(), 1);
        assert!(matches!(document.chart, ChartOutput::Bar(_)));
    }

    #[tokio::test]
    async fn selection_change_runs_only_with_auto_run() {
        let client = FakeClient::battery();
        let board = dashboard(client.clone());
        let selection = PanelSelection::new(Some(PATIENT_BATTERY), None);
        let mut controls = OperatorControls::new("patient");

        let idle = board.on_selection_change(&controls, &selection, chrono::Utc::now()).await.unwrap();
        assert!(idle.is_none());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        controls.auto_run = true;
        let report = board.on_selection_change(&controls, &selection, chrono::Utc::now()).await.unwrap().unwrap();
        assert!(report.relational.unwrap().is_ok());
        assert!(report.document.is_none());
    }

    #[tokio::test]
    async fn unconfigured_backend_is_a_connection_error() {
        let board = Dashboard::detached(catalog());
        let err = board.run("admin", ADMIN_BATTERY, &ParameterContext::new()).await.unwrap_err();
        assert_eq!(err, PanelError::BackendUnavailable(BackendKind::Relational));
        assert_eq!(err.kind(), PanelErrorKind::Connection);
        assert!(board.document_overview().await.is_err());
    }

    #[tokio::test]
    async fn visible_queries_narrow_by_backend() {
        let board = Dashboard::detached(catalog());
        let admin_docs = board.visible_queries("admin", Some(BackendKind::Document));
        assert!(!admin_docs.is_empty());
        assert!(admin_docs.iter().all(|q| q.backend() == BackendKind::Document));
        assert!(board.visible_queries("nobody", None).is_empty());
    }

    #[tokio::test]
    async fn bind_previews_the_statement() {
        let board = Dashboard::detached(catalog());
        let bound = board.bind(PATIENT_BATTERY, &ParameterContext::new().with("patient_id", 7)).unwrap();
        match bound {
            BoundQuery::Relational(statement) => {
                assert!(statement.text.contains(":patient_id"));
                assert_eq!(statement.binds.get("patient_id"), Some(&ParamValue::Int(7)));
            }
            other => panic!("expected a statement, got {other:?}"),
        }
    }
}
