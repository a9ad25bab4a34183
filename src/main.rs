//! `vitalboard`: operator command line for the health-monitoring dashboard.
//!
//! - `queries`: list the queries a role may run.
//! - `show`: print a query's qualified template.
//! - `bind`: print the backend-ready artifact for a set of controls.
//! - `run`: execute one query and print its chart-ready output.
//! - `panels`: run a relational and a document query side by side.
//! - `overview`: summary figures of the document backend.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vitalboard::{
    catalog::{is_known_role, BackendKind, CatalogSource, QueryCatalog, QueryDefinition, QueryTemplate},
    config::DashboardConfig,
    dashboard::{Dashboard, OperatorControls, PanelError, PanelOutput, PanelSelection},
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "vitalboard")]
#[command(about = "Role-aware health-monitoring dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON query catalog replacing the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the queries visible to a role
    Queries {
        #[arg(long, default_value = "all")]
        role: String,
        /// Only list queries for this backend (relational or document)
        #[arg(long)]
        backend: Option<BackendKind>,
    },
    /// Print a query's qualified template
    Show { name: String },
    /// Bind a query and print the statement or pipeline that would be sent
    Bind {
        name: String,
        #[command(flatten)]
        controls: ControlArgs,
    },
    /// Execute a query and print chart-ready output
    Run {
        name: String,
        #[command(flatten)]
        controls: ControlArgs,
    },
    /// Execute one relational and one document query concurrently
    Panels {
        #[arg(long)]
        relational: Option<String>,
        #[arg(long)]
        document: Option<String>,
        #[command(flatten)]
        controls: ControlArgs,
    },
    /// Show document backend figures
    Overview,
}

impl Commands {
    fn role(&self) -> Option<&str> {
        match self {
            Commands::Queries { role, .. } => Some(role),
            Commands::Bind { controls, .. } | Commands::Run { controls, .. } | Commands::Panels { controls, .. } => {
                Some(&controls.role)
            }
            Commands::Show { .. } | Commands::Overview => None,
        }
    }
}

#[derive(Args)]
struct ControlArgs {
    #[arg(long, default_value = "all")]
    role: String,
    #[arg(long, default_value_t = 1)]
    patient_id: i64,
    #[arg(long, default_value_t = 1)]
    caregiver_id: i64,
    #[arg(long, default_value_t = 1)]
    staff_id: i64,
    #[arg(long, default_value_t = 1)]
    device_id: i64,
    #[arg(long, default_value_t = 5)]
    alert_threshold: i64,
    /// Look-back window in days (1-90)
    #[arg(long, default_value_t = 7)]
    days: i64,
    /// Low battery percentage (0-100)
    #[arg(long, default_value_t = 20)]
    battery_threshold: i64,
}

impl From<ControlArgs> for OperatorControls {
    fn from(args: ControlArgs) -> Self {
        OperatorControls {
            role: args.role,
            patient_id: args.patient_id,
            caregiver_id: args.caregiver_id,
            staff_id: args.staff_id,
            device_id: args.device_id,
            alert_threshold: args.alert_threshold,
            days: args.days,
            battery_threshold: args.battery_threshold,
            auto_run: false,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = tokio::select! {
        outcome = execute(cli) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load_from_file(path)?,
        None => DashboardConfig::new(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    let source = match &cli.catalog {
        Some(path) => CatalogSource::from_file(path)?,
        None => CatalogSource::builtin()?,
    };
    let catalog = Arc::new(QueryCatalog::load(source, config.qualifier()?)?);

    if let Some(role) = cli.command.role().filter(|role| !is_known_role(role)) {
        warn!(role, "role is not used by the built-in catalog");
    }

    match cli.command {
        Commands::Queries { role, backend } => {
            let board = Dashboard::detached(catalog);
            for def in board.visible_queries(&role, backend) {
                println!("{:<10} {:<8} {}", def.backend(), def.chart.kind(), def.name);
            }
        }
        Commands::Show { name } => {
            let def = catalog.get(&name).ok_or_else(|| PanelError::UnknownQuery(name.clone()))?;
            print_json(&describe(def))?;
        }
        Commands::Bind { name, controls } => {
            let context = OperatorControls::from(controls).to_context(Utc::now())?;
            let bound = Dashboard::detached(catalog).bind(&name, &context)?;
            print_json(&bound)?;
        }
        Commands::Run { name, controls } => {
            let controls = OperatorControls::from(controls);
            let context = controls.to_context(Utc::now())?;
            let board = Dashboard::from_config(catalog, &config).await?;
            let panel = board.run(&controls.role, &name, &context).await?;
            print_json(&panel)?;
        }
        Commands::Panels { relational, document, controls } => {
            let controls = OperatorControls::from(controls);
            let context = controls.to_context(Utc::now())?;
            let board = Dashboard::from_config(catalog, &config).await?;
            let selection = PanelSelection::new(relational.as_deref(), document.as_deref());
            let report = board.run_panels(&controls.role, &selection, &context).await;
            print_json(&json!({
                "relational": report.relational.map(panel_json),
                "document": report.document.map(panel_json),
            }))?;
        }
        Commands::Overview => {
            let board = Dashboard::from_config(catalog, &config).await?;
            let overview = board.document_overview().await?;
            for (label, value) in overview.metrics() {
                println!("{label:<18} {value}");
            }
        }
    }
    Ok(())
}

fn describe(def: &QueryDefinition) -> Value {
    let template = match &def.template {
        QueryTemplate::Relational { statement } => json!({ "statement": statement }),
        QueryTemplate::Document { collection, pipeline } => json!({
            "collection": collection,
            "pipeline": pipeline.iter().map(|stage| stage.to_json()).collect::<Vec<_>>(),
        }),
    };
    json!({
        "name": def.name,
        "backend": def.backend(),
        "roles": def.roles,
        "params": def.params,
        "chart": def.chart,
        "template": template,
    })
}

fn panel_json(outcome: Result<PanelOutput, PanelError>) -> Value {
    match outcome {
        Ok(panel) => {
            let mut value = serde_json::to_value(&panel).unwrap_or_else(|e| json!({ "error": e.to_string() }));
            if let (Some(kind), Some(fields)) = (panel.error_kind(), value.as_object_mut()) {
                fields.insert("kind".into(), json!(kind));
            }
            value
        }
        Err(e) => json!({ "error": e.to_string(), "kind": e.kind() }),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
