pub mod value;
pub use value::{DataValue, Document, ParamValue};

pub mod catalog;
pub use catalog::{BackendKind, ChartSpec, QueryCatalog, QueryDefinition};

pub mod binder;
pub use binder::{BoundQuery, ParameterContext, QueryBinder};

pub mod executor;
pub use executor::{DocumentExecutor, QueryExecutor, RelationalExecutor, TabularResult};

pub mod memory;
pub use memory::MemoryDocumentStore;

pub mod cache;
pub use cache::{Clock, ResultCache, SystemClock};

pub mod render;
pub use render::{ChartOutput, ChartRenderer};

pub mod config;
pub use config::DashboardConfig;

pub mod dashboard;
pub use dashboard::{Dashboard, OperatorControls, PanelOutput};
