pub mod config_error;
pub use config_error::*;

pub mod dashboard_config;
pub use dashboard_config::*;
