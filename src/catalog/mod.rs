pub mod backend_kind;
pub use backend_kind::*;

pub mod catalog_error;
pub use catalog_error::*;

pub mod chart_spec;
pub use chart_spec::*;

pub mod pipeline_template;
pub use pipeline_template::*;

pub mod query_definition;
pub use query_definition::*;

pub mod schema_qualifier;
pub use schema_qualifier::*;

pub mod role_filter;
pub use role_filter::{is_known_role, visible_to, KNOWN_ROLES, WILDCARD_ROLE};

pub mod catalog_source;
pub use catalog_source::*;

pub mod query_catalog;
pub use query_catalog::*;
