pub mod sql_scanner;
pub use sql_scanner::*;

pub mod parameter_context;
pub use parameter_context::*;

pub mod bind_error;
pub use bind_error::*;

pub mod bound_query;
pub use bound_query::*;

pub mod query_binder;
pub use query_binder::*;
