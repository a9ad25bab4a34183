pub mod data_value;
pub use data_value::*;

pub mod param_value;
pub use param_value::*;
