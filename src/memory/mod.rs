pub mod pipeline_error;
pub use pipeline_error::*;

pub mod snapshot_error;
pub use snapshot_error::*;

pub mod ordering;
pub use ordering::*;

pub mod extended_json;
pub use extended_json::*;

pub mod expression;
pub use expression::*;

pub mod matcher;
pub use matcher::*;

pub mod accumulator;
pub use accumulator::*;

pub mod pipeline;
pub use pipeline::*;

pub mod memory_collection;
pub use memory_collection::*;

pub mod memory_store;
pub use memory_store::*;
