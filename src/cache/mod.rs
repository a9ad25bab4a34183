pub mod clock;
pub use clock::*;

pub mod cache_key;
pub use cache_key::*;

pub mod result_cache;
pub use result_cache::*;
