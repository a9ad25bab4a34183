pub mod render_error;
pub use render_error::*;

pub mod chart_output;
pub use chart_output::*;

pub mod temporal;
pub use temporal::*;

pub mod chart_renderer;
pub use chart_renderer::*;
