pub mod operator_controls;
pub use operator_controls::*;

pub mod panel;
pub use panel::*;

pub mod runner;
pub use runner::*;
