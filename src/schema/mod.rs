//! Schema module - Configuration and reporting types for QD runs.

mod archive;
mod config;
mod emitter;
mod history;

pub use archive::*;
pub use config::*;
pub use emitter::*;
pub use history::*;
