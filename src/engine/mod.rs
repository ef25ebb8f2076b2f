//! Engine runtime and counters

pub mod runtime;
pub mod stats;

pub use runtime::*;
pub use stats::*;
