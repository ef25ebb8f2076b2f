//! Error taxonomy and recovery strategies

pub mod engine_error;
pub mod recovery;

pub use engine_error::*;
pub use recovery::*;
