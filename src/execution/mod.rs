//! Execution coordination and delegates

pub mod coordinator;
pub mod delegate;
pub mod simulation;

pub use coordinator::*;
pub use delegate::*;
pub use simulation::*;
