//! Network registry, health tracking and connectivity collaborators

pub mod health;
pub mod providers;
pub mod registry;
pub mod retry;

pub use health::*;
pub use providers::*;
pub use registry::*;
pub use retry::*;
