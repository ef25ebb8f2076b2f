//! Core data types and structures

pub mod network;
pub mod asset;
pub mod snapshot;
pub mod opportunity;
pub mod execution;
pub mod health;

pub use network::*;
pub use asset::*;
pub use snapshot::*;
pub use opportunity::*;
pub use execution::*;
pub use health::*;
