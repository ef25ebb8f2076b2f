//! Cross-network arbitrage engine
//!
//! Polls asset prices on several EVM networks, detects divergences between
//! them, scores each one net of gas, bridge and slippage costs and publishes
//! the verdicts to subscribers. Execution of a verdict is serialized per
//! (signing identity, network) through a lease.

pub mod config;
pub mod types;
pub mod errors;
pub mod network;
pub mod feed;
pub mod arbitrage;
pub mod execution;
pub mod bus;
pub mod engine;
pub mod validation;
pub mod utils;
pub mod storage;

// Re-export commonly used items
pub use config::Config;
pub use engine::{ArbitrageEngine, Collaborators};
pub use errors::{EngineError, EngineResult};
pub use types::*;

// Type alias for our concrete provider
pub type ConcreteProvider = alloy::providers::RootProvider<alloy::transports::BoxTransport>;
