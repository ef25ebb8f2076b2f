//! Custom error types for the engine

use std::time::Duration;
use thiserror::Error;
use crate::types::NetworkId;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error{}: {message}", network.as_ref().map(|n| format!(" for {}", n)).unwrap_or_default())]
    Config {
        network: Option<NetworkId>,
        message: String,
    },

    #[error("Network {network} is already registered")]
    Conflict { network: NetworkId },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Price fetch failed for {asset} on {network}: {source}")]
    TransientFetch {
        network: NetworkId,
        asset: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Stale data for {asset} on {network} (age {age:?})")]
    StaleData {
        asset: String,
        network: NetworkId,
        age: Duration,
    },

    #[error("Network {network} is down")]
    NetworkDown { network: NetworkId },

    #[error("Engine is shutting down")]
    ShuttingDown,
}

impl EngineError {
    pub fn config(network: Option<&NetworkId>, message: impl Into<String>) -> Self {
        EngineError::Config {
            network: network.cloned(),
            message: message.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound { what: what.into() }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure modes of a single price fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("rate limited")]
    RateLimited,

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Failure modes reported by an execution delegate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("submission timed out")]
    Timeout,
}
