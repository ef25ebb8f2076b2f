//! Network identifiers, endpoint configuration and health states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an independently operated network, e.g. `ethereum` or `arbitrum`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub String);

impl NetworkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account used to sign transactions. Held as the public address string; key
/// material never enters the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningIdentity(pub String);

impl SigningIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }
}

impl fmt::Display for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub id: NetworkId,
    pub rpc_url: String,
    pub chain_id: u64,
    pub signer: Option<SigningIdentity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthState {
    Up,
    Degraded,
    Down,
}

impl HealthState {
    pub fn is_schedulable(self) -> bool {
        !matches!(self, HealthState::Down)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Up => f.write_str("UP"),
            HealthState::Degraded => f.write_str("DEGRADED"),
            HealthState::Down => f.write_str("DOWN"),
        }
    }
}

/// Read-only view of a registered network handed out by the registry.
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    pub config: NetworkConfig,
    pub health: HealthState,
}

impl NetworkHandle {
    pub fn id(&self) -> &NetworkId {
        &self.config.id
    }

    pub fn signer(&self) -> Option<&SigningIdentity> {
        self.config.signer.as_ref()
    }
}
