//! Health monitoring types

use serde::Serialize;
use super::{HealthState, NetworkId};

#[derive(Debug, Clone, Serialize)]
pub struct NetworkHealth {
    pub network: NetworkId,
    pub state: HealthState,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub networks: Vec<NetworkHealth>,
    pub in_flight_executions: usize,
    pub open_opportunities: usize,
    pub stale_candidates_dropped: u64,
    pub uptime_seconds: u64,
}

impl HealthStatus {
    pub fn networks_up(&self) -> usize {
        self.networks.iter().filter(|n| n.state == HealthState::Up).count()
    }
}
