//! Health monitoring utilities

use std::time::Instant;
use crate::{
    bus::OpportunityBus,
    engine::EngineStats,
    execution::ExecutionCoordinator,
    network::NetworkRegistry,
    types::HealthStatus,
};

pub async fn run_health_check(
    registry: &NetworkRegistry,
    coordinator: &ExecutionCoordinator,
    bus: &OpportunityBus,
    stats: &EngineStats,
    start_time: Instant,
) -> HealthStatus {
    HealthStatus {
        networks: registry.healths().await,
        in_flight_executions: coordinator.in_flight(),
        open_opportunities: bus.current_opportunities(None).len(),
        stale_candidates_dropped: stats.stale_candidates_dropped(),
        uptime_seconds: start_time.elapsed().as_secs(),
    }
}
