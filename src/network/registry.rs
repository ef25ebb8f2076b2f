//! Network endpoint registry: connection handles, signing identities and health

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use crate::{
    errors::{EngineError, EngineResult},
    network::{HealthTracker, HealthTransition, NetworkProbe},
    types::{HealthState, NetworkConfig, NetworkHandle, NetworkHealth, NetworkId},
};

struct NetworkEntry {
    config: NetworkConfig,
    health: HealthTracker,
}

impl NetworkEntry {
    fn handle(&self) -> NetworkHandle {
        NetworkHandle {
            config: self.config.clone(),
            health: self.health.state(),
        }
    }
}

/// Owns every network binding. All health mutation goes through here.
pub struct NetworkRegistry {
    probe: Arc<dyn NetworkProbe>,
    entries: RwLock<HashMap<NetworkId, NetworkEntry>>,
}

impl NetworkRegistry {
    pub fn new(probe: Arc<dyn NetworkProbe>) -> Self {
        Self {
            probe,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Validates the endpoint with one liveness probe and records the network as `Up`.
    pub async fn register(&self, config: NetworkConfig) -> EngineResult<NetworkHandle> {
        if self.entries.read().await.contains_key(&config.id) {
            return Err(EngineError::Conflict { network: config.id });
        }

        if !self.probe.probe(&config).await {
            return Err(EngineError::config(
                Some(&config.id),
                format!("endpoint {} failed the liveness probe", config.rpc_url),
            ));
        }

        let mut entries = self.entries.write().await;
        if entries.contains_key(&config.id) {
            return Err(EngineError::Conflict { network: config.id });
        }
        let entry = NetworkEntry {
            config,
            health: HealthTracker::new(),
        };
        let handle = entry.handle();
        info!(
            network = %handle.id(),
            chain_id = handle.config.chain_id,
            signer = handle.signer().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            "✅ Registered network"
        );
        entries.insert(handle.id().clone(), entry);
        Ok(handle)
    }

    pub async fn get(&self, id: &NetworkId) -> EngineResult<NetworkHandle> {
        self.entries
            .read()
            .await
            .get(id)
            .map(NetworkEntry::handle)
            .ok_or_else(|| EngineError::not_found(format!("network {}", id)))
    }

    pub async fn health(&self, id: &NetworkId) -> EngineResult<HealthState> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|e| e.health.state())
            .ok_or_else(|| EngineError::not_found(format!("network {}", id)))
    }

    pub async fn healths(&self) -> Vec<NetworkHealth> {
        let entries = self.entries.read().await;
        let mut healths: Vec<NetworkHealth> = entries
            .values()
            .map(|e| NetworkHealth {
                network: e.config.id.clone(),
                state: e.health.state(),
                consecutive_failures: e.health.consecutive_failures(),
            })
            .collect();
        healths.sort_by(|a, b| a.network.cmp(&b.network));
        healths
    }

    pub async fn network_ids(&self) -> Vec<NetworkId> {
        let mut ids: Vec<NetworkId> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn record_probe(&self, id: &NetworkId, healthy: bool) -> EngineResult<HealthState> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| EngineError::not_found(format!("network {}", id)))?;
        let transition = if healthy {
            entry.health.record_success()
        } else {
            entry.health.record_failure()
        };
        if let Some(transition) = transition {
            log_transition(id, transition, entry.health.consecutive_failures());
        }
        Ok(entry.health.state())
    }

    /// Downgrade requested by a poller whose pair keeps failing.
    pub async fn report_degraded(&self, id: &NetworkId) -> EngineResult<HealthState> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| EngineError::not_found(format!("network {}", id)))?;
        if let Some(transition) = entry.health.mark_degraded() {
            log_transition(id, transition, entry.health.consecutive_failures());
        }
        Ok(entry.health.state())
    }

    /// Probes every registered network concurrently and applies the results.
    pub async fn probe_all(&self) {
        let configs: Vec<NetworkConfig> = self
            .entries
            .read()
            .await
            .values()
            .map(|e| e.config.clone())
            .collect();

        let mut probes = JoinSet::new();
        for config in configs {
            let probe = self.probe.clone();
            probes.spawn(async move {
                let healthy = probe.probe(&config).await;
                (config.id, healthy)
            });
        }

        while let Some(result) = probes.join_next().await {
            match result {
                Ok((id, healthy)) => {
                    if let Err(e) = self.record_probe(&id, healthy).await {
                        warn!("Dropping probe result: {}", e);
                    }
                }
                Err(e) => error!("Probe task failed: {}", e),
            }
        }
    }
}

fn log_transition(id: &NetworkId, transition: HealthTransition, failures: u32) {
    match transition.to {
        HealthState::Up => info!(network = %id, from = %transition.from, "💚 Network back UP"),
        HealthState::Degraded => warn!(network = %id, from = %transition.from, failures, "🟠 Network DEGRADED"),
        HealthState::Down => error!(network = %id, from = %transition.from, failures, "🔴 Network DOWN"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Probe answering from a mutable set of healthy network ids.
    struct SwitchProbe {
        healthy: Mutex<HashSet<String>>,
    }

    impl SwitchProbe {
        fn new(healthy: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                healthy: Mutex::new(healthy.iter().map(|s| s.to_string()).collect()),
            })
        }

        fn set(&self, id: &str, up: bool) {
            let mut healthy = self.healthy.lock().unwrap();
            if up {
                healthy.insert(id.to_string());
            } else {
                healthy.remove(id);
            }
        }
    }

    #[async_trait]
    impl NetworkProbe for SwitchProbe {
        async fn probe(&self, network: &NetworkConfig) -> bool {
            self.healthy.lock().unwrap().contains(network.id.as_str())
        }
    }

    fn network(id: &str) -> NetworkConfig {
        NetworkConfig {
            id: NetworkId::new(id),
            rpc_url: format!("https://{}.example", id),
            chain_id: 1,
            signer: None,
        }
    }

    #[tokio::test]
    async fn register_then_get() {
        let registry = NetworkRegistry::new(SwitchProbe::new(&["ethereum"]));
        let handle = registry.register(network("ethereum")).await.unwrap();
        assert_eq!(handle.health, HealthState::Up);

        let fetched = registry.get(&NetworkId::new("ethereum")).await.unwrap();
        assert_eq!(fetched.config, network("ethereum"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_config_error() {
        let registry = NetworkRegistry::new(SwitchProbe::new(&[]));
        let err = registry.register(network("ethereum")).await.unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
        assert!(matches!(
            registry.get(&NetworkId::new("ethereum")).await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let registry = NetworkRegistry::new(SwitchProbe::new(&["ethereum"]));
        registry.register(network("ethereum")).await.unwrap();
        assert!(matches!(
            registry.register(network("ethereum")).await,
            Err(EngineError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn probe_cycle_drives_health() {
        let probe = SwitchProbe::new(&["ethereum", "arbitrum"]);
        let registry = NetworkRegistry::new(probe.clone());
        registry.register(network("ethereum")).await.unwrap();
        registry.register(network("arbitrum")).await.unwrap();

        probe.set("arbitrum", false);
        registry.probe_all().await;
        let arb = NetworkId::new("arbitrum");
        assert_eq!(registry.health(&arb).await.unwrap(), HealthState::Degraded);
        assert_eq!(registry.health(&NetworkId::new("ethereum")).await.unwrap(), HealthState::Up);

        registry.probe_all().await;
        registry.probe_all().await;
        assert_eq!(registry.health(&arb).await.unwrap(), HealthState::Down);

        probe.set("arbitrum", true);
        registry.probe_all().await;
        assert_eq!(registry.health(&arb).await.unwrap(), HealthState::Up);
    }

    #[tokio::test]
    async fn report_degraded_on_unknown_network_is_not_found() {
        let registry = NetworkRegistry::new(SwitchProbe::new(&[]));
        assert!(registry.report_degraded(&NetworkId::new("nope")).await.is_err());
    }
}
