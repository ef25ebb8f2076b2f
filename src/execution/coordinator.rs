//! Execution coordinator: one in-flight execution per (identity, network)

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use crate::{
    errors::{EngineError, EngineResult, SubmitError},
    execution::ExecutionDelegate,
    types::{
        ExecutionFailure, ExecutionOutcome, ExecutionReport, LeaseId, LeaseKey, LeaseState,
        NetworkId, ScoredOpportunity, SigningIdentity,
    },
};

type LeaseMap = Arc<Mutex<HashMap<LeaseKey, LeaseId>>>;

/// Held lease over one or more keys. Dropping it releases every key, whatever
/// way the bracketed execution ended.
#[derive(Debug)]
pub struct Lease {
    id: LeaseId,
    identity: SigningIdentity,
    networks: Vec<NetworkId>,
    leases: LeaseMap,
}

impl Lease {
    pub fn id(&self) -> LeaseId {
        self.id
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    pub fn networks(&self) -> &[NetworkId] {
        &self.networks
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut leases = self.leases.lock().unwrap_or_else(|p| p.into_inner());
        for network in &self.networks {
            let key = LeaseKey {
                identity: self.identity.clone(),
                network: network.clone(),
            };
            if leases.get(&key) == Some(&self.id) {
                leases.remove(&key);
            }
        }
    }
}

#[derive(Debug)]
pub enum LeaseAttempt {
    Acquired(Lease),
    /// A lease on one of the keys is already held. Not queued; re-evaluate later.
    Busy,
}

pub struct ExecutionCoordinator {
    leases: LeaseMap,
    accepting: AtomicBool,
    timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            leases: Arc::new(Mutex::new(HashMap::new())),
            accepting: AtomicBool::new(true),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn acquire(&self, identity: &SigningIdentity, network: &NetworkId) -> EngineResult<LeaseAttempt> {
        self.acquire_all(identity, std::slice::from_ref(network))
    }

    /// All-or-nothing acquisition of `(identity, network)` for every network.
    pub fn acquire_all(&self, identity: &SigningIdentity, networks: &[NetworkId]) -> EngineResult<LeaseAttempt> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(EngineError::ShuttingDown);
        }
        if networks.is_empty() {
            return Err(EngineError::invalid_input("lease needs at least one network"));
        }

        let mut networks = networks.to_vec();
        networks.sort();
        networks.dedup();

        let mut leases = self.leases.lock().unwrap_or_else(|p| p.into_inner());
        let keys: Vec<LeaseKey> = networks
            .iter()
            .map(|network| LeaseKey {
                identity: identity.clone(),
                network: network.clone(),
            })
            .collect();
        if keys.iter().any(|key| leases.contains_key(key)) {
            return Ok(LeaseAttempt::Busy);
        }

        let id = LeaseId(uuid::Uuid::new_v4());
        for key in keys {
            leases.insert(key, id);
        }

        Ok(LeaseAttempt::Acquired(Lease {
            id,
            identity: identity.clone(),
            networks,
            leases: self.leases.clone(),
        }))
    }

    pub fn state(&self, identity: &SigningIdentity, network: &NetworkId) -> LeaseState {
        let leases = self.leases.lock().unwrap_or_else(|p| p.into_inner());
        let key = LeaseKey {
            identity: identity.clone(),
            network: network.clone(),
        };
        match leases.get(&key) {
            Some(lease_id) => LeaseState::Leased { lease_id: *lease_id },
            None => LeaseState::Idle,
        }
    }

    /// Executions currently holding a lease. A multi-network lease counts once.
    pub fn in_flight(&self) -> usize {
        let leases = self.leases.lock().unwrap_or_else(|p| p.into_inner());
        leases.values().collect::<HashSet<&LeaseId>>().len()
    }

    /// Runs the delegate under `lease`, bounded by the lease timeout, and
    /// releases the lease on every outcome.
    pub async fn execute(
        &self,
        lease: Lease,
        delegate: &dyn ExecutionDelegate,
        opportunity: &ScoredOpportunity,
    ) -> ExecutionReport {
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            lease_id = %lease.id(),
            verdict_id = %opportunity.id,
            identity = %lease.identity(),
            "🚀 Submitting execution for {}",
            opportunity.key()
        );

        let outcome = match tokio::time::timeout(self.timeout, delegate.submit(opportunity, lease.identity())).await {
            Ok(Ok(receipt)) => ExecutionOutcome::Settled(receipt),
            Ok(Err(SubmitError::Rejected(reason))) => ExecutionOutcome::Failed(ExecutionFailure::Rejected(reason)),
            Ok(Err(SubmitError::Reverted(reason))) => ExecutionOutcome::Failed(ExecutionFailure::Reverted(reason)),
            Ok(Err(SubmitError::Timeout)) => ExecutionOutcome::TimedOut,
            Err(_) => {
                warn!(lease_id = %lease.id(), "⏱️ Execution exceeded {:?}, forcing lease release", self.timeout);
                ExecutionOutcome::TimedOut
            }
        };

        let report = ExecutionReport {
            lease_id: lease.id(),
            verdict_id: opportunity.id,
            identity: lease.identity().clone(),
            networks: lease.networks().to_vec(),
            outcome,
            started_at,
            finished_at: Utc::now(),
            execution_time_ms: start.elapsed().as_millis() as u64,
        };
        drop(lease);

        info!(
            lease_id = %report.lease_id,
            state = ?report.outcome.final_state(),
            elapsed_ms = report.execution_time_ms,
            "Lease released"
        );
        report
    }

    /// Refuses every later acquire. Held leases run to completion or timeout.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}
