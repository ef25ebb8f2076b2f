//! Engine runtime: wires the registry, pollers, detector, evaluator, bus and
//! execution coordinator together.

use std::sync::{Arc, Mutex};
use std::time::Instant;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use crate::{
    arbitrage::{estimate_costs, CostEstimator, DetectionPass, OpportunityDetector, ProfitabilityEvaluator},
    bus::{OpportunityBus, PublishOutcome, Subscription},
    config::Config,
    engine::{EngineStats, StatsSnapshot},
    errors::{EngineError, EngineResult},
    execution::{ExecutionCoordinator, ExecutionDelegate, LeaseAttempt},
    feed::{PollTarget, PricePoller},
    network::{NetworkProbe, NetworkRegistry, PriceSource},
    types::{
        ExecutionReport, ExecutionTicket, HealthState, HealthStatus, NetworkId, OpportunityCandidate,
        PriceSnapshot, ScoredOpportunity, SigningIdentity, VerdictId,
    },
    utils::run_health_check,
    validation::validate_candidate_freshness,
};

/// External systems the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn NetworkProbe>,
    pub prices: Arc<dyn PriceSource>,
    pub costs: Arc<dyn CostEstimator>,
    pub executor: Arc<dyn ExecutionDelegate>,
}

pub struct ArbitrageEngine {
    config: Config,
    registry: Arc<NetworkRegistry>,
    detector: OpportunityDetector,
    evaluator: ProfitabilityEvaluator,
    coordinator: ExecutionCoordinator,
    bus: OpportunityBus,
    collaborators: Collaborators,
    stats: EngineStats,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started_at: Instant,
}

impl ArbitrageEngine {
    pub fn new(config: Config, collaborators: Collaborators) -> EngineResult<Arc<Self>> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Arc::new(Self {
            registry: Arc::new(NetworkRegistry::new(collaborators.probe.clone())),
            detector: OpportunityDetector::new(config.staleness, &config.assets),
            evaluator: ProfitabilityEvaluator::new(config.prohibitive),
            coordinator: ExecutionCoordinator::new(config.lease_timeout),
            bus: OpportunityBus::new(config.bus_capacity),
            collaborators,
            stats: EngineStats::default(),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            started_at: Instant::now(),
            config,
        }))
    }

    /// Registers every configured network and starts the probe loop, one poll
    /// loop per (network, asset) pair and the snapshot pipeline. Returns the
    /// networks that came up.
    pub async fn start(self: &Arc<Self>) -> EngineResult<Vec<NetworkId>> {
        if *self.shutdown_tx.borrow() {
            return Err(EngineError::ShuttingDown);
        }

        let mut registered = Vec::new();
        for network in &self.config.networks {
            match self.registry.register(network.clone()).await {
                Ok(handle) => registered.push(handle.config),
                Err(e) => error!(network = %network.id, "❌ Network disabled: {}", e),
            }
        }
        if registered.is_empty() {
            return Err(EngineError::config(None, "no configured network passed registration"));
        }

        let targets: Vec<PollTarget> = self
            .config
            .assets
            .iter()
            .flat_map(|asset| {
                registered
                    .iter()
                    // An asset without any address is quoted on every network.
                    .filter(|network| asset.addresses.is_empty() || asset.is_listed_on(&network.id))
                    .map(|network| PollTarget {
                        network: network.clone(),
                        asset: asset.clone(),
                    })
            })
            .collect();

        let (snapshot_tx, snapshot_rx) = mpsc::channel(self.config.bus_capacity);
        let poller = Arc::new(PricePoller::new(
            self.collaborators.prices.clone(),
            self.registry.clone(),
            self.config.poller,
        ));

        let mut handles = poller.spawn_all(targets, snapshot_tx, self.shutdown_tx.subscribe());
        handles.push(self.spawn_probe_loop());
        handles.push(self.spawn_pipeline(snapshot_rx));
        self.tasks.lock().unwrap_or_else(|p| p.into_inner()).extend(handles);

        let ids: Vec<NetworkId> = registered.into_iter().map(|n| n.id).collect();
        info!(
            networks = ids.len(),
            assets = self.config.assets.len(),
            "🚀 Arbitrage engine started"
        );
        Ok(ids)
    }

    fn spawn_probe_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let period = self.config.probe_interval;
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Registration already probed every network once.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // A hung endpoint must not hold up shutdown.
                        tokio::select! {
                            _ = registry.probe_all() => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Probe loop stopped");
        })
    }

    fn spawn_pipeline(self: &Arc<Self>, mut snapshots: mpsc::Receiver<PriceSnapshot>) -> JoinHandle<()> {
        let engine = self.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut evaluations = JoinSet::new();
            loop {
                tokio::select! {
                    received = snapshots.recv() => {
                        let Some(snapshot) = received else { break };
                        // Detection stays on this task so each pair is applied in
                        // arrival order; evaluation fans out.
                        let pass = engine.detect(snapshot);
                        if !pass.candidates.is_empty() {
                            let worker = engine.clone();
                            evaluations.spawn(async move {
                                worker.evaluate_pass(pass).await;
                            });
                        }
                    }
                    Some(finished) = evaluations.join_next(), if !evaluations.is_empty() => {
                        if let Err(e) = finished {
                            error!("Evaluation task failed: {}", e);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            let abandoned = evaluations.len();
            evaluations.shutdown().await;
            debug!(abandoned, "Snapshot pipeline stopped");
        })
    }

    /// Runs one snapshot through detection, evaluation and publication.
    /// Returns the verdicts that reached the bus.
    pub async fn process_snapshot(self: &Arc<Self>, snapshot: PriceSnapshot) -> Vec<Arc<ScoredOpportunity>> {
        let pass = self.detect(snapshot);
        self.evaluate_pass(pass).await
    }

    fn detect(&self, snapshot: PriceSnapshot) -> DetectionPass {
        let pass = self.detector.on_snapshot(snapshot, Utc::now());
        self.stats
            .record_pass(pass.applied, pass.candidates.len(), pass.stale_excluded);
        pass
    }

    async fn evaluate_pass(self: &Arc<Self>, pass: DetectionPass) -> Vec<Arc<ScoredOpportunity>> {
        let mut evaluations = JoinSet::new();
        for candidate in pass.candidates {
            let engine = self.clone();
            evaluations.spawn(async move { engine.evaluate_candidate(candidate).await });
        }

        let mut published = Vec::new();
        while let Some(result) = evaluations.join_next().await {
            match result {
                Ok(Some(opportunity)) => published.push(opportunity),
                Ok(None) => {}
                Err(e) => error!("Evaluation task failed: {}", e),
            }
        }
        published.sort_by(|a, b| a.key().cmp(&b.key()));
        published
    }

    async fn evaluate_candidate(&self, candidate: OpportunityCandidate) -> Option<Arc<ScoredOpportunity>> {
        if self.is_shutting_down() {
            return None;
        }
        for network in [&candidate.source_network, &candidate.target_network] {
            match self.registry.health(network).await {
                Ok(HealthState::Down) => {
                    debug!(pair = %candidate.key(), network = %network, "Skipping candidate on DOWN network");
                    self.stats.record_down_network_skip();
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(pair = %candidate.key(), "Skipping candidate: {}", e);
                    return None;
                }
            }
        }

        let trade_size = self.config.trade_size_usd;
        let costs = match estimate_costs(self.collaborators.costs.as_ref(), &candidate, trade_size).await {
            Ok(costs) => costs,
            Err(e) => {
                warn!(pair = %candidate.key(), "⚠️ Cost estimation failed: {}", e);
                self.stats.record_cost_failure();
                return None;
            }
        };

        if self.is_shutting_down() {
            debug!(pair = %candidate.key(), "Dropping evaluation, engine is shutting down");
            return None;
        }

        // Estimation may have outlived the price pair.
        if let Err(e) = validate_candidate_freshness(&candidate, Utc::now()) {
            debug!(pair = %candidate.key(), "Candidate went stale during cost estimation: {}", e);
            self.stats.record_stale_candidate();
            return None;
        }

        let verdict = match self
            .evaluator
            .evaluate(&candidate, trade_size, &costs, self.config.min_profit_threshold_pct)
        {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(pair = %candidate.key(), "Evaluation rejected: {}", e);
                self.stats.record_invalid_input();
                return None;
            }
        };

        if self.is_shutting_down() {
            return None;
        }

        let profitable = verdict.is_profitable;
        let opportunity = ScoredOpportunity::new(verdict);
        let id = opportunity.id;
        let key = opportunity.key();
        match self.bus.publish(opportunity) {
            PublishOutcome::Delivered { receivers } => {
                self.stats.record_verdict(true, profitable);
                if profitable {
                    info!(verdict_id = %id, pair = %key, receivers, "💰 Profitable opportunity published");
                } else {
                    debug!(verdict_id = %id, pair = %key, receivers, "Verdict published");
                }
                self.bus.lookup(&id)
            }
            PublishOutcome::Superseded => {
                self.stats.record_verdict(false, profitable);
                None
            }
        }
    }

    /// Leases every network the opportunity touches for `identity` and runs the
    /// execution delegate in the background. The report is published on the
    /// execution feed.
    pub async fn request_execution(
        self: &Arc<Self>,
        verdict_id: VerdictId,
        identity: SigningIdentity,
    ) -> EngineResult<ExecutionTicket> {
        let Some(opportunity) = self.bus.lookup(&verdict_id) else {
            debug!(verdict_id = %verdict_id, "Execution requested for unknown or superseded verdict");
            return Ok(ExecutionTicket::NotFound);
        };

        let now = Utc::now();
        let expired = (now - opportunity.published_at)
            .to_std()
            .is_ok_and(|age| age > self.config.verdict_ttl);
        let stale = validate_candidate_freshness(&opportunity.verdict.candidate, now).err();
        if expired || stale.is_some() {
            debug!(verdict_id = %verdict_id, reason = ?stale, "Execution requested for stale verdict");
            return Ok(ExecutionTicket::NotFound);
        }

        let networks = [
            opportunity.verdict.candidate.source_network.clone(),
            opportunity.verdict.candidate.target_network.clone(),
        ];
        for network in &networks {
            let handle = self.registry.get(network).await?;
            if handle.signer() != Some(&identity) {
                return Err(EngineError::not_found(format!(
                    "signing identity {} on network {}",
                    identity, network
                )));
            }
            if handle.health == HealthState::Down {
                return Err(EngineError::NetworkDown { network: network.clone() });
            }
        }

        let lease = match self.coordinator.acquire_all(&identity, &networks)? {
            LeaseAttempt::Acquired(lease) => lease,
            LeaseAttempt::Busy => {
                self.stats.record_execution_busy();
                info!(verdict_id = %verdict_id, identity = %identity, "⏳ Execution refused: lease busy");
                return Ok(ExecutionTicket::Busy);
            }
        };

        let lease_id = lease.id();
        self.stats.record_execution_accepted();

        let engine = self.clone();
        tokio::spawn(async move {
            let report = engine
                .coordinator
                .execute(lease, engine.collaborators.executor.as_ref(), &opportunity)
                .await;
            engine.stats.record_outcome(&report.outcome);
            engine.bus.publish_execution(report);
        });

        Ok(ExecutionTicket::Accepted(lease_id))
    }

    pub fn subscribe(&self) -> Subscription<Arc<ScoredOpportunity>> {
        self.bus.subscribe()
    }

    pub fn subscribe_executions(&self) -> Subscription<ExecutionReport> {
        self.bus.subscribe_executions()
    }

    pub fn current_opportunities(&self, asset_filter: Option<&str>) -> Vec<Arc<ScoredOpportunity>> {
        self.bus.current_opportunities(asset_filter)
    }

    pub async fn health(&self) -> HealthStatus {
        run_health_check(&self.registry, &self.coordinator, &self.bus, &self.stats, self.started_at).await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    /// Stops polling, probing and the pipeline and refuses new executions.
    /// Executions already holding a lease finish on their own timeout.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        self.coordinator.shutdown();
        info!(in_flight = self.coordinator.in_flight(), "🛑 Shutting down arbitrage engine");

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|p| p.into_inner()));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Task ended abnormally during shutdown: {}", e);
            }
        }
        info!("✅ Engine stopped");
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}
