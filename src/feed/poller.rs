//! One poll loop per (network, asset) pair

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Level};
use crate::{
    config::PollerSettings,
    errors::{recovery_for, EngineError, FetchError, RecoveryAction},
    network::{with_jitter, NetworkRegistry, PollBackoff, PriceSource},
    types::{Asset, NetworkConfig, PriceSnapshot},
    validation::validate_price,
};

#[derive(Debug, Clone)]
pub struct PollTarget {
    pub network: NetworkConfig,
    pub asset: Asset,
}

impl PollTarget {
    fn label(&self) -> String {
        format!("{}/{}", self.network.id, self.asset.symbol)
    }
}

pub struct PricePoller {
    source: Arc<dyn PriceSource>,
    registry: Arc<NetworkRegistry>,
    settings: PollerSettings,
}

impl PricePoller {
    pub fn new(source: Arc<dyn PriceSource>, registry: Arc<NetworkRegistry>, settings: PollerSettings) -> Self {
        Self { source, registry, settings }
    }

    pub fn spawn_all(
        self: &Arc<Self>,
        targets: Vec<PollTarget>,
        snapshots: mpsc::Sender<PriceSnapshot>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        info!("📡 Starting {} price poll loops", targets.len());
        targets
            .into_iter()
            .map(|target| self.spawn(target, snapshots.clone(), shutdown.clone()))
            .collect()
    }

    pub fn spawn(
        self: &Arc<Self>,
        target: PollTarget,
        snapshots: mpsc::Sender<PriceSnapshot>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move { poller.run(target, snapshots, shutdown).await })
    }

    async fn run(
        &self,
        target: PollTarget,
        snapshots: mpsc::Sender<PriceSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let label = target.label();
        let mut backoff = PollBackoff::new(target.asset.poll_interval, self.settings.max_backoff_multiplier);
        let mut sequence: u64 = 0;
        let mut failures: u32 = 0;

        debug!(pair = %label, interval = ?backoff.base(), "Poll loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // A fetch in progress is abandoned as soon as shutdown is signalled.
            let polled = tokio::select! {
                polled = self.poll_once(&target) => polled,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let delay = match polled {
                Ok(price) => {
                    if failures > 0 {
                        info!(pair = %label, after_failures = failures, "Price feed recovered");
                    }
                    failures = 0;
                    sequence += 1;
                    let snapshot = PriceSnapshot {
                        network: target.network.id.clone(),
                        asset: target.asset.symbol.clone(),
                        price,
                        observed_at: Utc::now(),
                        sequence,
                    };
                    if let Err(e) = snapshots.try_send(snapshot) {
                        match e {
                            mpsc::error::TrySendError::Full(_) => {
                                warn!(pair = %label, sequence, "Snapshot channel full, dropping snapshot")
                            }
                            mpsc::error::TrySendError::Closed(_) => {
                                debug!(pair = %label, "Snapshot channel closed, stopping poll loop");
                                break;
                            }
                        }
                    }
                    backoff.record_success()
                }
                Err(fetch_error) => {
                    failures = failures.saturating_add(1);
                    let action = recovery_for(&fetch_error);
                    let delay = match action {
                        RecoveryAction::Backoff { .. } => backoff.record_failure(),
                        RecoveryAction::BackoffToCeiling { .. } => backoff.jump_to_ceiling(),
                    };
                    let error = EngineError::TransientFetch {
                        network: target.network.id.clone(),
                        asset: target.asset.symbol.clone(),
                        source: fetch_error,
                    };
                    log_failure(action.log_level(), &error, failures, delay);

                    // Repeats every N failures so a network the prober brought
                    // back Up is downgraded again while this pair keeps failing.
                    if failures % self.settings.degraded_after_failures.max(1) == 0 {
                        if let Err(e) = self.registry.report_degraded(&target.network.id).await {
                            warn!(pair = %label, "Could not report degraded network: {}", e);
                        }
                    }
                    with_jitter(delay)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!(pair = %label, polls_published = sequence, "Poll loop stopped");
    }

    async fn poll_once(&self, target: &PollTarget) -> Result<rust_decimal::Decimal, FetchError> {
        let price = self.source.fetch_price(&target.network, &target.asset).await?;
        validate_price(price, &target.label())?;
        Ok(price)
    }
}

fn log_failure(level: Level, error: &EngineError, failures: u32, next: Duration) {
    if level == Level::ERROR {
        error!(failures, next_poll = ?next, "❌ {}", error);
    } else {
        warn!(failures, next_poll = ?next, "⚠️ {}", error);
    }
}
