//! Event-driven cross-network divergence detection

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};
use crate::{
    config::StalenessPolicy,
    types::{Asset, NetworkId, OpportunityCandidate, PriceSnapshot},
};

/// Result of feeding one snapshot to the detector.
#[derive(Debug, Default)]
pub struct DetectionPass {
    /// False when the snapshot was older than the stored one for its pair.
    pub applied: bool,
    pub candidates: Vec<OpportunityCandidate>,
    /// Snapshots left out of this pass for being past their staleness bound.
    pub stale_excluded: u64,
}

/// Keeps the latest snapshot per (network, asset) and compares each arrival
/// against the other networks quoting the same asset.
pub struct OpportunityDetector {
    staleness: StalenessPolicy,
    intervals: HashMap<String, Duration>,
    book: Mutex<HashMap<String, HashMap<NetworkId, PriceSnapshot>>>,
    passes: AtomicU64,
}

impl OpportunityDetector {
    pub fn new(staleness: StalenessPolicy, assets: &[Asset]) -> Self {
        Self {
            staleness,
            intervals: assets
                .iter()
                .map(|a| (a.symbol.clone(), a.poll_interval))
                .collect(),
            book: Mutex::new(HashMap::new()),
            passes: AtomicU64::new(0),
        }
    }

    pub fn staleness_bound(&self, asset: &str) -> Duration {
        let interval = self.intervals.get(asset).copied().unwrap_or_default();
        self.staleness.bound_for(interval)
    }

    pub fn on_snapshot(&self, snapshot: PriceSnapshot, now: DateTime<Utc>) -> DetectionPass {
        let bound = self.staleness_bound(&snapshot.asset);
        let mut book = self.book.lock().unwrap_or_else(|p| p.into_inner());
        let quotes = book.entry(snapshot.asset.clone()).or_default();

        if let Some(existing) = quotes.get(&snapshot.network) {
            if existing.sequence >= snapshot.sequence {
                trace!(
                    network = %snapshot.network,
                    asset = %snapshot.asset,
                    stored = existing.sequence,
                    arrived = snapshot.sequence,
                    "Dropping out-of-order snapshot"
                );
                return DetectionPass::default();
            }
        }
        quotes.insert(snapshot.network.clone(), snapshot.clone());

        let detection_seq = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        let mut pass = DetectionPass {
            applied: true,
            ..Default::default()
        };

        if is_stale(&snapshot, bound, now) {
            pass.stale_excluded += 1;
            debug!(network = %snapshot.network, asset = %snapshot.asset, "Arrived already stale, nothing to compare");
            return pass;
        }

        for other in quotes.values() {
            if other.network == snapshot.network {
                continue;
            }
            if is_stale(other, bound, now) {
                pass.stale_excluded += 1;
                continue;
            }
            let (source, target) = if snapshot.price < other.price {
                (&snapshot, other)
            } else if snapshot.price > other.price {
                (other, &snapshot)
            } else {
                continue;
            };

            pass.candidates.push(OpportunityCandidate {
                asset: snapshot.asset.clone(),
                source_network: source.network.clone(),
                target_network: target.network.clone(),
                source_price: source.price,
                target_price: target.price,
                discovered_at: now,
                fresh_until: expiry(source, bound).min(expiry(target, bound)),
                detection_seq,
            });
        }

        pass.candidates.sort_by(|a, b| a.key().cmp(&b.key()));
        pass
    }

    pub fn latest(&self, asset: &str, network: &NetworkId) -> Option<PriceSnapshot> {
        let book = self.book.lock().unwrap_or_else(|p| p.into_inner());
        book.get(asset).and_then(|quotes| quotes.get(network)).cloned()
    }

    pub fn tracked_pairs(&self) -> usize {
        let book = self.book.lock().unwrap_or_else(|p| p.into_inner());
        book.values().map(HashMap::len).sum()
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

fn is_stale(snapshot: &PriceSnapshot, bound: Duration, now: DateTime<Utc>) -> bool {
    snapshot.age(now) > to_chrono(bound)
}

fn expiry(snapshot: &PriceSnapshot, bound: Duration) -> DateTime<Utc> {
    snapshot
        .observed_at
        .checked_add_signed(to_chrono(bound))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
