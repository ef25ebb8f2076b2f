//! Live publish/subscribe point for verdicts and execution reports

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};
use crate::types::{ExecutionReport, OpportunityKey, ScoredOpportunity, VerdictId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered { receivers: usize },
    /// A verdict from a later detection pass is already out for this pair.
    Superseded,
}

#[derive(Default)]
struct LatestVerdicts {
    by_key: HashMap<OpportunityKey, Arc<ScoredOpportunity>>,
    by_id: HashMap<VerdictId, OpportunityKey>,
}

/// Bounded broadcast: producers never wait on subscribers. A subscriber that
/// falls more than `capacity` messages behind loses the oldest ones and is
/// told how many it skipped.
pub struct OpportunityBus {
    verdicts: broadcast::Sender<Arc<ScoredOpportunity>>,
    executions: broadcast::Sender<ExecutionReport>,
    latest: Mutex<LatestVerdicts>,
}

impl OpportunityBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (verdicts, _) = broadcast::channel(capacity);
        let (executions, _) = broadcast::channel(capacity);
        Self {
            verdicts,
            executions,
            latest: Mutex::new(LatestVerdicts::default()),
        }
    }

    pub fn publish(&self, opportunity: ScoredOpportunity) -> PublishOutcome {
        let key = opportunity.key();
        let mut latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(current) = latest.by_key.get(&key) {
            if current.verdict.candidate.detection_seq >= opportunity.verdict.candidate.detection_seq {
                debug!(pair = %key, "Discarding verdict from an older detection pass");
                return PublishOutcome::Superseded;
            }
        }

        let opportunity = Arc::new(opportunity);
        if let Some(previous) = latest.by_key.insert(key.clone(), opportunity.clone()) {
            latest.by_id.remove(&previous.id);
        }
        latest.by_id.insert(opportunity.id, key);

        // Sent under the lock so per-pair order matches insertion order.
        let receivers = self.verdicts.send(opportunity).unwrap_or(0);
        PublishOutcome::Delivered { receivers }
    }

    pub fn publish_execution(&self, report: ExecutionReport) -> usize {
        self.executions.send(report).unwrap_or(0)
    }

    /// Live feed of verdicts published from now on.
    pub fn subscribe(&self) -> Subscription<Arc<ScoredOpportunity>> {
        Subscription::new(self.verdicts.subscribe(), "verdicts")
    }

    pub fn subscribe_executions(&self) -> Subscription<ExecutionReport> {
        Subscription::new(self.executions.subscribe(), "executions")
    }

    /// The verdict, as long as it is still the newest one for its pair.
    pub fn lookup(&self, id: &VerdictId) -> Option<Arc<ScoredOpportunity>> {
        let latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());
        latest
            .by_id
            .get(id)
            .and_then(|key| latest.by_key.get(key))
            .cloned()
    }

    /// Latest verdict per (asset, source, target), optionally for one asset.
    pub fn current_opportunities(&self, asset_filter: Option<&str>) -> Vec<Arc<ScoredOpportunity>> {
        let latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());
        let mut current: Vec<Arc<ScoredOpportunity>> = latest
            .by_key
            .iter()
            .filter(|(key, _)| asset_filter.is_none_or(|asset| key.asset.eq_ignore_ascii_case(asset)))
            .map(|(_, opportunity)| opportunity.clone())
            .collect();
        current.sort_by(|a, b| a.key().cmp(&b.key()));
        current
    }

    pub fn subscriber_count(&self) -> usize {
        self.verdicts.receiver_count()
    }
}

/// Receiving end of a bus feed.
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
    skipped: u64,
    feed: &'static str,
}

impl<T: Clone> Subscription<T> {
    fn new(rx: broadcast::Receiver<T>, feed: &'static str) -> Self {
        Self { rx, skipped: 0, feed }
    }

    /// Next message, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(item) => return Some(item),
                Err(RecvError::Lagged(n)) => self.record_lag(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::next`].
    pub fn try_next(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(item) => return Some(item),
                Err(TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Messages dropped because this subscriber fell behind.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn record_lag(&mut self, n: u64) {
        self.skipped += n;
        warn!(feed = self.feed, skipped = n, total_skipped = self.skipped, "Slow subscriber lost messages");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use crate::types::{NetworkId, OpportunityCandidate, ProfitabilityVerdict, ProhibitiveFlags};

    fn scored(asset: &str, source: &str, target: &str, detection_seq: u64) -> ScoredOpportunity {
        let now = Utc::now();
        ScoredOpportunity::new(ProfitabilityVerdict {
            candidate: OpportunityCandidate {
                asset: asset.to_string(),
                source_network: NetworkId::new(source),
                target_network: NetworkId::new(target),
                source_price: dec!(100),
                target_price: dec!(101),
                discovered_at: now,
                fresh_until: now,
                detection_seq,
            },
            trade_size_usd: dec!(1000),
            price_diff_pct: dec!(1),
            gross_profit_usd: dec!(10),
            gas_cost_usd: Decimal::ZERO,
            bridge_cost_usd: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            slippage_impact_usd: Decimal::ZERO,
            total_costs_usd: Decimal::ZERO,
            net_profit_usd: dec!(10),
            net_profit_pct: dec!(1),
            prohibitive: ProhibitiveFlags { gas: false, bridge: false, slippage: false },
            min_profit_threshold_pct: dec!(0.5),
            is_profitable: true,
        })
    }

    #[test]
    fn every_subscriber_receives_each_verdict() {
        let bus = OpportunityBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let outcome = bus.publish(scored("WETH", "ethereum", "arbitrum", 1));
        assert_eq!(outcome, PublishOutcome::Delivered { receivers: 2 });
        assert!(a.try_next().is_some());
        assert!(b.try_next().is_some());
    }

    #[test]
    fn resubscribing_does_not_replay() {
        let bus = OpportunityBus::new(16);
        let mut first = bus.subscribe();
        bus.publish(scored("WETH", "ethereum", "arbitrum", 1));
        assert!(first.try_next().is_some());
        drop(first);

        let mut again = bus.subscribe();
        assert!(again.try_next().is_none());
        bus.publish(scored("WETH", "ethereum", "arbitrum", 2));
        assert_eq!(again.try_next().unwrap().verdict.candidate.detection_seq, 2);
        assert!(again.try_next().is_none());
    }

    #[test]
    fn older_detection_pass_is_superseded() {
        let bus = OpportunityBus::new(16);
        let mut sub = bus.subscribe();
        bus.publish(scored("WETH", "ethereum", "arbitrum", 5));
        assert_eq!(bus.publish(scored("WETH", "ethereum", "arbitrum", 4)), PublishOutcome::Superseded);
        // other pairs are unaffected
        assert!(matches!(
            bus.publish(scored("WETH", "base", "arbitrum", 1)),
            PublishOutcome::Delivered { .. }
        ));

        let seqs: Vec<u64> = std::iter::from_fn(|| sub.try_next())
            .map(|o| o.verdict.candidate.detection_seq)
            .collect();
        assert_eq!(seqs, vec![5, 1]);
    }

    #[test]
    fn lookup_tracks_only_the_latest_verdict() {
        let bus = OpportunityBus::new(16);
        let first = scored("WETH", "ethereum", "arbitrum", 1);
        let first_id = first.id;
        bus.publish(first);
        assert!(bus.lookup(&first_id).is_some());

        let second = scored("WETH", "ethereum", "arbitrum", 2);
        let second_id = second.id;
        bus.publish(second);
        assert!(bus.lookup(&first_id).is_none());
        assert_eq!(bus.lookup(&second_id).unwrap().id, second_id);
    }

    #[test]
    fn current_opportunities_filters_by_asset() {
        let bus = OpportunityBus::new(16);
        bus.publish(scored("WETH", "ethereum", "arbitrum", 1));
        bus.publish(scored("WETH", "base", "arbitrum", 2));
        bus.publish(scored("USDC", "ethereum", "base", 3));

        assert_eq!(bus.current_opportunities(None).len(), 3);
        assert_eq!(bus.current_opportunities(Some("weth")).len(), 2);
        assert_eq!(bus.current_opportunities(Some("DAI")).len(), 0);
    }

    #[test]
    fn slow_subscriber_drops_oldest_without_blocking_producer() {
        let bus = OpportunityBus::new(2);
        let mut slow = bus.subscribe();
        for seq in 1..=5 {
            bus.publish(scored("WETH", "ethereum", "arbitrum", seq));
        }
        let received: Vec<u64> = std::iter::from_fn(|| slow.try_next())
            .map(|o| o.verdict.candidate.detection_seq)
            .collect();
        assert_eq!(received, vec![4, 5]);
        assert_eq!(slow.skipped(), 3);
    }

    #[tokio::test]
    async fn subscription_ends_when_bus_is_dropped() {
        let bus = OpportunityBus::new(4);
        let mut sub = bus.subscribe_executions();
        drop(bus);
        assert!(sub.next().await.is_none());
    }
}
