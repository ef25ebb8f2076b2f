use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use xnet_arb_engine::arbitrage::CostEstimator;
use xnet_arb_engine::errors::{EngineError, FetchError, SubmitError};
use xnet_arb_engine::execution::ExecutionDelegate;
use xnet_arb_engine::network::{NetworkProbe, PriceSource};
use xnet_arb_engine::types::*;
use xnet_arb_engine::{ArbitrageEngine, Collaborators, Config};

const SIGNER: &str = "0x00000000000000000000000000000000000000A1";

struct AlwaysUp;

#[async_trait]
impl NetworkProbe for AlwaysUp {
    async fn probe(&self, _: &NetworkConfig) -> bool {
        true
    }
}

/// Fixed quote per network; unknown networks are unreachable.
struct StaticPrices(HashMap<String, Decimal>);

#[async_trait]
impl PriceSource for StaticPrices {
    async fn fetch_price(&self, network: &NetworkConfig, _: &Asset) -> Result<Decimal, FetchError> {
        self.0
            .get(network.id.as_str())
            .copied()
            .ok_or_else(|| FetchError::Unreachable("no quote".into()))
    }
}

/// 25 USD gas per swap, 20 USD bridge, 0.5% slippage.
#[derive(Default)]
struct CountingCosts {
    gas_calls: AtomicUsize,
}

#[async_trait]
impl CostEstimator for CountingCosts {
    async fn estimate_gas(&self, _: &NetworkId, _: TxShape) -> Result<Decimal> {
        self.gas_calls.fetch_add(1, Ordering::SeqCst);
        Ok(dec!(25))
    }

    async fn estimate_bridge_cost(&self, _: &NetworkId, _: &NetworkId, _: Decimal) -> Result<Decimal> {
        Ok(dec!(20))
    }

    async fn estimate_slippage(&self, _: &str, _: Decimal, _: &NetworkId) -> Result<Decimal> {
        Ok(dec!(0.5))
    }
}

/// Holds every submission until released.
#[derive(Default)]
struct GatedExecutor {
    release: Notify,
}

#[async_trait]
impl ExecutionDelegate for GatedExecutor {
    async fn submit(&self, _: &ScoredOpportunity, _: &SigningIdentity) -> Result<ExecutionReceipt, SubmitError> {
        self.release.notified().await;
        Ok(ExecutionReceipt {
            tx_hashes: vec!["0xabc".into()],
            realized_profit_usd: Some(dec!(75)),
        })
    }
}

fn network(id: &str, chain_id: u64) -> NetworkConfig {
    NetworkConfig {
        id: NetworkId::new(id),
        rpc_url: format!("http://{}.local", id),
        chain_id,
        signer: Some(SigningIdentity::new(SIGNER)),
    }
}

fn weth() -> Asset {
    Asset {
        symbol: "WETH".into(),
        decimals: 18,
        poll_interval: Duration::from_secs(30),
        addresses: BTreeMap::new(),
    }
}

struct Harness {
    engine: Arc<ArbitrageEngine>,
    costs: Arc<CountingCosts>,
    executor: Arc<GatedExecutor>,
}

async fn harness() -> Harness {
    let costs = Arc::new(CountingCosts::default());
    let executor = Arc::new(GatedExecutor::default());
    let config = Config::with_registries(vec![network("ethereum", 1), network("base", 8453)], vec![weth()]);
    let engine = ArbitrageEngine::new(
        config.clone(),
        Collaborators {
            probe: Arc::new(AlwaysUp),
            prices: Arc::new(StaticPrices(HashMap::new())),
            costs: costs.clone(),
            executor: executor.clone(),
        },
    )
    .unwrap();
    for network in config.networks {
        engine.registry().register(network).await.unwrap();
    }
    Harness { engine, costs, executor }
}

fn snapshot(network: &str, price: Decimal, sequence: u64, age_secs: i64) -> PriceSnapshot {
    PriceSnapshot {
        network: NetworkId::new(network),
        asset: "WETH".into(),
        price,
        observed_at: Utc::now() - ChronoDuration::seconds(age_secs),
        sequence,
    }
}

fn identity() -> SigningIdentity {
    SigningIdentity::new(SIGNER)
}

async fn publish_divergence(h: &Harness) -> Arc<ScoredOpportunity> {
    h.engine.process_snapshot(snapshot("ethereum", dec!(100), 1, 0)).await;
    let published = h.engine.process_snapshot(snapshot("base", dec!(102), 1, 0)).await;
    assert_eq!(published.len(), 1);
    published[0].clone()
}

#[tokio::test]
async fn divergence_is_scored_and_published() {
    let h = harness().await;
    let mut sub = h.engine.subscribe();

    let opportunity = publish_divergence(&h).await;
    let verdict = &opportunity.verdict;
    assert_eq!(verdict.candidate.source_network, NetworkId::new("ethereum"));
    assert_eq!(verdict.candidate.target_network, NetworkId::new("base"));
    assert_eq!(verdict.gross_profit_usd, dec!(200));
    assert_eq!(verdict.gas_cost_usd, dec!(50));
    assert_eq!(verdict.total_costs_usd, dec!(120));
    assert_eq!(verdict.net_profit_usd, dec!(80));
    assert!(verdict.is_profitable);
    assert!(verdict.prohibitive.slippage);
    assert!(!verdict.prohibitive.gas && !verdict.prohibitive.bridge);

    let received = sub.try_next().unwrap();
    assert_eq!(received.id, opportunity.id);
    assert_eq!(h.engine.current_opportunities(Some("WETH")).len(), 1);

    let stats = h.engine.stats();
    assert_eq!(stats.snapshots_applied, 2);
    assert_eq!(stats.verdicts_published, 1);
    assert_eq!(stats.profitable_verdicts, 1);
}

#[tokio::test]
async fn stale_snapshots_never_reach_the_evaluator() {
    let h = harness().await;
    let mut sub = h.engine.subscribe();

    // Staleness bound for a 30s asset is max(3 × 30s, 120s) = 120s.
    h.engine.process_snapshot(snapshot("ethereum", dec!(100), 1, 600)).await;
    let published = h.engine.process_snapshot(snapshot("base", dec!(110), 1, 0)).await;

    assert!(published.is_empty());
    assert!(sub.try_next().is_none());
    assert_eq!(h.costs.gas_calls.load(Ordering::SeqCst), 0);
    assert!(h.engine.stats().stale_candidates_dropped >= 1);
}

#[tokio::test]
async fn out_of_order_snapshot_is_ignored() {
    let h = harness().await;
    h.engine.process_snapshot(snapshot("ethereum", dec!(100), 5, 0)).await;
    h.engine.process_snapshot(snapshot("ethereum", dec!(90), 4, 0)).await;
    let published = h.engine.process_snapshot(snapshot("base", dec!(102), 1, 0)).await;

    assert_eq!(published.len(), 1);
    assert_eq!(published[0].verdict.candidate.source_price, dec!(100));
    assert_eq!(h.engine.stats().snapshots_out_of_order, 1);
}

#[tokio::test]
async fn second_request_on_held_lease_is_busy() {
    let h = harness().await;
    let mut reports = h.engine.subscribe_executions();
    let opportunity = publish_divergence(&h).await;

    let first = h.engine.request_execution(opportunity.id, identity()).await.unwrap();
    let ExecutionTicket::Accepted(lease_id) = first else {
        panic!("expected Accepted, got {:?}", first);
    };
    let second = h.engine.request_execution(opportunity.id, identity()).await.unwrap();
    assert_eq!(second, ExecutionTicket::Busy);
    // one execution holding both networks
    assert_eq!(h.engine.health().await.in_flight_executions, 1);

    h.executor.release.notify_one();
    let report = tokio::time::timeout(Duration::from_secs(5), reports.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.lease_id, lease_id);
    assert!(matches!(report.outcome, ExecutionOutcome::Settled(_)));
    assert_eq!(report.networks.len(), 2);

    // Released: the same verdict can be executed again.
    let third = h.engine.request_execution(opportunity.id, identity()).await.unwrap();
    assert!(matches!(third, ExecutionTicket::Accepted(_)));
    let stats = h.engine.stats();
    assert_eq!(stats.executions_busy, 1);
    assert_eq!(stats.executions_settled, 1);
}

#[tokio::test]
async fn unknown_and_superseded_verdicts_are_not_found() {
    let h = harness().await;
    assert_eq!(
        h.engine.request_execution(VerdictId::new(), identity()).await.unwrap(),
        ExecutionTicket::NotFound
    );

    let first = publish_divergence(&h).await;
    h.engine.process_snapshot(snapshot("base", dec!(103), 2, 0)).await;
    assert_eq!(
        h.engine.request_execution(first.id, identity()).await.unwrap(),
        ExecutionTicket::NotFound
    );
}

#[tokio::test]
async fn identity_must_be_bound_and_networks_up() {
    let h = harness().await;
    let opportunity = publish_divergence(&h).await;

    let stranger = SigningIdentity::new("0x00000000000000000000000000000000000000B2");
    assert!(matches!(
        h.engine.request_execution(opportunity.id, stranger).await,
        Err(EngineError::NotFound { .. })
    ));

    let base = NetworkId::new("base");
    for _ in 0..3 {
        h.engine.registry().record_probe(&base, false).await.unwrap();
    }
    assert!(matches!(
        h.engine.request_execution(opportunity.id, identity()).await,
        Err(EngineError::NetworkDown { .. })
    ));
}

#[tokio::test]
async fn candidates_on_down_networks_are_skipped() {
    let h = harness().await;
    let base = NetworkId::new("base");
    for _ in 0..3 {
        h.engine.registry().record_probe(&base, false).await.unwrap();
    }

    h.engine.process_snapshot(snapshot("ethereum", dec!(100), 1, 0)).await;
    let published = h.engine.process_snapshot(snapshot("base", dec!(102), 1, 0)).await;
    assert!(published.is_empty());
    assert_eq!(h.costs.gas_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.engine.stats().down_network_skips, 1);
}

#[tokio::test]
async fn resubscribing_never_replays() {
    let h = harness().await;
    let sub = h.engine.subscribe();
    publish_divergence(&h).await;
    drop(sub);

    let mut again = h.engine.subscribe();
    assert!(again.try_next().is_none());
    // Still queryable, just not replayed.
    assert_eq!(h.engine.current_opportunities(None).len(), 1);
}

#[tokio::test]
async fn shutdown_refuses_new_executions() {
    let h = harness().await;
    let opportunity = publish_divergence(&h).await;

    h.engine.shutdown().await;
    assert!(h.engine.is_shutting_down());
    assert!(matches!(
        h.engine.request_execution(opportunity.id, identity()).await,
        Err(EngineError::ShuttingDown)
    ));
}

#[tokio::test]
async fn started_engine_polls_and_publishes() {
    let prices = StaticPrices(HashMap::from([
        ("ethereum".to_string(), dec!(100)),
        ("base".to_string(), dec!(102)),
    ]));
    let engine = ArbitrageEngine::new(
        Config::with_registries(vec![network("ethereum", 1), network("base", 8453)], vec![weth()]),
        Collaborators {
            probe: Arc::new(AlwaysUp),
            prices: Arc::new(prices),
            costs: Arc::new(CountingCosts::default()),
            executor: Arc::new(GatedExecutor::default()),
        },
    )
    .unwrap();
    let mut sub = engine.subscribe();

    let networks = engine.start().await.unwrap();
    assert_eq!(networks.len(), 2);

    let verdict = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verdict.key().asset, "WETH");
    assert_eq!(verdict.verdict.net_profit_usd, dec!(80));

    let health = engine.health().await;
    assert_eq!(health.networks_up(), 2);
    assert_eq!(health.open_opportunities, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn engine_without_reachable_networks_fails_to_start() {
    struct AlwaysDown;

    #[async_trait]
    impl NetworkProbe for AlwaysDown {
        async fn probe(&self, _: &NetworkConfig) -> bool {
            false
        }
    }

    let engine = ArbitrageEngine::new(
        Config::with_registries(vec![network("ethereum", 1)], vec![weth()]),
        Collaborators {
            probe: Arc::new(AlwaysDown),
            prices: Arc::new(StaticPrices(HashMap::new())),
            costs: Arc::new(CountingCosts::default()),
            executor: Arc::new(GatedExecutor::default()),
        },
    )
    .unwrap();
    assert!(matches!(engine.start().await, Err(EngineError::Config { .. })));
}

/// Answers the registration checks, then never returns.
struct StallsAfter {
    answered: AtomicUsize,
    limit: usize,
}

#[async_trait]
impl NetworkProbe for StallsAfter {
    async fn probe(&self, _: &NetworkConfig) -> bool {
        if self.answered.fetch_add(1, Ordering::SeqCst) < self.limit {
            return true;
        }
        std::future::pending::<()>().await;
        false
    }
}

struct NeverQuotes;

#[async_trait]
impl PriceSource for NeverQuotes {
    async fn fetch_price(&self, _: &NetworkConfig, _: &Asset) -> Result<Decimal, FetchError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(FetchError::Unreachable("timed out".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_prompt_with_hung_collaborators() {
    let engine = ArbitrageEngine::new(
        Config::with_registries(vec![network("ethereum", 1), network("base", 8453)], vec![weth()]),
        Collaborators {
            probe: Arc::new(StallsAfter { answered: AtomicUsize::new(0), limit: 2 }),
            prices: Arc::new(NeverQuotes),
            costs: Arc::new(CountingCosts::default()),
            executor: Arc::new(GatedExecutor::default()),
        },
    )
    .unwrap();
    engine.start().await.unwrap();

    // Past the first health check cycle: both fetches and the checks are stuck.
    tokio::time::sleep(Duration::from_secs(20)).await;

    let began = tokio::time::Instant::now();
    engine.shutdown().await;
    assert!(began.elapsed() < Duration::from_secs(1), "shutdown took {:?}", began.elapsed());
}

/// Blocks in bridge estimation until released.
#[derive(Default)]
struct GatedCosts {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl CostEstimator for GatedCosts {
    async fn estimate_gas(&self, _: &NetworkId, _: TxShape) -> Result<Decimal> {
        Ok(dec!(25))
    }

    async fn estimate_bridge_cost(&self, _: &NetworkId, _: &NetworkId, _: Decimal) -> Result<Decimal> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(dec!(20))
    }

    async fn estimate_slippage(&self, _: &str, _: Decimal, _: &NetworkId) -> Result<Decimal> {
        Ok(dec!(0.5))
    }
}

#[tokio::test]
async fn evaluation_in_progress_does_not_publish_after_shutdown() {
    let costs = Arc::new(GatedCosts::default());
    let config = Config::with_registries(vec![network("ethereum", 1), network("base", 8453)], vec![weth()]);
    let engine = ArbitrageEngine::new(
        config.clone(),
        Collaborators {
            probe: Arc::new(AlwaysUp),
            prices: Arc::new(StaticPrices(HashMap::new())),
            costs: costs.clone(),
            executor: Arc::new(GatedExecutor::default()),
        },
    )
    .unwrap();
    for network in config.networks {
        engine.registry().register(network).await.unwrap();
    }
    let mut sub = engine.subscribe();

    engine.process_snapshot(snapshot("ethereum", dec!(100), 1, 0)).await;
    let pending = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.process_snapshot(snapshot("base", dec!(102), 1, 0)).await })
    };
    costs.entered.notified().await;

    engine.shutdown().await;
    costs.release.notify_one();

    let published = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap();
    assert!(published.is_empty());
    assert!(sub.try_next().is_none());
    assert_eq!(engine.stats().verdicts_published, 0);
    assert!(engine.current_opportunities(None).is_empty());
}
