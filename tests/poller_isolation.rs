use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use xnet_arb_engine::config::PollerSettings;
use xnet_arb_engine::errors::FetchError;
use xnet_arb_engine::feed::{PollTarget, PricePoller};
use xnet_arb_engine::network::{NetworkProbe, NetworkRegistry, PriceSource};
use xnet_arb_engine::types::{Asset, HealthState, NetworkConfig, NetworkId};

struct AlwaysUp;

#[async_trait]
impl NetworkProbe for AlwaysUp {
    async fn probe(&self, _: &NetworkConfig) -> bool {
        true
    }
}

/// Quotes ethereum, refuses every request for base.
struct HalfBroken;

#[async_trait]
impl PriceSource for HalfBroken {
    async fn fetch_price(&self, network: &NetworkConfig, _: &Asset) -> Result<Decimal, FetchError> {
        if network.id.as_str() == "base" {
            Err(FetchError::Unreachable("connection refused".into()))
        } else {
            Ok(dec!(2000))
        }
    }
}

fn network(id: &str, chain_id: u64) -> NetworkConfig {
    NetworkConfig {
        id: NetworkId::new(id),
        rpc_url: format!("http://{}.local", id),
        chain_id,
        signer: None,
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

#[tokio::test(start_paused = true)]
async fn failing_pair_does_not_disturb_healthy_cadence() {
    let registry = Arc::new(NetworkRegistry::new(Arc::new(AlwaysUp)));
    registry.register(network("ethereum", 1)).await.unwrap();
    registry.register(network("base", 8453)).await.unwrap();

    let poller = Arc::new(PricePoller::new(Arc::new(HalfBroken), registry.clone(), PollerSettings::default()));
    let (tx, mut rx) = mpsc::channel(64);
    let (stop_tx, stop_rx) = watch::channel(false);
    let targets = vec![
        PollTarget { network: network("ethereum", 1), asset: weth() },
        PollTarget { network: network("base", 8453), asset: weth() },
    ];
    let handles = poller.spawn_all(targets, tx, stop_rx);

    // Polls at t = 0, 30, ..., 300.
    tokio::time::sleep(Duration::from_secs(315)).await;

    let mut sequences = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        assert_eq!(snapshot.network, NetworkId::new("ethereum"));
        sequences.push(snapshot.sequence);
    }
    assert_eq!(sequences, (1..=11).collect::<Vec<u64>>());

    assert_eq!(registry.health(&NetworkId::new("base")).await.unwrap(), HealthState::Degraded);
    assert_eq!(registry.health(&NetworkId::new("ethereum")).await.unwrap(), HealthState::Up);

    stop_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn full_channel_drops_without_stalling_the_loop() {
    let registry = Arc::new(NetworkRegistry::new(Arc::new(AlwaysUp)));
    registry.register(network("ethereum", 1)).await.unwrap();

    let poller = Arc::new(PricePoller::new(Arc::new(HalfBroken), registry, PollerSettings::default()));
    let (tx, mut rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = poller.spawn(PollTarget { network: network("ethereum", 1), asset: weth() }, tx, stop_rx);

    tokio::time::sleep(Duration::from_secs(95)).await;
    // Only the first fits; later polls were dropped rather than awaited.
    assert_eq!(rx.try_recv().unwrap().sequence, 1);
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(rx.try_recv().unwrap().sequence, 5);

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}
