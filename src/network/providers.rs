//! Collaborator contracts for network connectivity and their RPC/HTTP implementations

use alloy::providers::{Provider, ProviderBuilder};
use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use crate::{
    errors::FetchError,
    types::{Asset, NetworkConfig, NetworkId},
    ConcreteProvider,
};

/// Lightweight liveness check for a network endpoint.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn probe(&self, network: &NetworkConfig) -> bool;
}

/// Current price of `asset` on `network`, in the quote currency.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, network: &NetworkConfig, asset: &Asset) -> Result<Decimal, FetchError>;
}

/// Probes an EVM JSON-RPC endpoint: healthy when it answers with the
/// configured chain id and a block number.
pub struct RpcProbe {
    providers: Mutex<HashMap<NetworkId, Arc<ConcreteProvider>>>,
    timeout: Duration,
}

impl RpcProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn provider_for(&self, network: &NetworkConfig) -> anyhow::Result<Arc<ConcreteProvider>> {
        let mut providers = self.providers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(provider) = providers.get(&network.id) {
            return Ok(provider.clone());
        }
        let provider: Arc<ConcreteProvider> = Arc::new(
            ProviderBuilder::new()
                .on_http(network.rpc_url.parse().context("Invalid RPC URL")?)
                .boxed(),
        );
        providers.insert(network.id.clone(), provider.clone());
        Ok(provider)
    }

    async fn check(&self, network: &NetworkConfig) -> anyhow::Result<u64> {
        let provider = self.provider_for(network)?;
        let chain_id = provider.get_chain_id().await.context("eth_chainId failed")?;
        if chain_id != network.chain_id {
            anyhow::bail!("chain id mismatch: expected {}, got {}", network.chain_id, chain_id);
        }
        provider.get_block_number().await.context("eth_blockNumber failed")
    }
}

#[async_trait]
impl NetworkProbe for RpcProbe {
    async fn probe(&self, network: &NetworkConfig) -> bool {
        match tokio::time::timeout(self.timeout, self.check(network)).await {
            Ok(Ok(block)) => {
                debug!(network = %network.id, block, "Probe ok");
                true
            }
            Ok(Err(e)) => {
                warn!(network = %network.id, "⚠️ Probe failed: {:#}", e);
                false
            }
            Err(_) => {
                warn!(network = %network.id, "⚠️ Probe timed out after {:?}", self.timeout);
                false
            }
        }
    }
}

/// Fetches prices from an HTTP JSON endpoint.
///
/// The URL template may contain `{network}`, `{asset}`, `{chain_id}` and
/// `{address}` placeholders. The response must carry a `price` field, either
/// as a string or a number.
pub struct HttpPriceSource {
    client: reqwest::Client,
    url_template: String,
}

impl HttpPriceSource {
    pub fn new(url_template: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn url_for(&self, network: &NetworkConfig, asset: &Asset) -> String {
        let address = asset
            .address_on(&network.id)
            .map(|a| a.to_string())
            .unwrap_or_default();
        self.url_template
            .replace("{network}", network.id.as_str())
            .replace("{asset}", &asset.symbol)
            .replace("{chain_id}", &network.chain_id.to_string())
            .replace("{address}", &address)
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_price(&self, network: &NetworkConfig, asset: &Asset) -> Result<Decimal, FetchError> {
        let response = self
            .client
            .get(self.url_for(network, asset))
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if status.is_server_error() {
            return Err(FetchError::Unreachable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::MalformedResponse(format!("HTTP {}: {}", status, body)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedResponse(format!("invalid JSON: {}", e)))?;

        parse_price_field(&json)
    }
}

fn parse_price_field(json: &serde_json::Value) -> Result<Decimal, FetchError> {
    let raw = match &json["price"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => {
            return Err(FetchError::MalformedResponse("missing 'price' field".to_string()));
        }
        other => {
            return Err(FetchError::MalformedResponse(format!("unexpected price value: {}", other)));
        }
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| FetchError::MalformedResponse(format!("unparseable price: {}", raw)))
}
