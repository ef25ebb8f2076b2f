//! Engine configuration settings and environment variable handling

use alloy::primitives::Address;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use crate::{
    errors::{EngineError, EngineResult},
    types::{Asset, NetworkConfig, NetworkId, SigningIdentity},
};

// Configuration constants
pub const MIN_TRADE_SIZE_USD: Decimal = dec!(1);
pub const MAX_TRADE_SIZE_USD: Decimal = dec!(10_000_000);
pub const MAX_BACKOFF_MULTIPLIER_LIMIT: u32 = 64;

pub const DEFAULT_TRADE_SIZE_USD: Decimal = dec!(10000);
pub const DEFAULT_MIN_PROFIT_THRESHOLD_PCT: Decimal = dec!(0.5);
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_ASSET_DECIMALS: u8 = 18;
pub const DEFAULT_STALENESS_MULTIPLIER: u32 = 3;
pub const DEFAULT_STALENESS_FLOOR_SECS: u64 = 120;
pub const DEFAULT_VERDICT_TTL_SECS: u64 = 120;
pub const DEFAULT_LEASE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_MAX_BACKOFF_MULTIPLIER: u32 = 8;
pub const DEFAULT_DEGRADED_AFTER_FAILURES: u32 = 3;
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

// Prohibitive cost ratios, as a share of gross profit
pub const DEFAULT_GAS_PROHIBITIVE_RATIO: Decimal = dec!(0.5);
pub const DEFAULT_BRIDGE_PROHIBITIVE_RATIO: Decimal = dec!(0.3);
pub const DEFAULT_SLIPPAGE_PROHIBITIVE_RATIO: Decimal = dec!(0.2);

// Fixed cost estimator defaults
pub const DEFAULT_GAS_COST_USD: Decimal = dec!(5);
pub const DEFAULT_BRIDGE_COST_USD: Decimal = dec!(10);
pub const DEFAULT_BRIDGE_FEE_BPS: u32 = 5;
pub const DEFAULT_SLIPPAGE_PCT: Decimal = dec!(0.3);

/// How old a snapshot may get before detection ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub interval_multiplier: u32,
    pub floor: Duration,
}

impl StalenessPolicy {
    /// `max(multiplier × interval, floor)`
    pub fn bound_for(&self, poll_interval: Duration) -> Duration {
        poll_interval
            .saturating_mul(self.interval_multiplier)
            .max(self.floor)
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            interval_multiplier: DEFAULT_STALENESS_MULTIPLIER,
            floor: Duration::from_secs(DEFAULT_STALENESS_FLOOR_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub max_backoff_multiplier: u32,
    pub degraded_after_failures: u32,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_backoff_multiplier: DEFAULT_MAX_BACKOFF_MULTIPLIER,
            degraded_after_failures: DEFAULT_DEGRADED_AFTER_FAILURES,
        }
    }
}

/// Share of gross profit above which a cost component is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProhibitiveRatios {
    pub gas: Decimal,
    pub bridge: Decimal,
    pub slippage: Decimal,
}

impl Default for ProhibitiveRatios {
    fn default() -> Self {
        Self {
            gas: DEFAULT_GAS_PROHIBITIVE_RATIO,
            bridge: DEFAULT_BRIDGE_PROHIBITIVE_RATIO,
            slippage: DEFAULT_SLIPPAGE_PROHIBITIVE_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedCostSettings {
    pub gas_cost_usd: HashMap<NetworkId, Decimal>,
    pub default_gas_cost_usd: Decimal,
    pub bridge_cost_usd: Decimal,
    pub bridge_fee_bps: u32,
    pub slippage_pct: Decimal,
}

impl Default for FixedCostSettings {
    fn default() -> Self {
        Self {
            gas_cost_usd: HashMap::new(),
            default_gas_cost_usd: DEFAULT_GAS_COST_USD,
            bridge_cost_usd: DEFAULT_BRIDGE_COST_USD,
            bridge_fee_bps: DEFAULT_BRIDGE_FEE_BPS,
            slippage_pct: DEFAULT_SLIPPAGE_PCT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub networks: Vec<NetworkConfig>,
    /// Network sections that failed validation, with the reason.
    pub rejected_networks: Vec<(String, String)>,
    pub assets: Vec<Asset>,
    pub trade_size_usd: Decimal,
    pub min_profit_threshold_pct: Decimal,
    pub staleness: StalenessPolicy,
    pub verdict_ttl: Duration,
    pub lease_timeout: Duration,
    pub probe_interval: Duration,
    pub poller: PollerSettings,
    pub prohibitive: ProhibitiveRatios,
    pub bus_capacity: usize,
    // Collaborator settings
    pub price_api_url: Option<String>,
    pub costs: FixedCostSettings,
    pub enable_auto_execution: bool,
    pub simulated_success_rate: f64,
    pub record_dir: Option<PathBuf>,
    pub log_dir: String,
}

impl Config {
    /// Defaults for everything except the network and asset registries.
    pub fn with_registries(networks: Vec<NetworkConfig>, assets: Vec<Asset>) -> Self {
        Self {
            networks,
            rejected_networks: Vec::new(),
            assets,
            trade_size_usd: DEFAULT_TRADE_SIZE_USD,
            min_profit_threshold_pct: DEFAULT_MIN_PROFIT_THRESHOLD_PCT,
            staleness: StalenessPolicy::default(),
            verdict_ttl: Duration::from_secs(DEFAULT_VERDICT_TTL_SECS),
            lease_timeout: Duration::from_secs(DEFAULT_LEASE_TIMEOUT_SECS),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            poller: PollerSettings::default(),
            prohibitive: ProhibitiveRatios::default(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
            price_api_url: None,
            costs: FixedCostSettings::default(),
            enable_auto_execution: false,
            simulated_success_rate: 0.9,
            record_dir: None,
            log_dir: "output/logs".to_string(),
        }
    }

    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network_ids = list(&lookup, "NETWORKS");
        if network_ids.is_empty() {
            return Err(EngineError::config(None, "NETWORKS must list at least one network"));
        }

        let mut networks = Vec::new();
        let mut rejected_networks = Vec::new();
        let mut gas_cost_usd = HashMap::new();
        for raw in &network_ids {
            match load_network(&lookup, raw) {
                Ok((network, gas)) => {
                    if let Some(gas) = gas {
                        gas_cost_usd.insert(network.id.clone(), gas);
                    }
                    networks.push(network);
                }
                Err(e) => {
                    warn!(network = %raw, "⚠️ Rejecting network configuration: {}", e);
                    rejected_networks.push((raw.clone(), e.to_string()));
                }
            }
        }

        let asset_symbols = list(&lookup, "ASSETS");
        if asset_symbols.is_empty() {
            return Err(EngineError::config(None, "ASSETS must list at least one asset"));
        }
        let assets = asset_symbols
            .iter()
            .map(|symbol| load_asset(&lookup, symbol, &networks))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut config = Self::with_registries(networks, assets);
        config.rejected_networks = rejected_networks;

        config.trade_size_usd = parse_var(&lookup, "TRADE_SIZE_USD", DEFAULT_TRADE_SIZE_USD)?;
        config.min_profit_threshold_pct =
            parse_var(&lookup, "MIN_PROFIT_THRESHOLD_PCT", DEFAULT_MIN_PROFIT_THRESHOLD_PCT)?;
        config.staleness = StalenessPolicy {
            interval_multiplier: parse_var(&lookup, "STALENESS_MULTIPLIER", DEFAULT_STALENESS_MULTIPLIER)?,
            floor: secs(&lookup, "STALENESS_FLOOR_SECS", DEFAULT_STALENESS_FLOOR_SECS)?,
        };
        config.verdict_ttl = secs(&lookup, "VERDICT_TTL_SECS", DEFAULT_VERDICT_TTL_SECS)?;
        config.lease_timeout = secs(&lookup, "LEASE_TIMEOUT_SECS", DEFAULT_LEASE_TIMEOUT_SECS)?;
        config.probe_interval = secs(&lookup, "PROBE_INTERVAL_SECS", DEFAULT_PROBE_INTERVAL_SECS)?;
        config.poller = PollerSettings {
            max_backoff_multiplier: parse_var(&lookup, "MAX_BACKOFF_MULTIPLIER", DEFAULT_MAX_BACKOFF_MULTIPLIER)?,
            degraded_after_failures: parse_var(&lookup, "DEGRADED_AFTER_FAILURES", DEFAULT_DEGRADED_AFTER_FAILURES)?,
        };
        config.prohibitive = ProhibitiveRatios {
            gas: parse_var(&lookup, "GAS_PROHIBITIVE_RATIO", DEFAULT_GAS_PROHIBITIVE_RATIO)?,
            bridge: parse_var(&lookup, "BRIDGE_PROHIBITIVE_RATIO", DEFAULT_BRIDGE_PROHIBITIVE_RATIO)?,
            slippage: parse_var(&lookup, "SLIPPAGE_PROHIBITIVE_RATIO", DEFAULT_SLIPPAGE_PROHIBITIVE_RATIO)?,
        };
        config.bus_capacity = parse_var(&lookup, "BUS_CAPACITY", DEFAULT_BUS_CAPACITY)?;
        config.price_api_url = lookup("PRICE_API_URL").filter(|s| !s.trim().is_empty());
        config.costs = FixedCostSettings {
            gas_cost_usd,
            default_gas_cost_usd: parse_var(&lookup, "DEFAULT_GAS_COST_USD", DEFAULT_GAS_COST_USD)?,
            bridge_cost_usd: parse_var(&lookup, "BRIDGE_COST_USD", DEFAULT_BRIDGE_COST_USD)?,
            bridge_fee_bps: parse_var(&lookup, "BRIDGE_FEE_BPS", DEFAULT_BRIDGE_FEE_BPS)?,
            slippage_pct: parse_var(&lookup, "SLIPPAGE_PCT", DEFAULT_SLIPPAGE_PCT)?,
        };
        config.enable_auto_execution = parse_var(&lookup, "ENABLE_AUTO_EXECUTION", false)?;
        config.simulated_success_rate = parse_var(&lookup, "SIMULATED_SUCCESS_RATE", 0.9)?;
        config.record_dir = lookup("RECORD_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        if let Some(dir) = lookup("LOG_DIR").filter(|s| !s.trim().is_empty()) {
            config.log_dir = dir;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.trade_size_usd < MIN_TRADE_SIZE_USD || self.trade_size_usd > MAX_TRADE_SIZE_USD {
            return Err(EngineError::config(
                None,
                format!("Trade size out of bounds: ${}", self.trade_size_usd),
            ));
        }
        if self.min_profit_threshold_pct.is_sign_negative() {
            return Err(EngineError::config(None, "MIN_PROFIT_THRESHOLD_PCT must not be negative"));
        }
        if self.staleness.interval_multiplier == 0 {
            return Err(EngineError::config(None, "STALENESS_MULTIPLIER must be at least 1"));
        }
        if self.poller.max_backoff_multiplier == 0
            || self.poller.max_backoff_multiplier > MAX_BACKOFF_MULTIPLIER_LIMIT
        {
            return Err(EngineError::config(
                None,
                format!(
                    "MAX_BACKOFF_MULTIPLIER must be within 1..={}",
                    MAX_BACKOFF_MULTIPLIER_LIMIT
                ),
            ));
        }
        if self.poller.degraded_after_failures == 0 {
            return Err(EngineError::config(None, "DEGRADED_AFTER_FAILURES must be at least 1"));
        }
        for (name, ratio) in [
            ("GAS_PROHIBITIVE_RATIO", self.prohibitive.gas),
            ("BRIDGE_PROHIBITIVE_RATIO", self.prohibitive.bridge),
            ("SLIPPAGE_PROHIBITIVE_RATIO", self.prohibitive.slippage),
        ] {
            if ratio.is_sign_negative() {
                return Err(EngineError::config(None, format!("{} must not be negative", name)));
            }
        }
        if let Some(asset) = self.assets.iter().find(|a| a.poll_interval.is_zero()) {
            return Err(EngineError::config(
                None,
                format!("{} poll interval must be non-zero", asset.symbol),
            ));
        }
        if self.bus_capacity == 0 {
            return Err(EngineError::config(None, "BUS_CAPACITY must be at least 1"));
        }
        if self.lease_timeout.is_zero() || self.probe_interval.is_zero() {
            return Err(EngineError::config(None, "Lease timeout and probe interval must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.simulated_success_rate) {
            return Err(EngineError::config(None, "SIMULATED_SUCCESS_RATE must be within 0..=1"));
        }
        Ok(())
    }

    pub fn network(&self, id: &NetworkId) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| &n.id == id)
    }

    pub fn asset(&self, symbol: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.symbol == symbol)
    }
}

fn env_key(raw: &str) -> String {
    raw.trim().to_uppercase().replace('-', "_")
}

fn list<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Vec<String> {
    lookup(key)
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> EngineResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::config(None, format!("{} has an invalid value: {:?}", key, raw))),
        _ => Ok(default),
    }
}

fn secs<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u64) -> EngineResult<Duration> {
    parse_var(lookup, key, default).map(Duration::from_secs)
}

fn load_network<F>(lookup: &F, raw: &str) -> EngineResult<(NetworkConfig, Option<Decimal>)>
where
    F: Fn(&str) -> Option<String>,
{
    let id = NetworkId::new(raw.trim());
    let prefix = format!("NETWORK_{}", env_key(raw));

    let rpc_url = lookup(&format!("{}_RPC_URL", prefix))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EngineError::config(Some(&id), format!("{}_RPC_URL is required", prefix)))?;
    if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
        return Err(EngineError::config(Some(&id), format!("RPC URL must be http(s): {}", rpc_url)));
    }

    let chain_id = lookup(&format!("{}_CHAIN_ID", prefix))
        .ok_or_else(|| EngineError::config(Some(&id), format!("{}_CHAIN_ID is required", prefix)))?
        .trim()
        .parse::<u64>()
        .map_err(|_| EngineError::config(Some(&id), "chain id must be an unsigned integer"))?;

    let signer = match lookup(&format!("{}_SIGNER", prefix)).filter(|s| !s.trim().is_empty()) {
        Some(raw) => {
            let address = Address::from_str(raw.trim())
                .map_err(|_| EngineError::config(Some(&id), format!("invalid signer address: {}", raw)))?;
            Some(SigningIdentity::new(address.to_string()))
        }
        None => None,
    };

    let gas = match lookup(&format!("{}_GAS_COST_USD", prefix)) {
        Some(raw) => Some(
            Decimal::from_str(raw.trim())
                .ok()
                .filter(|g| !g.is_sign_negative())
                .ok_or_else(|| EngineError::config(Some(&id), format!("invalid gas cost: {}", raw)))?,
        ),
        None => None,
    };

    Ok((NetworkConfig { id, rpc_url, chain_id, signer }, gas))
}

fn load_asset<F>(lookup: &F, raw: &str, networks: &[NetworkConfig]) -> EngineResult<Asset>
where
    F: Fn(&str) -> Option<String>,
{
    let symbol = raw.trim().to_uppercase();
    let prefix = format!("ASSET_{}", env_key(raw));

    let decimals = parse_var(lookup, &format!("{}_DECIMALS", prefix), DEFAULT_ASSET_DECIMALS)?;
    let interval_secs = parse_var(lookup, &format!("{}_POLL_INTERVAL_SECS", prefix), DEFAULT_POLL_INTERVAL_SECS)?;

    let mut addresses = BTreeMap::new();
    for network in networks {
        let key = format!("{}_ADDRESS_{}", prefix, env_key(network.id.as_str()));
        if let Some(raw) = lookup(&key).filter(|s| !s.trim().is_empty()) {
            let address = Address::from_str(raw.trim())
                .map_err(|_| EngineError::config(Some(&network.id), format!("{} has an invalid address: {}", key, raw)))?;
            addresses.insert(network.id.clone(), address);
        }
    }

    Ok(Asset {
        symbol,
        decimals,
        poll_interval: Duration::from_secs(interval_secs),
        addresses,
    })
}
