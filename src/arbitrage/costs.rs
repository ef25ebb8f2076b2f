//! Cost estimation collaborators

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use crate::{
    config::FixedCostSettings,
    types::{CostEstimate, NetworkId, OpportunityCandidate, TxShape},
};

/// Supplies execution cost inputs. Results are untrusted; the evaluator
/// validates them.
#[async_trait]
pub trait CostEstimator: Send + Sync {
    async fn estimate_gas(&self, network: &NetworkId, shape: TxShape) -> Result<Decimal>;

    async fn estimate_bridge_cost(
        &self,
        source: &NetworkId,
        target: &NetworkId,
        amount_usd: Decimal,
    ) -> Result<Decimal>;

    async fn estimate_slippage(&self, asset: &str, trade_size_usd: Decimal, venue: &NetworkId) -> Result<Decimal>;
}

/// Gathers the cost inputs for one candidate: a swap on each side, the bridge
/// hop between them and slippage at the selling venue.
pub async fn estimate_costs(
    estimator: &dyn CostEstimator,
    candidate: &OpportunityCandidate,
    trade_size_usd: Decimal,
) -> Result<CostEstimate> {
    let (source_gas, target_gas, bridge_cost_usd, slippage_pct) = tokio::try_join!(
        estimator.estimate_gas(&candidate.source_network, TxShape::Swap),
        estimator.estimate_gas(&candidate.target_network, TxShape::Swap),
        estimator.estimate_bridge_cost(&candidate.source_network, &candidate.target_network, trade_size_usd),
        estimator.estimate_slippage(&candidate.asset, trade_size_usd, &candidate.target_network),
    )?;

    let gas_cost_usd = source_gas
        .checked_add(target_gas)
        .ok_or_else(|| anyhow::anyhow!("gas estimate overflow: {} + {}", source_gas, target_gas))?;

    Ok(CostEstimate {
        gas_cost_usd,
        bridge_cost_usd,
        slippage_pct,
    })
}

/// Static cost table taken from configuration.
pub struct FixedCostEstimator {
    settings: FixedCostSettings,
}

impl FixedCostEstimator {
    pub fn new(settings: FixedCostSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl CostEstimator for FixedCostEstimator {
    async fn estimate_gas(&self, network: &NetworkId, _shape: TxShape) -> Result<Decimal> {
        Ok(self
            .settings
            .gas_cost_usd
            .get(network)
            .copied()
            .unwrap_or(self.settings.default_gas_cost_usd))
    }

    async fn estimate_bridge_cost(
        &self,
        _source: &NetworkId,
        _target: &NetworkId,
        amount_usd: Decimal,
    ) -> Result<Decimal> {
        let fee = amount_usd * Decimal::from(self.settings.bridge_fee_bps) / dec!(10000);
        Ok(self.settings.bridge_cost_usd + fee)
    }

    async fn estimate_slippage(&self, _asset: &str, _trade_size_usd: Decimal, _venue: &NetworkId) -> Result<Decimal> {
        Ok(self.settings.slippage_pct)
    }
}
