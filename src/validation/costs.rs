//! Validation of untrusted evaluation inputs

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use crate::{
    errors::{EngineError, EngineResult},
    types::{CostEstimate, OpportunityCandidate},
};

pub fn validate_cost_estimate(costs: &CostEstimate) -> EngineResult<()> {
    for (name, value) in [
        ("gas cost", costs.gas_cost_usd),
        ("bridge cost", costs.bridge_cost_usd),
        ("slippage", costs.slippage_pct),
    ] {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(EngineError::invalid_input(format!("{} is negative: {}", name, value)));
        }
    }
    Ok(())
}

pub fn validate_trade_size(trade_size_usd: Decimal) -> EngineResult<()> {
    if trade_size_usd <= Decimal::ZERO {
        return Err(EngineError::invalid_input(format!(
            "trade size must be positive: {}",
            trade_size_usd
        )));
    }
    Ok(())
}

pub fn validate_candidate_prices(candidate: &OpportunityCandidate) -> EngineResult<()> {
    if candidate.source_price <= Decimal::ZERO || candidate.target_price <= Decimal::ZERO {
        return Err(EngineError::invalid_input(format!(
            "non-positive price in candidate {}: source {} target {}",
            candidate.key(),
            candidate.source_price,
            candidate.target_price
        )));
    }
    Ok(())
}

/// Fails with `StaleData` once either price behind the candidate is past its
/// staleness bound. The reported age is measured from detection.
pub fn validate_candidate_freshness(candidate: &OpportunityCandidate, now: DateTime<Utc>) -> EngineResult<()> {
    if candidate.is_fresh(now) {
        return Ok(());
    }
    Err(EngineError::StaleData {
        asset: candidate.asset.clone(),
        network: candidate.source_network.clone(),
        age: (now - candidate.discovered_at).to_std().unwrap_or_default(),
    })
}
