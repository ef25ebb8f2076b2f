//! Profitability evaluation of detected candidates

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use crate::{
    config::ProhibitiveRatios,
    errors::{EngineError, EngineResult},
    types::{CostEstimate, OpportunityCandidate, ProfitabilityVerdict, ProhibitiveFlags},
    validation::{validate_candidate_prices, validate_cost_estimate, validate_trade_size},
};

const HUNDRED: Decimal = dec!(100);

/// Stateless: every call is a pure function of its arguments and the ratios
/// fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfitabilityEvaluator {
    ratios: ProhibitiveRatios,
}

impl ProfitabilityEvaluator {
    pub fn new(ratios: ProhibitiveRatios) -> Self {
        Self { ratios }
    }

    pub fn ratios(&self) -> ProhibitiveRatios {
        self.ratios
    }

    pub fn evaluate(
        &self,
        candidate: &OpportunityCandidate,
        trade_size_usd: Decimal,
        costs: &CostEstimate,
        min_profit_threshold_pct: Decimal,
    ) -> EngineResult<ProfitabilityVerdict> {
        validate_trade_size(trade_size_usd)?;
        validate_cost_estimate(costs)?;
        validate_candidate_prices(candidate)?;

        let price_diff_pct = checked(
            candidate
                .target_price
                .checked_sub(candidate.source_price)
                .and_then(|diff| diff.checked_div(candidate.source_price))
                .and_then(|ratio| ratio.checked_mul(HUNDRED)),
            "price difference",
        )?;
        let gross_profit_usd = checked(
            trade_size_usd
                .checked_mul(price_diff_pct)
                .and_then(|v| v.checked_div(HUNDRED)),
            "gross profit",
        )?;
        let slippage_impact_usd = checked(
            trade_size_usd
                .checked_mul(costs.slippage_pct)
                .and_then(|v| v.checked_div(HUNDRED)),
            "slippage impact",
        )?;
        let total_costs_usd = checked(
            costs
                .gas_cost_usd
                .checked_add(costs.bridge_cost_usd)
                .and_then(|v| v.checked_add(slippage_impact_usd)),
            "total costs",
        )?;
        let net_profit_usd = checked(
            gross_profit_usd
                .checked_sub(costs.gas_cost_usd)
                .and_then(|v| v.checked_sub(costs.bridge_cost_usd))
                .and_then(|v| v.checked_sub(slippage_impact_usd)),
            "net profit",
        )?;
        let net_profit_pct = checked(
            net_profit_usd
                .checked_div(trade_size_usd)
                .and_then(|v| v.checked_mul(HUNDRED)),
            "net profit percent",
        )?;

        // Flags are relative to a positive gross; a non-positive gross already
        // makes the verdict unprofitable.
        let has_gross = gross_profit_usd > Decimal::ZERO;
        let prohibitive = if has_gross {
            ProhibitiveFlags {
                gas: exceeds_share(costs.gas_cost_usd, self.ratios.gas, gross_profit_usd),
                bridge: exceeds_share(costs.bridge_cost_usd, self.ratios.bridge, gross_profit_usd),
                slippage: exceeds_share(slippage_impact_usd, self.ratios.slippage, gross_profit_usd),
            }
        } else {
            ProhibitiveFlags { gas: false, bridge: false, slippage: false }
        };

        let is_profitable = has_gross
            && trade_size_usd > Decimal::ZERO
            && net_profit_pct >= min_profit_threshold_pct;

        Ok(ProfitabilityVerdict {
            candidate: candidate.clone(),
            trade_size_usd,
            price_diff_pct,
            gross_profit_usd,
            gas_cost_usd: costs.gas_cost_usd,
            bridge_cost_usd: costs.bridge_cost_usd,
            slippage_pct: costs.slippage_pct,
            slippage_impact_usd,
            total_costs_usd,
            net_profit_usd,
            net_profit_pct,
            prohibitive,
            min_profit_threshold_pct,
            is_profitable,
        })
    }
}

/// Evaluates with the default prohibitive ratios.
pub fn evaluate(
    candidate: &OpportunityCandidate,
    trade_size_usd: Decimal,
    costs: &CostEstimate,
    min_profit_threshold_pct: Decimal,
) -> EngineResult<ProfitabilityVerdict> {
    ProfitabilityEvaluator::default().evaluate(candidate, trade_size_usd, costs, min_profit_threshold_pct)
}

fn exceeds_share(cost: Decimal, ratio: Decimal, gross: Decimal) -> bool {
    ratio.checked_mul(gross).is_some_and(|limit| cost > limit)
}

fn checked(value: Option<Decimal>, what: &str) -> EngineResult<Decimal> {
    value.ok_or_else(|| EngineError::invalid_input(format!("{} overflows decimal range", what)))
}
