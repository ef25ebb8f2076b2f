//! Opportunity candidates, cost inputs and profitability verdicts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use super::NetworkId;

/// (asset, source network, target network); the unit verdicts are ordered and
/// queried by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OpportunityKey {
    pub asset: String,
    pub source: NetworkId,
    pub target: NetworkId,
}

impl fmt::Display for OpportunityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}→{}", self.asset, self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityCandidate {
    pub asset: String,
    /// Cheaper side.
    pub source_network: NetworkId,
    /// More expensive side.
    pub target_network: NetworkId,
    pub source_price: Decimal,
    pub target_price: Decimal,
    pub discovered_at: DateTime<Utc>,
    /// Instant after which either contributing snapshot is stale.
    pub fresh_until: DateTime<Utc>,
    /// Detector pass counter; later passes carry larger values.
    pub detection_seq: u64,
}

impl OpportunityCandidate {
    pub fn key(&self) -> OpportunityKey {
        OpportunityKey {
            asset: self.asset.clone(),
            source: self.source_network.clone(),
            target: self.target_network.clone(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now <= self.fresh_until
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxShape {
    Swap,
    BridgeTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub gas_cost_usd: Decimal,
    pub bridge_cost_usd: Decimal,
    pub slippage_pct: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProhibitiveFlags {
    pub gas: bool,
    pub bridge: bool,
    pub slippage: bool,
}

impl ProhibitiveFlags {
    pub fn any(&self) -> bool {
        self.gas || self.bridge || self.slippage
    }
}

/// Fully costed decision for one candidate. Contains nothing that is not
/// derived from the evaluation inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityVerdict {
    pub candidate: OpportunityCandidate,
    pub trade_size_usd: Decimal,
    pub price_diff_pct: Decimal,
    pub gross_profit_usd: Decimal,
    pub gas_cost_usd: Decimal,
    pub bridge_cost_usd: Decimal,
    pub slippage_pct: Decimal,
    pub slippage_impact_usd: Decimal,
    pub total_costs_usd: Decimal,
    pub net_profit_usd: Decimal,
    pub net_profit_pct: Decimal,
    pub prohibitive: ProhibitiveFlags,
    pub min_profit_threshold_pct: Decimal,
    pub is_profitable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VerdictId(pub uuid::Uuid);

impl VerdictId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for VerdictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VerdictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A verdict as published on the bus.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredOpportunity {
    pub id: VerdictId,
    pub published_at: DateTime<Utc>,
    pub verdict: ProfitabilityVerdict,
}

impl ScoredOpportunity {
    pub fn new(verdict: ProfitabilityVerdict) -> Self {
        Self {
            id: VerdictId::new(),
            published_at: Utc::now(),
            verdict,
        }
    }

    pub fn key(&self) -> OpportunityKey {
        self.verdict.candidate.key()
    }
}
