//! Opportunity verdict storage

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::types::ScoredOpportunity;

pub fn save_opportunity(dir: &Path, opportunity: &ScoredOpportunity) -> Result<PathBuf> {
    let path = super::append_jsonl(dir, "opportunities", "arbitrage", opportunity)?;

    debug!(
        verdict_id = %opportunity.id,
        pair = %opportunity.key(),
        net_profit = %opportunity.verdict.net_profit_usd,
        profitable = opportunity.verdict.is_profitable,
        "Saved opportunity verdict"
    );

    Ok(path)
}
