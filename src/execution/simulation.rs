//! Dry-run execution delegate

use async_trait::async_trait;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing::info;
use crate::{
    errors::SubmitError,
    execution::ExecutionDelegate,
    types::{ExecutionReceipt, ScoredOpportunity, SigningIdentity},
};

/// Pretends to submit both legs of an opportunity. Latency and failure odds
/// grow with the number of prohibitive cost flags on the verdict.
pub struct SimulatedExecutor {
    success_rate: f64,
    base_latency: Duration,
}

impl SimulatedExecutor {
    pub fn new(success_rate: f64, base_latency: Duration) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            base_latency,
        }
    }
}

#[async_trait]
impl ExecutionDelegate for SimulatedExecutor {
    async fn submit(
        &self,
        opportunity: &ScoredOpportunity,
        identity: &SigningIdentity,
    ) -> Result<ExecutionReceipt, SubmitError> {
        let verdict = &opportunity.verdict;
        let flags = verdict.prohibitive;
        let pressure = [flags.gas, flags.bridge, flags.slippage]
            .iter()
            .filter(|f| **f)
            .count() as u32;

        tokio::time::sleep(self.base_latency + Duration::from_millis(150) * pressure).await;

        let success_rate = self.success_rate * (1.0 - 0.15 * pressure as f64);
        let is_successful = rand::random::<f64>() < success_rate;

        // realised slippage on top of the estimate
        let extra_slippage_bps = 25 + 50 * pressure;
        let slippage_factor = dec!(1) - (Decimal::from(extra_slippage_bps) / dec!(10000));
        let realized_profit = verdict.net_profit_usd.checked_mul(slippage_factor);

        info!(
            verdict_id = %opportunity.id,
            identity = %identity,
            "🎭 Simulated execution: success={}, extra slippage={}bps",
            is_successful, extra_slippage_bps
        );

        if !is_successful {
            return Err(SubmitError::Reverted("simulated revert under cost pressure".to_string()));
        }

        let tx_hash = || format!("0x{}", uuid::Uuid::new_v4().simple());
        Ok(ExecutionReceipt {
            tx_hashes: vec![tx_hash(), tx_hash()],
            realized_profit_usd: realized_profit,
        })
    }
}
