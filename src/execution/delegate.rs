//! Execution delegate contract

use async_trait::async_trait;
use crate::{
    errors::SubmitError,
    types::{ExecutionReceipt, ScoredOpportunity, SigningIdentity},
};

/// Submits the cross-network trade/transfer for an opportunity (bridge and
/// exchange adapters live behind this).
#[async_trait]
pub trait ExecutionDelegate: Send + Sync {
    async fn submit(
        &self,
        opportunity: &ScoredOpportunity,
        identity: &SigningIdentity,
    ) -> Result<ExecutionReceipt, SubmitError>;
}
