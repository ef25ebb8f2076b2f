//! Execution lease and outcome types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use super::{NetworkId, SigningIdentity, VerdictId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LeaseKey {
    pub identity: SigningIdentity,
    pub network: NetworkId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LeaseId(pub uuid::Uuid);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of one lease key. Absence from the lease map is `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeaseState {
    Idle,
    Leased { lease_id: LeaseId },
    Settled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExecutionFailure {
    Rejected(String),
    Reverted(String),
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailure::Rejected(reason) => write!(f, "rejected: {}", reason),
            ExecutionFailure::Reverted(reason) => write!(f, "reverted: {}", reason),
        }
    }
}

/// What the delegate reports for a confirmed submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReceipt {
    pub tx_hashes: Vec<String>,
    pub realized_profit_usd: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionOutcome {
    Settled(ExecutionReceipt),
    Failed(ExecutionFailure),
    /// Final on-chain state unknown.
    TimedOut,
}

impl ExecutionOutcome {
    pub fn final_state(&self) -> LeaseState {
        match self {
            ExecutionOutcome::Settled(_) => LeaseState::Settled,
            ExecutionOutcome::Failed(_) | ExecutionOutcome::TimedOut => LeaseState::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub lease_id: LeaseId,
    pub verdict_id: VerdictId,
    pub identity: SigningIdentity,
    pub networks: Vec<NetworkId>,
    pub outcome: ExecutionOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// Answer to an execution trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionTicket {
    Accepted(LeaseId),
    Busy,
    NotFound,
}
