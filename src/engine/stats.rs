//! Engine counters

use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;
use crate::types::ExecutionOutcome;

#[derive(Debug, Default)]
pub struct EngineStats {
    snapshots_applied: AtomicU64,
    snapshots_out_of_order: AtomicU64,
    candidates_detected: AtomicU64,
    stale_candidates_dropped: AtomicU64,
    down_network_skips: AtomicU64,
    invalid_inputs: AtomicU64,
    cost_estimate_failures: AtomicU64,
    verdicts_published: AtomicU64,
    verdicts_superseded: AtomicU64,
    profitable_verdicts: AtomicU64,
    executions_accepted: AtomicU64,
    executions_busy: AtomicU64,
    executions_settled: AtomicU64,
    executions_failed: AtomicU64,
    executions_timed_out: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub snapshots_applied: u64,
    pub snapshots_out_of_order: u64,
    pub candidates_detected: u64,
    pub stale_candidates_dropped: u64,
    pub down_network_skips: u64,
    pub invalid_inputs: u64,
    pub cost_estimate_failures: u64,
    pub verdicts_published: u64,
    pub verdicts_superseded: u64,
    pub profitable_verdicts: u64,
    pub executions_accepted: u64,
    pub executions_busy: u64,
    pub executions_settled: u64,
    pub executions_failed: u64,
    pub executions_timed_out: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl EngineStats {
    pub fn record_pass(&self, applied: bool, candidates: usize, stale_excluded: u64) {
        if applied {
            bump(&self.snapshots_applied, 1);
        } else {
            bump(&self.snapshots_out_of_order, 1);
        }
        bump(&self.candidates_detected, candidates as u64);
        bump(&self.stale_candidates_dropped, stale_excluded);
    }

    pub fn record_stale_candidate(&self) {
        bump(&self.stale_candidates_dropped, 1);
    }

    pub fn record_down_network_skip(&self) {
        bump(&self.down_network_skips, 1);
    }

    pub fn record_invalid_input(&self) {
        bump(&self.invalid_inputs, 1);
    }

    pub fn record_cost_failure(&self) {
        bump(&self.cost_estimate_failures, 1);
    }

    pub fn record_verdict(&self, published: bool, profitable: bool) {
        if !published {
            bump(&self.verdicts_superseded, 1);
            return;
        }
        bump(&self.verdicts_published, 1);
        if profitable {
            bump(&self.profitable_verdicts, 1);
        }
    }

    pub fn record_execution_accepted(&self) {
        bump(&self.executions_accepted, 1);
    }

    pub fn record_execution_busy(&self) {
        bump(&self.executions_busy, 1);
    }

    pub fn record_outcome(&self, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Settled(_) => bump(&self.executions_settled, 1),
            ExecutionOutcome::Failed(_) => bump(&self.executions_failed, 1),
            ExecutionOutcome::TimedOut => bump(&self.executions_timed_out, 1),
        }
    }

    pub fn stale_candidates_dropped(&self) -> u64 {
        self.stale_candidates_dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            snapshots_applied: load(&self.snapshots_applied),
            snapshots_out_of_order: load(&self.snapshots_out_of_order),
            candidates_detected: load(&self.candidates_detected),
            stale_candidates_dropped: load(&self.stale_candidates_dropped),
            down_network_skips: load(&self.down_network_skips),
            invalid_inputs: load(&self.invalid_inputs),
            cost_estimate_failures: load(&self.cost_estimate_failures),
            verdicts_published: load(&self.verdicts_published),
            verdicts_superseded: load(&self.verdicts_superseded),
            profitable_verdicts: load(&self.profitable_verdicts),
            executions_accepted: load(&self.executions_accepted),
            executions_busy: load(&self.executions_busy),
            executions_settled: load(&self.executions_settled),
            executions_failed: load(&self.executions_failed),
            executions_timed_out: load(&self.executions_timed_out),
        }
    }
}
