//! Execution report storage

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;
use crate::types::ExecutionReport;

pub fn save_execution_report(dir: &Path, report: &ExecutionReport) -> Result<PathBuf> {
    let path = super::append_jsonl(dir, "executions", "executions", report)?;

    info!(
        lease_id = %report.lease_id,
        verdict_id = %report.verdict_id,
        state = ?report.outcome.final_state(),
        "Saved execution report"
    );

    Ok(path)
}
