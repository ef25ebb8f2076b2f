//! Data persistence and file operations

pub mod opportunities;
pub mod executions;

pub use opportunities::*;
pub use executions::*;

use anyhow::Result;
use chrono::Utc;
use lazy_static::lazy_static;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

lazy_static! {
    /// Serializes appends so concurrent writers never interleave lines.
    static ref RECORD_LOCK: Mutex<()> = Mutex::new(());
}

/// Appends `record` as one JSON line to `<dir>/<kind>/<prefix>_<date>.jsonl`.
fn append_jsonl<T: Serialize>(dir: &Path, kind: &str, prefix: &str, record: &T) -> Result<PathBuf> {
    let line = serde_json::to_string(record)?;
    let folder = dir.join(kind);
    let filename = folder.join(format!("{}_{}.jsonl", prefix, Utc::now().format("%Y-%m-%d")));

    let _guard = RECORD_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    fs::create_dir_all(&folder)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)?;
    writeln!(file, "{}", line)?;

    Ok(filename)
}
