//! Logging setup and configuration

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub struct LoggingGuard {
    pub _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Stdout plus an hourly rolling file under `log_dir`. Keep the guard alive
/// for as long as file logging is wanted.
pub fn setup_logging(log_dir: &str) -> Result<Arc<LoggingGuard>> {
    let file_appender = tracing_appender::rolling::hourly(log_dir, "xnet-arb-engine.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(true)
                .with_level(true)
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_level(true)
                .with_ansi(false)
                .compact()
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?)
        )
        .init();

    Ok(Arc::new(LoggingGuard { _guard: guard }))
}

pub fn setup_output_directories(log_dir: &str, record_dir: Option<&Path>) -> Result<()> {
    use std::fs;

    fs::create_dir_all(log_dir)?;
    if let Some(dir) = record_dir {
        fs::create_dir_all(dir.join("opportunities"))?;
        fs::create_dir_all(dir.join("executions"))?;
    }

    Ok(())
}
