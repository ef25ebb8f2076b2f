//! Cross-network arbitrage engine - Main Entry Point

use xnet_arb_engine::*;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    let _logging_guard = utils::setup_logging(&config.log_dir)?;
    utils::setup_output_directories(&config.log_dir, config.record_dir.as_deref())?;

    info!("🌉 Cross-Network Arbitrage Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Networks: {}", config.networks.iter().map(|n| n.id.to_string()).collect::<Vec<_>>().join(", "));
    info!("   Assets: {}", config.assets.iter().map(|a| a.symbol.as_str()).collect::<Vec<_>>().join(", "));
    info!("   Trade Size: ${}", config.trade_size_usd);
    info!("   Min Profit: {}%", config.min_profit_threshold_pct);
    info!("   Auto Execution: {}", config.enable_auto_execution);
    if config.enable_auto_execution {
        info!("   Lease Timeout: {:?}", config.lease_timeout);
        info!("   ⚠️  SIMULATION MODE - No transactions are broadcast");
    }
    for (network, reason) in &config.rejected_networks {
        warn!("   Skipping network {}: {}", network, reason);
    }

    let price_api_url = config
        .price_api_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("PRICE_API_URL must be set"))?;

    let collaborators = Collaborators {
        probe: Arc::new(network::RpcProbe::new(Duration::from_secs(5))),
        prices: Arc::new(network::HttpPriceSource::new(price_api_url)?),
        costs: Arc::new(arbitrage::FixedCostEstimator::new(config.costs.clone())),
        executor: Arc::new(execution::SimulatedExecutor::new(
            config.simulated_success_rate,
            Duration::from_millis(250),
        )),
    };

    let record_dir = config.record_dir.clone();
    let auto_execute = config.enable_auto_execution;
    let engine = ArbitrageEngine::new(config, collaborators)?;

    let mut opportunities = engine.subscribe();
    let mut executions = engine.subscribe_executions();

    let networks = engine.start().await?;
    info!("✅ {} networks online", networks.len());

    let start_time = Instant::now();
    let mut stats_interval = time::interval(Duration::from_secs(300));
    stats_interval.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("\n🚀 Watching for cross-network opportunities...\n");

    loop {
        tokio::select! {
            Some(opportunity) = opportunities.next() => {
                handle_opportunity(&engine, &opportunity, record_dir.as_deref(), auto_execute).await;
            }
            Some(report) = executions.next() => {
                utils::print_execution_report(&report);
                if let Some(dir) = record_dir.as_deref() {
                    if let Err(e) = storage::save_execution_report(dir, &report) {
                        error!("Failed to save execution report: {}", e);
                    }
                }
            }
            _ = stats_interval.tick() => {
                let health = engine.health().await;
                utils::print_session_stats(start_time, &engine.stats(), &health);
            }
            _ = &mut ctrl_c => {
                info!("\n📛 Received shutdown signal (Ctrl+C)...");
                break;
            }
        }
    }

    engine.shutdown().await;

    info!("\n🛑 Shutting down gracefully...");
    let health = engine.health().await;
    utils::print_session_stats(start_time, &engine.stats(), &health);
    if opportunities.skipped() > 0 {
        warn!("Opportunity feed dropped {} verdicts while busy", opportunities.skipped());
    }

    Ok(())
}

async fn handle_opportunity(
    engine: &Arc<ArbitrageEngine>,
    opportunity: &ScoredOpportunity,
    record_dir: Option<&std::path::Path>,
    auto_execute: bool,
) {
    let verdict = &opportunity.verdict;
    if !verdict.is_profitable {
        debug!(pair = %opportunity.key(), net_pct = %verdict.net_profit_pct, "Unprofitable verdict");
        return;
    }

    utils::print_opportunity(opportunity);
    if let Some(dir) = record_dir {
        if let Err(e) = storage::save_opportunity(dir, opportunity) {
            error!("Failed to save opportunity: {}", e);
        }
    }

    if !auto_execute || verdict.prohibitive.any() {
        return;
    }

    let identity = match engine.registry().get(&verdict.candidate.source_network).await {
        Ok(handle) => match handle.signer() {
            Some(signer) => signer.clone(),
            None => {
                debug!(network = %handle.id(), "No signer bound, skipping execution");
                return;
            }
        },
        Err(e) => {
            warn!("Cannot resolve signer: {}", e);
            return;
        }
    };

    match engine.request_execution(opportunity.id, identity).await {
        Ok(ExecutionTicket::Accepted(lease_id)) => info!(%lease_id, "Execution accepted"),
        Ok(ticket) => info!(verdict_id = %opportunity.id, ?ticket, "Execution not started"),
        Err(e) => warn!(verdict_id = %opportunity.id, "Execution refused: {}", e),
    }
}
