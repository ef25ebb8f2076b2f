//! Display and printing utilities

use std::time::Instant;
use tracing::{error, info, warn};
use crate::{
    engine::StatsSnapshot,
    types::{ExecutionOutcome, ExecutionReport, HealthStatus, ScoredOpportunity},
};

fn pct(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}

pub fn print_session_stats(start_time: Instant, stats: &StatsSnapshot, health: &HealthStatus) {
    let runtime = start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   📡 PRICE FEED:");
    info!("     Snapshots applied: {}", stats.snapshots_applied);
    info!("     Out of order: {}", stats.snapshots_out_of_order);

    info!("   📈 OPPORTUNITIES:");
    info!("     Candidates detected: {}", stats.candidates_detected);
    info!("     Stale drops: {}", stats.stale_candidates_dropped);
    info!("     Skipped (network down): {}", stats.down_network_skips);
    info!("     Verdicts published: {}", stats.verdicts_published);
    info!("     Profitable: {} ({:.1}%)",
        stats.profitable_verdicts,
        pct(stats.profitable_verdicts, stats.verdicts_published)
    );
    info!("     Open right now: {}", health.open_opportunities);

    info!("   🚀 EXECUTION:");
    info!("     Accepted: {}", stats.executions_accepted);
    info!("     Busy: {}", stats.executions_busy);
    info!("     Settled: {} ({:.1}%)",
        stats.executions_settled,
        pct(stats.executions_settled, stats.executions_accepted)
    );
    info!("     Failed: {}, timed out: {}", stats.executions_failed, stats.executions_timed_out);
    info!("     In flight: {}", health.in_flight_executions);

    info!("   ⚙️  SYSTEM:");
    info!("     Networks up: {}/{}", health.networks_up(), health.networks.len());
    for network in &health.networks {
        info!("       {}: {} ({} consecutive probe failures)",
            network.network, network.state, network.consecutive_failures
        );
    }
    if stats.cost_estimate_failures > 0 || stats.invalid_inputs > 0 {
        info!("     Cost estimate failures: {}", stats.cost_estimate_failures);
        info!("     Invalid evaluation inputs: {}", stats.invalid_inputs);
    }

    info!("");
}

pub fn print_opportunity(opportunity: &ScoredOpportunity) {
    let verdict = &opportunity.verdict;
    warn!("\n🎯 ARBITRAGE OPPORTUNITY #{}", opportunity.id);
    warn!("📍 Route: {}", opportunity.key());
    warn!("💰 Profit Analysis:");
    warn!("   Buy  @ {}: ${:.4}", verdict.candidate.source_network, verdict.candidate.source_price);
    warn!("   Sell @ {}: ${:.4}", verdict.candidate.target_network, verdict.candidate.target_price);
    warn!("   Spread: {:.3}%", verdict.price_diff_pct);
    warn!("   Gross: ${:.2} on ${}", verdict.gross_profit_usd, verdict.trade_size_usd);
    warn!("   Costs: gas ${:.2}, bridge ${:.2}, slippage ${:.2}",
        verdict.gas_cost_usd, verdict.bridge_cost_usd, verdict.slippage_impact_usd
    );
    warn!("   Net Profit: ${:.2} ({:.3}%)", verdict.net_profit_usd, verdict.net_profit_pct);
    if verdict.prohibitive.any() {
        warn!("⚠️  Prohibitive costs: gas={} bridge={} slippage={}",
            verdict.prohibitive.gas, verdict.prohibitive.bridge, verdict.prohibitive.slippage
        );
    }
}

pub fn print_execution_report(report: &ExecutionReport) {
    match &report.outcome {
        ExecutionOutcome::Settled(receipt) => {
            warn!("\n✅ EXECUTION SETTLED #{}", report.lease_id);
            warn!("📍 Networks: {:?}", report.networks);
            warn!("   Verdict: {}", report.verdict_id);
            for tx_hash in &receipt.tx_hashes {
                warn!("   Tx Hash: {}", tx_hash);
            }
            if let Some(profit) = receipt.realized_profit_usd {
                warn!("   Realized Profit: ${:.2}", profit);
            }
            warn!("   Execution Time: {}ms", report.execution_time_ms);
        }
        ExecutionOutcome::Failed(failure) => {
            error!("\n❌ EXECUTION FAILED #{}", report.lease_id);
            error!("   Error: {}", failure);
        }
        ExecutionOutcome::TimedOut => {
            error!("\n⏱️  EXECUTION TIMED OUT #{} after {}ms (final state unknown)",
                report.lease_id, report.execution_time_ms
            );
        }
    }
}
