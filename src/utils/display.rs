//! Display and printing utilities

use std::collections::HashMap;
use std::time::Instant;
use tracing::{error, info, warn};
use crate::types::{TradeExecution, TradeQuote, TradeStatus, TradingSignal};

/// Counters for the strategy loop's periodic summary.
#[derive(Debug)]
pub struct SessionStats {
    pub start_time: Instant,
    pub price_updates: u64,
    pub signals_generated: u64,
    pub signals_rejected: u64,
    pub executions: u64,
    pub completed: u64,
    pub simulated: u64,
    pub failed: u64,
    pub failure_counts: HashMap<String, u32>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            price_updates: 0,
            signals_generated: 0,
            signals_rejected: 0,
            executions: 0,
            completed: 0,
            simulated: 0,
            failed: 0,
            failure_counts: HashMap::new(),
        }
    }
}

impl SessionStats {
    pub fn record_execution(&mut self, execution: &TradeExecution) {
        self.executions += 1;
        match execution.status {
            TradeStatus::Completed if execution.dry_run => self.simulated += 1,
            TradeStatus::Completed => self.completed += 1,
            TradeStatus::Failed => {
                self.failed += 1;
                let kind = execution
                    .failure_kind
                    .map(|k| format!("{:?}", k))
                    .unwrap_or_else(|| "Unknown".to_string());
                *self.failure_counts.entry(kind).or_insert(0) += 1;
            }
            _ => {}
        }
    }

    pub fn record_error(&mut self, kind: &str) {
        *self.failure_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.executions > 0 {
            (self.completed + self.simulated) as f64 / self.executions as f64 * 100.0
        } else {
            0.0
        }
    }
}

pub fn print_session_stats(stats: &SessionStats, active_trades: usize) {
    let runtime = stats.start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   📈 SIGNALS:");
    info!("     Price updates: {}", stats.price_updates);
    info!("     Generated: {}", stats.signals_generated);
    info!("     Rejected by risk checks: {}", stats.signals_rejected);

    info!("   🚀 TRADE EXECUTION:");
    info!("     Total executions: {}", stats.executions);
    info!("     Completed on-chain: {}", stats.completed);
    info!("     Simulated: {}", stats.simulated);
    info!("     Failed: {}", stats.failed);
    info!("     Success rate: {:.1}%", stats.success_rate());
    info!("     Active trades: {}", active_trades);

    if !stats.failure_counts.is_empty() {
        info!("   ⚙️  Failure summary:");
        for (kind, count) in stats.failure_counts.iter() {
            info!("       {}: {}", kind, count);
        }
    }

    info!("");
}

pub fn print_trading_signal(signal: &TradingSignal) {
    warn!("\n🎯 {} SIGNAL from {}", signal.signal_type, signal.strategy_id);
    warn!("   Trade: {} {} -> {}", signal.amount, signal.token_in, signal.token_out);
    warn!("   Confidence: {:.1}%", signal.confidence * 100.0);
    warn!("   Reason: {}", signal.reason);
}

pub fn print_quote(quote: &TradeQuote) {
    info!("💱 {} quote: {} {} -> {} {}", quote.exchange, quote.amount_in, quote.token_in, quote.amount_out, quote.token_out);
    info!("   Net after fees: {} {}", quote.net_amount_out(), quote.token_out);
    info!("   Est. slippage: {:.3}%, gas: {}", quote.slippage_estimate * rust_decimal_macros::dec!(100), quote.gas_estimate);
    info!("   Route: {}", quote.route.join(" -> "));
}

pub fn print_trade_execution(execution: &TradeExecution) {
    match execution.status {
        TradeStatus::Completed => {
            let label = if execution.dry_run { "SIMULATED TRADE" } else { "TRADE EXECUTION" };
            warn!("\n✅ {} {}", label, execution.trade_id);
            warn!("📍 Network: {} via {}", execution.network, execution.exchange);
            warn!("💰 Execution Details:");
            warn!(
                "   {} {} {} -> {:?} {}",
                execution.signal.signal_type,
                execution.actual_amount_in.unwrap_or(execution.signal.amount),
                execution.signal.token_in,
                execution.actual_amount_out,
                execution.signal.token_out
            );
            if let Some(tx_hash) = &execution.transaction_hash {
                warn!("   Tx Hash: {}", tx_hash);
            }
            if let Some(block) = execution.block_number {
                warn!("   Block: {}", block);
            }
            if let Some(price) = execution.execution_price {
                warn!("   Price: {}", price);
            }
            if let Some(fees) = execution.fees {
                warn!("   Fees: {} {}", fees, execution.signal.token_out);
            }
            if let Some(slippage) = execution.slippage {
                warn!("   Slippage: {:.3}%", slippage * rust_decimal_macros::dec!(100));
            }
            if let Some(gas) = execution.gas_used {
                warn!("   Gas: {}", gas);
            }
        }
        TradeStatus::Failed => {
            error!("\n❌ TRADE FAILED {}", execution.trade_id);
            error!("   Kind: {:?}", execution.failure_kind);
            error!("   Error: {}", execution.error_message.as_deref().unwrap_or("Unknown"));
            if let Some(tx_hash) = &execution.transaction_hash {
                error!("   Tx Hash: {} (check on-chain)", tx_hash);
            }
        }
        status => {
            info!("⏳ Trade {} is {}", execution.trade_id, status);
        }
    }
}
