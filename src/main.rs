//! DEX Trade Engine - Main Entry Point
//!
//! Runs the momentum strategy over live prices and executes its signals

use dex_trade_engine::*;
use alloy::primitives::Address;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, warn};
use dex_trade_engine::{
    adapters::build_adapters,
    execution::{
        ApprovalSettings, ApprovalWorkflow, BackgroundExecutor, EngineSettings, ExecutionRequest, JobStatus,
        TradeExecutionEngine, TradeJob,
    },
    network::{AlloyChainClient, ChainClient, CoinGeckoFeed, PriceFeed},
    strategy::{MomentumStrategy, Strategy, StrategyConfig},
    utils::{from_base_units, SessionStats},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    let _logging_guard = utils::setup_logging()?;
    utils::setup_output_directories()?;

    // Load configuration
    let config = CONFIG.clone();

    info!("🔀 DEX Trade Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Network: {}", config.network.display_name());
    info!("   Exchanges: {}", config.enabled_exchanges.join(", "));
    info!("   Default Slippage: {} bps", config.default_slippage_bps);
    info!("   Max Gas Price: {} gwei", config.max_gas_price_gwei);
    info!("   Min Trade Amount: {}", config.min_trade_amount);
    info!("   Strategy Interval: {}s", config.strategy_interval_secs);
    if config.bypass_execution {
        info!("   ⚠️  BYPASS_EXECUTION set - every trade is simulated");
    }

    // Setup chain client
    let chain: Option<Arc<dyn ChainClient>> = match &config.rpc_url {
        Some(_) => {
            let client = AlloyChainClient::connect(&config)
                .await
                .context("Failed to set up chain client")?;
            info!("✅ Connected to {} (signer: {:?})", config.network, client.signer_address());
            Some(Arc::new(client))
        }
        None => {
            warn!("⚠️ RPC_URL not set - no venues can be quoted, signals will only be logged");
            None
        }
    };

    let wallet: Option<Address> = config
        .wallet_address
        .or_else(|| chain.as_ref().and_then(|c| c.signer_address()));

    // Build the engine
    let mut engine = TradeExecutionEngine::new(EngineSettings::from_config(&config, wallet));
    if let Some(chain) = &chain {
        let adapters = build_adapters(chain.clone(), &config);
        info!("🔌 Registered {} exchange adapters: {}", adapters.len(), adapters.names().join(", "));
        engine = engine
            .with_adapters(adapters)
            .with_approvals(Arc::new(ApprovalWorkflow::new(chain.clone(), ApprovalSettings::from_config(&config))));
    }
    let executor = BackgroundExecutor::new(Arc::new(engine));

    let feed = CoinGeckoFeed::new(config.coingecko_api_url.clone(), config.coingecko_api_key.clone())?;
    let mut strategy = MomentumStrategy::new(StrategyConfig::new("momentum"));
    let symbols = strategy.required_data();
    info!("📡 Monitoring {} tokens: {}", symbols.len(), symbols.join(", "));

    // Setup shutdown handler
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("\n📛 Received shutdown signal (Ctrl+C)...");
        let _ = shutdown_tx.send(());
    });

    info!("\n🚀 Starting strategy loop...\n");

    let mut stats = SessionStats::default();
    let mut interval = time::interval(Duration::from_secs(config.strategy_interval_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_strategy_cycle(
                    &feed,
                    &mut strategy,
                    &symbols,
                    chain.as_deref(),
                    wallet,
                    &executor,
                    &mut stats,
                ).await {
                    error!("Strategy cycle error: {}", e);
                    stats.record_error("strategy_cycle");
                }

                collect_finished_jobs(&executor, &mut stats).await;

                if stats.price_updates > 0 && stats.price_updates % 10 == 0 {
                    let active = executor.engine().list_active_trades().await.len();
                    utils::print_session_stats(&stats, active);
                }
            }
            _ = &mut shutdown_rx => {
                info!("Shutdown signal received, exiting strategy loop...");
                break;
            }
        }
    }

    info!("\n🛑 Shutting down gracefully...");
    executor.shutdown().await;
    collect_finished_jobs(&executor, &mut stats).await;

    let active = executor.engine().list_active_trades().await.len();
    utils::print_session_stats(&stats, active);

    Ok(())
}

/// Fetch prices, run the strategy, and queue any validated signal
async fn run_strategy_cycle(
    feed: &CoinGeckoFeed,
    strategy: &mut MomentumStrategy,
    symbols: &[String],
    chain: Option<&dyn ChainClient>,
    wallet: Option<Address>,
    executor: &BackgroundExecutor,
    stats: &mut SessionStats,
) -> Result<()> {
    let market_data = feed.market_data(symbols).await?;
    stats.price_updates += 1;

    for data in &market_data {
        debug!(
            "💹 {} | ${:.4} | 24h vol ${:.0} | 24h {:+.2}%",
            data.symbol, data.price, data.volume_24h, data.price_change_24h
        );
    }

    let Some(signal) = strategy.analyze(&market_data) else {
        return Ok(());
    };
    stats.signals_generated += 1;
    utils::print_trading_signal(&signal);

    let portfolio = match (chain, wallet) {
        (Some(chain), Some(wallet)) => load_portfolio(chain, wallet, symbols, feed).await,
        _ => Vec::new(),
    };

    if !strategy.validate_signal(&signal, &portfolio) {
        stats.signals_rejected += 1;
        info!("🚫 Signal rejected by risk checks");
        return Ok(());
    }

    if chain.is_none() {
        info!("Signal not executed: no chain client configured");
        return Ok(());
    }

    executor
        .submit(TradeJob { signal, request: ExecutionRequest::default() })
        .await;

    Ok(())
}

/// Wallet holdings for the monitored tokens. Tokens that cannot be read are
/// left out.
async fn load_portfolio(
    chain: &dyn ChainClient,
    wallet: Address,
    symbols: &[String],
    feed: &CoinGeckoFeed,
) -> Vec<PortfolioPosition> {
    let mut positions = Vec::new();

    for symbol in symbols {
        let Some(token) = lookup_token(chain.network(), symbol) else {
            continue;
        };
        let balance = if token.is_native() {
            chain.native_balance(wallet).await
        } else {
            chain.token_balance(token.address, wallet).await
        };

        match balance.map(|units| from_base_units(units, token.decimals)) {
            Ok(Some(amount)) => {
                let price = feed
                    .price_usd(symbol)
                    .and_then(rust_decimal::Decimal::from_f64_retain)
                    .unwrap_or_default();
                positions.push(PortfolioPosition {
                    symbol: symbol.clone(),
                    amount,
                    value_usd: (amount * price).round_dp(2),
                });
            }
            Ok(None) => warn!("⚠️ {} balance does not fit a decimal", symbol),
            Err(e) => warn!("⚠️ Failed to read {} balance: {}", symbol, e),
        }
    }

    positions
}

/// Record, print and persist every job that has finished, then forget it.
async fn collect_finished_jobs(executor: &BackgroundExecutor, stats: &mut SessionStats) {
    for (job_id, status) in executor.take_finished().await {
        match status {
            JobStatus::Finished(execution) => {
                stats.record_execution(&execution);
                utils::print_trade_execution(&execution);
                if let Err(e) = storage::save_trade_execution(&execution) {
                    error!("Failed to save trade execution: {}", e);
                    stats.record_error("save_execution");
                }
            }
            JobStatus::Failed(reason) => {
                error!("Trade job {} failed: {}", job_id, reason);
                stats.record_error("rejected_job");
            }
            JobStatus::Running | JobStatus::Unknown => warn!("⚠️ Unexpected state for trade job {}", job_id),
        }
    }
}
