//! Trade execution engine

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;
use crate::{
    adapters::{AdapterRegistry, ExchangeAdapter},
    config::Config,
    errors::{EngineError, EngineResult},
    execution::{
        aggregator::QuoteAggregator,
        approval::{ApprovalOutcome, ApprovalWorkflow},
        monitor::{MonitorOutcome, MonitorSettings, TransactionMonitor},
        registry::TradeRegistry,
    },
    network::received_amount,
    types::{FailureKind, Network, SignalType, TradeExecution, TradeQuote, TradeStatus, TradingSignal},
    utils::{from_base_units, print_quote, to_base_units},
};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub network: Network,
    /// Recipient and signer of live trades. Dry runs work without one.
    pub wallet: Option<Address>,
    pub default_max_slippage: Decimal,
    pub min_trade_amount: Decimal,
    /// Forces every trade to be simulated.
    pub bypass_execution: bool,
    pub quote_timeout: Duration,
    pub max_retained_trades: usize,
    pub monitor: MonitorSettings,
}

impl EngineSettings {
    pub fn from_config(config: &Config, wallet: Option<Address>) -> Self {
        Self {
            network: config.network,
            wallet: wallet.or(config.wallet_address),
            default_max_slippage: config.default_max_slippage(),
            min_trade_amount: config.min_trade_amount,
            bypass_execution: config.bypass_execution,
            quote_timeout: config.quote_timeout(),
            max_retained_trades: config.max_retained_trades,
            monitor: MonitorSettings::from_config(config),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            network: Network::Ethereum,
            wallet: None,
            default_max_slippage: dec!(0.005),
            min_trade_amount: dec!(0.0001),
            bypass_execution: false,
            quote_timeout: Duration::from_secs(10),
            max_retained_trades: 1000,
            monitor: MonitorSettings::default(),
        }
    }
}

/// Per-call options for `execute_signal`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// Venue to use. `None` picks the best quote across all venues.
    pub exchange: Option<String>,
    /// Fraction, e.g. `0.005` for 0.5%. Defaults to the engine setting.
    pub max_slippage: Option<Decimal>,
    pub dry_run: bool,
}

impl ExecutionRequest {
    pub fn dry_run() -> Self {
        Self { dry_run: true, ..Default::default() }
    }

    pub fn on(exchange: &str) -> Self {
        Self { exchange: Some(exchange.to_string()), ..Default::default() }
    }
}

pub struct TradeExecutionEngine {
    adapters: RwLock<AdapterRegistry>,
    aggregator: QuoteAggregator,
    approvals: Option<Arc<ApprovalWorkflow>>,
    monitor: TransactionMonitor,
    registry: TradeRegistry,
    settings: EngineSettings,
    shutdown: CancellationToken,
}

impl TradeExecutionEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            adapters: RwLock::new(AdapterRegistry::new()),
            aggregator: QuoteAggregator::new(settings.quote_timeout),
            approvals: None,
            monitor: TransactionMonitor::new(settings.monitor.clone()),
            registry: TradeRegistry::new(settings.max_retained_trades),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_adapters(self, adapters: AdapterRegistry) -> Self {
        Self { adapters: RwLock::new(adapters), ..self }
    }

    /// Required for live trades that sell an ERC-20 token.
    pub fn with_approvals(self, approvals: Arc<ApprovalWorkflow>) -> Self {
        Self { approvals: Some(approvals), ..self }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub async fn register_adapter(&self, name: &str, adapter: Arc<dyn ExchangeAdapter>) {
        if self.adapters.write().await.register(name, adapter).is_some() {
            warn!("⚠️ Replaced existing adapter {}", name);
        }
        info!("🔌 Registered exchange adapter: {}", name);
    }

    pub async fn adapter_names(&self) -> Vec<String> {
        self.adapters.read().await.names()
    }

    /// Best net-of-fee quote across `exchanges`, or every registered venue
    /// when `None`. Unregistered names are skipped.
    pub async fn get_best_quote(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
        exchanges: Option<&[&str]>,
    ) -> Option<TradeQuote> {
        let adapters = {
            let registry = self.adapters.read().await;
            match exchanges {
                Some(names) => registry.select(names),
                None => registry.all(),
            }
        };
        self.aggregator.get_best_quote(&adapters, token_in, token_out, amount_in).await
    }

    /// Runs one signal through quote, checks, approval, submission and
    /// monitoring. Trading failures come back as a FAILED record; `Err` is
    /// reserved for requests that could never be executed (bad signal,
    /// unknown venue), and even those are recorded first.
    pub async fn execute_signal(&self, signal: TradingSignal, request: ExecutionRequest) -> EngineResult<TradeExecution> {
        let trade_id = format!("trade_{}", Uuid::new_v4().simple());
        let dry_run = request.dry_run || self.settings.bypass_execution;
        let max_slippage = request.max_slippage.unwrap_or(self.settings.default_max_slippage);

        let execution = TradeExecution::new_pending(
            trade_id.clone(),
            signal.clone(),
            request.exchange.as_deref(),
            self.settings.network,
        );
        let accepted = execution.clone();
        self.registry.insert(execution).await;
        info!(
            trade_id = %trade_id,
            "📥 Accepted {} signal: {} {} -> {} (dry run: {})",
            signal.signal_type, signal.amount, signal.token_in, signal.token_out, dry_run
        );

        if let Err(reason) = self.validate(&signal, max_slippage) {
            self.fail(&trade_id, FailureKind::InvalidSignal, &reason).await;
            return Err(EngineError::InvalidSignal(reason));
        }

        let requested_adapter = match &request.exchange {
            Some(name) => match self.adapters.read().await.get(name) {
                Some(adapter) => Some(adapter),
                None => {
                    let err = EngineError::UnknownExchange(name.clone());
                    self.fail(&trade_id, FailureKind::UnknownExchange, &err.to_string()).await;
                    return Err(err);
                }
            },
            None => None,
        };

        let quote = match requested_adapter {
            Some(adapter) => self.quote_from(adapter.as_ref(), &signal).await,
            None => self.get_best_quote(&signal.token_in, &signal.token_out, signal.amount, None).await,
        };

        let Some(quote) = quote else {
            let reason = format!("No quotes available for {} -> {}", signal.token_in, signal.token_out);
            self.fail(&trade_id, FailureKind::QuoteUnavailable, &reason).await;
            return Ok(self.snapshot(&trade_id, &accepted).await);
        };

        print_quote(&quote);
        self.registry.update(&trade_id, |t| t.exchange = quote.exchange.clone()).await;

        if quote.is_expired_at(Utc::now()) {
            let reason = format!("Quote from {} expired at {}", quote.exchange, quote.valid_until);
            self.fail(&trade_id, FailureKind::QuoteExpired, &reason).await;
            return Ok(self.snapshot(&trade_id, &accepted).await);
        }

        if quote.slippage_estimate > max_slippage {
            let reason = format!(
                "Slippage too high: {:.2}% > {:.2}%",
                quote.slippage_estimate * dec!(100),
                max_slippage * dec!(100)
            );
            self.fail(&trade_id, FailureKind::SlippageExceeded, &reason).await;
            return Ok(self.snapshot(&trade_id, &accepted).await);
        }

        if dry_run {
            if self.registry.update(&trade_id, |t| t.complete_simulated(&quote)).await == Some(true) {
                info!(
                    trade_id = %trade_id,
                    "🧪 Simulated trade on {}: {} {} -> {} {}",
                    quote.exchange, quote.amount_in, quote.token_in, quote.amount_out, quote.token_out
                );
            }
            return Ok(self.snapshot(&trade_id, &accepted).await);
        }

        self.execute_live(&trade_id, &quote, max_slippage).await;
        Ok(self.snapshot(&trade_id, &accepted).await)
    }

    async fn execute_live(&self, trade_id: &str, quote: &TradeQuote, max_slippage: Decimal) {
        let Some(wallet) = self.settings.wallet else {
            self.fail(trade_id, FailureKind::Execution, "No wallet configured for live execution").await;
            return;
        };

        let Some(adapter) = self.adapters.read().await.get(&quote.exchange) else {
            let reason = format!("Exchange {} not available", quote.exchange);
            self.fail(trade_id, FailureKind::Execution, &reason).await;
            return;
        };

        if let Err((kind, reason)) = self.ensure_allowance(adapter.as_ref(), quote, wallet).await {
            self.fail(trade_id, kind, &reason).await;
            return;
        }

        // A cancel may have landed while quoting or approving.
        if self.registry.update(trade_id, |t| t.advance(TradeStatus::Submitted)).await != Some(true) {
            info!(trade_id = %trade_id, "Trade no longer pending, not submitting");
            return;
        }

        let tx_hash = match adapter.execute_trade(quote, wallet, max_slippage).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(trade_id = %trade_id, "❌ Trade execution failed: {}", e);
                self.fail(trade_id, FailureKind::Execution, &e.to_string()).await;
                return;
            }
        };

        self.registry
            .update(trade_id, |t| t.confirm_submission(&tx_hash))
            .await;
        info!(trade_id = %trade_id, tx_hash = %tx_hash, "📡 Swap submitted on {}", quote.exchange);

        let cancel = self.shutdown.child_token();
        let outcome = self.monitor.watch(adapter.as_ref(), &tx_hash, &cancel).await;
        self.apply_outcome(trade_id, adapter.as_ref(), quote, wallet, &tx_hash, outcome).await;
    }

    async fn quote_from(&self, adapter: &dyn ExchangeAdapter, signal: &TradingSignal) -> Option<TradeQuote> {
        let request = adapter.get_quote(&signal.token_in, &signal.token_out, signal.amount);
        match tokio::time::timeout(self.aggregator.quote_timeout, request).await {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                warn!("⚠️ Failed to get quote from {}: {}", adapter.name(), e);
                None
            }
            Err(_) => {
                warn!("⚠️ Quote from {} timed out", adapter.name());
                None
            }
        }
    }

    async fn ensure_allowance(
        &self,
        adapter: &dyn ExchangeAdapter,
        quote: &TradeQuote,
        wallet: Address,
    ) -> Result<(), (FailureKind, String)> {
        let token_in = adapter
            .resolve_token(&quote.token_in)
            .map_err(|e| (FailureKind::Approval, e.to_string()))?;
        if token_in.is_native() {
            return Ok(());
        }

        let approvals = self.approvals.as_ref().ok_or_else(|| {
            (FailureKind::Approval, "No chain client configured for token approvals".to_string())
        })?;
        let required = to_base_units(quote.amount_in, token_in.decimals)
            .ok_or_else(|| (FailureKind::Approval, format!("Amount {} not representable", quote.amount_in)))?;

        match approvals.check_and_approve(&token_in, wallet, adapter.spender(), required).await {
            outcome if outcome.is_ready() => Ok(()),
            ApprovalOutcome::InsufficientFunds { reason } => Err((FailureKind::InsufficientFunds, reason)),
            ApprovalOutcome::InsufficientBalance { reason } => Err((FailureKind::InsufficientBalance, reason)),
            ApprovalOutcome::Unconfirmed { tx_hash } => Err((
                FailureKind::Approval,
                format!("Approval {} unconfirmed; verify on-chain before retrying", tx_hash),
            )),
            ApprovalOutcome::Failed { reason } => Err((FailureKind::Approval, reason)),
            other => Err((FailureKind::Approval, format!("Unexpected approval outcome: {:?}", other))),
        }
    }

    async fn apply_outcome(
        &self,
        trade_id: &str,
        adapter: &dyn ExchangeAdapter,
        quote: &TradeQuote,
        wallet: Address,
        tx_hash: &str,
        outcome: MonitorOutcome,
    ) {
        match outcome {
            MonitorOutcome::Completed { block_number, gas_used, gas_price, transfers } => {
                let actual_out = adapter.resolve_token(&quote.token_out).ok().and_then(|token| {
                    let (contract, native) = if token.is_native() {
                        (adapter.network().wrapped_native(), true)
                    } else {
                        (token.address, false)
                    };
                    let units = received_amount(&transfers, contract, wallet, native);
                    if units.is_zero() { None } else { from_base_units(units, token.decimals) }
                });
                if actual_out.is_none() {
                    warn!(trade_id = %trade_id, "⚠️ No {} transfer to the wallet found in receipt logs", quote.token_out);
                }

                self.registry
                    .update(trade_id, |t| {
                        t.block_number = block_number;
                        t.gas_used = Some(gas_used);
                        t.gas_price = Some(gas_price);
                        t.actual_amount_in = Some(quote.amount_in);
                        t.actual_amount_out = actual_out;
                        t.execution_price = actual_out.map(|out| out / quote.amount_in);
                        t.slippage = actual_out.map(|out| realized_slippage(quote.amount_out, out));
                        t.fees = Some(quote.fees);
                        t.executed_at = Some(Utc::now());
                        t.advance(TradeStatus::Completed)
                    })
                    .await;
                info!(trade_id = %trade_id, "✅ Trade completed: {:?} {} received", actual_out, quote.token_out);
            }
            MonitorOutcome::Reverted { block_number, gas_used, reason } => {
                self.registry
                    .update(trade_id, |t| {
                        t.block_number = block_number;
                        t.gas_used = Some(gas_used);
                        t.fail(FailureKind::Reverted, reason.clone())
                    })
                    .await;
                error!(trade_id = %trade_id, "❌ Trade failed on-chain: {}", reason);
            }
            MonitorOutcome::TimedOut { attempts } => {
                let reason = format!(
                    "Transaction monitoring timeout after {} checks; outcome unknown, verify {} on-chain",
                    attempts, tx_hash
                );
                self.fail(trade_id, FailureKind::MonitoringTimeout, &reason).await;
            }
            MonitorOutcome::Aborted => {
                let reason = format!("Monitoring stopped by shutdown; verify {} on-chain", tx_hash);
                self.fail(trade_id, FailureKind::MonitoringAborted, &reason).await;
            }
        }
    }

    fn validate(&self, signal: &TradingSignal, max_slippage: Decimal) -> Result<(), String> {
        if signal.signal_type == SignalType::Hold {
            return Err("HOLD signals are not executable".to_string());
        }
        if signal.token_in.trim().is_empty() || signal.token_out.trim().is_empty() {
            return Err("token_in and token_out are required".to_string());
        }
        if signal.token_in.eq_ignore_ascii_case(&signal.token_out) {
            return Err(format!("Cannot swap {} for itself", signal.token_in));
        }
        if signal.amount <= Decimal::ZERO {
            return Err(format!("Trade amount must be positive, got {}", signal.amount));
        }
        if signal.amount < self.settings.min_trade_amount {
            return Err(format!(
                "Trade amount {} below minimum {}",
                signal.amount, self.settings.min_trade_amount
            ));
        }
        if !(0.0..=1.0).contains(&signal.confidence) {
            return Err(format!("Confidence {} outside [0, 1]", signal.confidence));
        }
        if max_slippage < Decimal::ZERO || max_slippage > dec!(1) {
            return Err(format!("Max slippage {} outside [0, 1]", max_slippage));
        }
        Ok(())
    }

    async fn fail(&self, trade_id: &str, kind: FailureKind, reason: &str) {
        let changed = self.registry.update(trade_id, |t| t.fail(kind, reason)).await;
        if changed == Some(true) {
            warn!(trade_id = %trade_id, failure = ?kind, "⚠️ Trade failed: {}", reason);
        }
    }

    async fn snapshot(&self, trade_id: &str, accepted: &TradeExecution) -> TradeExecution {
        self.registry.get(trade_id).await.unwrap_or_else(|| {
            // Finished and already evicted by a tight retention bound.
            warn!(trade_id = %trade_id, "⚠️ Trade record evicted before it could be returned");
            accepted.clone()
        })
    }

    /// Bookkeeping-only cancel. Allowed while the trade is still PENDING,
    /// i.e. before anything has been sent to the chain.
    pub async fn cancel_trade(&self, trade_id: &str) -> bool {
        let cancelled = self
            .registry
            .update(trade_id, |t| t.advance(TradeStatus::Cancelled))
            .await
            .unwrap_or(false);
        if cancelled {
            info!(trade_id = %trade_id, "🛑 Trade cancelled");
        }
        cancelled
    }

    pub async fn get_trade_status(&self, trade_id: &str) -> Option<TradeExecution> {
        self.registry.get(trade_id).await
    }

    pub async fn list_active_trades(&self) -> Vec<TradeExecution> {
        self.registry.active().await
    }

    pub async fn get_trade_history(&self, limit: usize) -> Vec<TradeExecution> {
        self.registry.history(limit).await
    }

    /// Stops in-flight monitors at their next checkpoint.
    pub fn shutdown(&self) {
        info!("📛 Trade engine shutting down");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

fn realized_slippage(expected: Decimal, actual: Decimal) -> Decimal {
    if expected <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((expected - actual) / expected).max(Decimal::ZERO).round_dp(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TxStatus;
    use crate::network::{TokenTransfer, TransferKind};
    use crate::testing::{sample_quote, sample_signal, sell_signal, MockAdapter, MockChain};
    use crate::execution::approval::ApprovalSettings;
    use crate::types::{USDC_ETHEREUM, WETH_ETHEREUM};
    use alloy::primitives::U256;

    const WALLET: Address = Address::repeat_byte(0x11);

    fn live_settings() -> EngineSettings {
        EngineSettings { wallet: Some(WALLET), ..Default::default() }
    }

    async fn engine_with(settings: EngineSettings, adapters: Vec<Arc<MockAdapter>>) -> TradeExecutionEngine {
        let engine = TradeExecutionEngine::new(settings);
        for adapter in adapters {
            let name = adapter.name().to_string();
            engine.register_adapter(&name, adapter).await;
        }
        engine
    }

    fn usdc_received(amount: u64) -> TxStatus {
        TxStatus::Success {
            block_number: Some(19_000_001),
            gas_used: 131_000,
            gas_price: 20_000_000_000,
            transfers: vec![TokenTransfer {
                kind: TransferKind::Token,
                token: USDC_ETHEREUM,
                from: Address::repeat_byte(0x33),
                to: WALLET,
                value: U256::from(amount),
            }],
        }
    }

    #[tokio::test]
    async fn dry_run_fills_from_the_best_quote() {
        let a = Arc::new(MockAdapter::new("ExA").with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000)));
        let b = Arc::new(MockAdapter::new("ExB").with_quote(sample_quote("ExB", dec!(1610), dec!(20), 150_000)));
        let engine = engine_with(EngineSettings::default(), vec![a.clone(), b.clone()]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::dry_run()).await.unwrap();

        assert_eq!(execution.status, TradeStatus::Completed);
        assert_eq!(execution.exchange, "ExA");
        assert_eq!(execution.actual_amount_out, Some(dec!(1600)));
        assert_eq!(execution.fees, Some(dec!(5)));
        assert!(execution.dry_run);
        assert!(execution.transaction_hash.is_none());
        assert_eq!(a.executions() + b.executions(), 0);
    }

    #[tokio::test]
    async fn best_quote_can_be_restricted_to_named_venues() {
        let a = Arc::new(MockAdapter::new("ExA").with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000)));
        let b = Arc::new(MockAdapter::new("ExB").with_quote(sample_quote("ExB", dec!(1610), dec!(20), 150_000)));
        let c = Arc::new(MockAdapter::new("ExC").with_quote(sample_quote("ExC", dec!(1500), dec!(1), 150_000)));
        let engine = engine_with(EngineSettings::default(), vec![a.clone(), b.clone(), c.clone()]).await;

        let overall = engine.get_best_quote("ETH", "USDC", dec!(1), None).await.unwrap();
        assert_eq!(overall.exchange, "ExA");

        let restricted = engine
            .get_best_quote("ETH", "USDC", dec!(1), Some(&["exb", "curve", "exc"][..]))
            .await
            .unwrap();
        assert_eq!(restricted.exchange, "ExB");
        assert_eq!(a.quote_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        assert!(engine.get_best_quote("ETH", "USDC", dec!(1), Some(&["curve"][..])).await.is_none());
    }

    #[tokio::test]
    async fn excessive_slippage_fails_without_touching_the_chain() {
        let mut quote = sample_quote("ExA", dec!(1600), dec!(5), 150_000);
        quote.slippage_estimate = dec!(0.012);
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(quote));
        let engine = engine_with(live_settings(), vec![adapter.clone()]).await;

        let request = ExecutionRequest { max_slippage: Some(dec!(0.005)), ..Default::default() };
        let execution = engine.execute_signal(sample_signal(), request).await.unwrap();

        assert_eq!(execution.status, TradeStatus::Failed);
        assert_eq!(execution.failure_kind, Some(FailureKind::SlippageExceeded));
        assert!(execution.error_message.unwrap().contains("Slippage too high: 1.20% > 0.50%"));
        assert_eq!(adapter.executions(), 0);
    }

    #[tokio::test]
    async fn unknown_exchange_is_an_error_but_still_recorded() {
        let engine = engine_with(EngineSettings::default(), vec![]).await;

        let result = engine.execute_signal(sample_signal(), ExecutionRequest::on("curve")).await;
        assert!(matches!(result, Err(EngineError::UnknownExchange(ref name)) if name == "curve"));

        let history = engine.get_trade_history(50).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, TradeStatus::Failed);
        assert_eq!(history[0].failure_kind, Some(FailureKind::UnknownExchange));
        assert_eq!(history[0].error_message.as_deref(), Some("Exchange curve not available"));
    }

    #[tokio::test]
    async fn hold_signals_are_rejected() {
        let engine = engine_with(EngineSettings::default(), vec![]).await;
        let mut signal = sample_signal();
        signal.signal_type = SignalType::Hold;

        let result = engine.execute_signal(signal, ExecutionRequest::dry_run()).await;
        assert!(matches!(result, Err(EngineError::InvalidSignal(_))));
        assert_eq!(engine.get_trade_history(10).await[0].failure_kind, Some(FailureKind::InvalidSignal));
    }

    #[tokio::test]
    async fn missing_quotes_fail_the_trade() {
        let adapter = Arc::new(MockAdapter::new("ExA"));
        let engine = engine_with(live_settings(), vec![adapter]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::default()).await.unwrap();
        assert_eq!(execution.failure_kind, Some(FailureKind::QuoteUnavailable));
        assert!(engine.list_active_trades().await.is_empty());
    }

    #[tokio::test]
    async fn expired_quote_from_a_named_venue_is_refused() {
        let mut quote = sample_quote("ExA", dec!(1600), dec!(5), 150_000);
        quote.valid_until = Utc::now() - chrono::Duration::seconds(5);
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(quote));
        let engine = engine_with(live_settings(), vec![adapter.clone()]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::on("ExA")).await.unwrap();
        assert_eq!(execution.failure_kind, Some(FailureKind::QuoteExpired));
        assert_eq!(adapter.executions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn live_buy_completes_with_amount_from_logs() {
        let adapter = Arc::new(
            MockAdapter::new("ExA")
                .with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000))
                .settling_to(usdc_received(1_598_000_000)),
        );
        adapter.push_status(Ok(TxStatus::Pending));
        let engine = engine_with(live_settings(), vec![adapter.clone()]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::default()).await.unwrap();

        assert_eq!(execution.status, TradeStatus::Completed);
        assert_eq!(execution.actual_amount_out, Some(dec!(1598)));
        assert_eq!(execution.execution_price, Some(dec!(1598)));
        assert_eq!(execution.slippage, Some(dec!(0.00125)));
        assert_eq!(execution.block_number, Some(19_000_001));
        assert_eq!(execution.gas_used, Some(131_000));
        assert!(execution.transaction_hash.is_some());
        assert!(!execution.dry_run);
        assert_eq!(adapter.executions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn live_sell_approves_the_token_first() {
        let chain = Arc::new(MockChain::new());
        chain.set_token_balance(USDC_ETHEREUM, U256::from(5_000_000_000u64));
        let approvals = Arc::new(ApprovalWorkflow::new(chain.clone(), ApprovalSettings::default()));

        let mut quote = sample_quote("ExA", dec!(0.62), dec!(0.00186), 200_000);
        quote.token_in = "USDC".into();
        quote.token_out = "ETH".into();
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(quote).settling_to(TxStatus::Success {
            block_number: Some(5),
            gas_used: 150_000,
            gas_price: 1,
            transfers: vec![TokenTransfer {
                kind: TransferKind::Unwrap,
                token: WETH_ETHEREUM,
                from: Address::repeat_byte(0x22),
                to: Address::ZERO,
                value: U256::from(619_000_000_000_000_000u128),
            }],
        }));

        let engine = engine_with(live_settings(), vec![adapter.clone()]).await.with_approvals(approvals);
        let execution = engine.execute_signal(sell_signal("USDC", dec!(1000)), ExecutionRequest::default()).await.unwrap();

        assert_eq!(execution.status, TradeStatus::Completed);
        assert_eq!(execution.actual_amount_out, Some(dec!(0.619)));
        assert_eq!(chain.approvals_submitted(), 1);
    }

    #[tokio::test]
    async fn short_token_balance_is_not_an_approval_failure() {
        let chain = Arc::new(MockChain::new());
        chain.set_token_balance(USDC_ETHEREUM, U256::from(1u64));
        let approvals = Arc::new(ApprovalWorkflow::new(chain.clone(), ApprovalSettings::default()));

        let mut quote = sample_quote("ExA", dec!(0.62), dec!(0.00186), 200_000);
        quote.token_in = "USDC".into();
        quote.token_out = "ETH".into();
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(quote));
        let engine = engine_with(live_settings(), vec![adapter.clone()]).await.with_approvals(approvals);

        let execution = engine.execute_signal(sell_signal("USDC", dec!(1000)), ExecutionRequest::default()).await.unwrap();
        assert_eq!(execution.status, TradeStatus::Failed);
        assert_eq!(execution.failure_kind, Some(FailureKind::InsufficientBalance));
        assert!(execution.error_message.unwrap().contains("Insufficient USDC balance"));
        assert_eq!(chain.approvals_submitted(), 0);
        assert_eq!(adapter.executions(), 0);
    }

    #[tokio::test]
    async fn low_gas_balance_is_reported_as_insufficient_funds() {
        let chain = Arc::new(MockChain::new());
        chain.set_token_balance(USDC_ETHEREUM, U256::from(5_000_000_000u64));
        chain.set_native_balance(U256::ZERO);
        let approvals = Arc::new(ApprovalWorkflow::new(chain, ApprovalSettings::default()));

        let mut quote = sample_quote("ExA", dec!(0.62), dec!(0.00186), 200_000);
        quote.token_in = "USDC".into();
        quote.token_out = "ETH".into();
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(quote));
        let engine = engine_with(live_settings(), vec![adapter]).await.with_approvals(approvals);

        let execution = engine.execute_signal(sell_signal("USDC", dec!(1000)), ExecutionRequest::default()).await.unwrap();
        assert_eq!(execution.failure_kind, Some(FailureKind::InsufficientFunds));
    }

    #[tokio::test]
    async fn token_sale_without_approval_support_fails() {
        let mut quote = sample_quote("ExA", dec!(0.62), dec!(0.00186), 200_000);
        quote.token_in = "USDC".into();
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(quote));
        let engine = engine_with(live_settings(), vec![adapter.clone()]).await;

        let execution = engine.execute_signal(sell_signal("USDC", dec!(1000)), ExecutionRequest::default()).await.unwrap();
        assert_eq!(execution.failure_kind, Some(FailureKind::Approval));
        assert_eq!(adapter.executions(), 0);
    }

    #[tokio::test]
    async fn submission_errors_fail_without_a_hash() {
        let adapter = Arc::new(
            MockAdapter::new("ExA")
                .with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000))
                .failing_execution("insufficient funds for gas"),
        );
        let engine = engine_with(live_settings(), vec![adapter]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::default()).await.unwrap();
        assert_eq!(execution.failure_kind, Some(FailureKind::Execution));
        assert!(execution.transaction_hash.is_none());
        assert!(execution.error_message.unwrap().contains("insufficient funds"));
    }

    #[tokio::test(start_paused = true)]
    async fn revert_is_reported_distinctly_from_timeout() {
        let adapter = Arc::new(
            MockAdapter::new("ExA")
                .with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000))
                .settling_to(TxStatus::Failed { block_number: Some(9), gas_used: 40_000, reason: "Transaction reverted".into() }),
        );
        let engine = engine_with(live_settings(), vec![adapter]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::default()).await.unwrap();
        assert_eq!(execution.failure_kind, Some(FailureKind::Reverted));
        assert!(!execution.failure_kind.unwrap().outcome_unknown());
        assert!(execution.transaction_hash.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn monitoring_timeout_keeps_the_hash_for_manual_checks() {
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000)));
        let engine = engine_with(live_settings(), vec![adapter.clone()]).await;

        let started = tokio::time::Instant::now();
        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::default()).await.unwrap();

        assert_eq!(execution.status, TradeStatus::Failed);
        assert_eq!(execution.failure_kind, Some(FailureKind::MonitoringTimeout));
        let hash = execution.transaction_hash.unwrap();
        assert!(execution.error_message.unwrap().contains(&hash));
        assert_eq!(started.elapsed(), Duration::from_secs(300));
        assert_eq!(adapter.status_calls.load(std::sync::atomic::Ordering::SeqCst), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_monitoring() {
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000)));
        let engine = Arc::new(engine_with(live_settings(), vec![adapter]).await);

        let running = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.execute_signal(sample_signal(), ExecutionRequest::default()).await })
        };
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(engine.list_active_trades().await[0].status, TradeStatus::Confirmed);

        engine.shutdown();
        let execution = running.await.unwrap().unwrap();
        assert_eq!(execution.failure_kind, Some(FailureKind::MonitoringAborted));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_trades_can_be_cancelled_before_submission() {
        let adapter = Arc::new(
            MockAdapter::new("ExA")
                .with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000))
                .with_quote_delay(Duration::from_secs(3)),
        );
        let engine = Arc::new(engine_with(live_settings(), vec![adapter.clone()]).await);

        let running = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.execute_signal(sample_signal(), ExecutionRequest::default()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let active = engine.list_active_trades().await;
        assert_eq!(active.len(), 1);
        assert!(engine.cancel_trade(&active[0].trade_id).await);

        let execution = running.await.unwrap().unwrap();
        assert_eq!(execution.status, TradeStatus::Cancelled);
        assert_eq!(adapter.executions(), 0);
        assert!(!engine.cancel_trade(&execution.trade_id).await);
    }

    #[tokio::test]
    async fn cancel_of_unknown_or_finished_trade_fails() {
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000)));
        let engine = engine_with(EngineSettings::default(), vec![adapter]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::dry_run()).await.unwrap();
        assert!(!engine.cancel_trade(&execution.trade_id).await);
        assert!(!engine.cancel_trade("trade_missing").await);
        assert_eq!(engine.get_trade_status(&execution.trade_id).await.unwrap().status, TradeStatus::Completed);
    }

    #[tokio::test]
    async fn bypass_setting_forces_simulation() {
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000)));
        let settings = EngineSettings { bypass_execution: true, ..live_settings() };
        let engine = engine_with(settings, vec![adapter.clone()]).await;

        let execution = engine.execute_signal(sample_signal(), ExecutionRequest::default()).await.unwrap();
        assert!(execution.dry_run);
        assert_eq!(adapter.executions(), 0);
    }

    #[tokio::test]
    async fn trade_ids_are_unique() {
        let adapter = Arc::new(MockAdapter::new("ExA").with_quote(sample_quote("ExA", dec!(1600), dec!(5), 150_000)));
        let engine = engine_with(EngineSettings::default(), vec![adapter]).await;

        let mut ids = std::collections::HashSet::new();
        for _ in 0..20 {
            let execution = engine.execute_signal(sample_signal(), ExecutionRequest::dry_run()).await.unwrap();
            assert!(ids.insert(execution.trade_id));
        }
    }
}
