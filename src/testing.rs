//! In-crate fakes for the chain and exchange seams

use alloy::{
    primitives::{keccak256, Address, Bytes, TxHash, U256},
    rpc::types::eth::TransactionRequest,
    sol_types::SolCall,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use crate::{
    adapters::{ExchangeAdapter, TxStatus},
    errors::{EngineError, EngineResult},
    network::{abi::IERC20, ChainClient, ReceiptSummary},
    types::{Network, SignalType, TradeQuote, TradingSignal},
};

pub fn sample_signal() -> TradingSignal {
    let mut metadata = HashMap::new();
    metadata.insert("momentum_score".to_string(), serde_json::json!(0.2));
    TradingSignal {
        signal_type: SignalType::Buy,
        token_in: "ETH".to_string(),
        token_out: "USDC".to_string(),
        amount: dec!(1),
        confidence: 0.8,
        timestamp: Utc::now(),
        strategy_id: "momentum".to_string(),
        reason: "test signal".to_string(),
        metadata,
    }
}

pub fn sell_signal(token: &str, amount: Decimal) -> TradingSignal {
    TradingSignal {
        signal_type: SignalType::Sell,
        token_in: token.to_string(),
        token_out: "ETH".to_string(),
        amount,
        ..sample_signal()
    }
}

pub fn sample_quote(exchange: &str, amount_out: Decimal, fees: Decimal, gas_estimate: u64) -> TradeQuote {
    TradeQuote {
        exchange: exchange.to_string(),
        token_in: "ETH".to_string(),
        token_out: "USDC".to_string(),
        amount_in: dec!(1),
        amount_out,
        price: amount_out,
        gas_estimate,
        slippage_estimate: dec!(0.001),
        fees,
        valid_until: Utc::now() + Duration::seconds(300),
        route: vec!["ETH".to_string(), "USDC".to_string()],
    }
}

type CallHandler = Box<dyn Fn(&[u8]) -> EngineResult<Vec<u8>> + Send + Sync>;

/// Scriptable chain. Submitted transactions are mined immediately unless
/// `auto_mine` is switched off; a mined `approve` updates the allowance.
pub struct MockChain {
    network: Network,
    signer: Option<Address>,
    native_balance: Mutex<U256>,
    token_balances: Mutex<HashMap<Address, U256>>,
    allowances: Mutex<HashMap<(Address, Address), U256>>,
    invalid_tokens: Mutex<Vec<Address>>,
    gas_price: Mutex<u128>,
    submitted: Mutex<Vec<(TxHash, TransactionRequest)>>,
    receipts: Mutex<HashMap<TxHash, ReceiptSummary>>,
    call_handlers: Mutex<HashMap<[u8; 4], CallHandler>>,
    pub auto_mine: AtomicBool,
    pub revert_submissions: AtomicBool,
    pub receipt_lookups: AtomicU32,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            network: Network::Ethereum,
            signer: Some(Address::repeat_byte(0x11)),
            native_balance: Mutex::new(U256::from(10u64).pow(U256::from(18u64))),
            token_balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            invalid_tokens: Mutex::new(Vec::new()),
            gas_price: Mutex::new(20_000_000_000),
            submitted: Mutex::new(Vec::new()),
            receipts: Mutex::new(HashMap::new()),
            call_handlers: Mutex::new(HashMap::new()),
            auto_mine: AtomicBool::new(true),
            revert_submissions: AtomicBool::new(false),
            receipt_lookups: AtomicU32::new(0),
        }
    }

    pub fn on_call<F>(&self, selector: [u8; 4], handler: F)
    where
        F: Fn(&[u8]) -> EngineResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.call_handlers.lock().unwrap().insert(selector, Box::new(handler));
    }

    pub fn set_native_balance(&self, wei: U256) {
        *self.native_balance.lock().unwrap() = wei;
    }

    pub fn set_token_balance(&self, token: Address, amount: U256) {
        self.token_balances.lock().unwrap().insert(token, amount);
    }

    pub fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        self.allowances.lock().unwrap().insert((token, spender), amount);
    }

    pub fn mark_invalid_token(&self, token: Address) {
        self.invalid_tokens.lock().unwrap().push(token);
    }

    pub fn set_gas_price(&self, wei: u128) {
        *self.gas_price.lock().unwrap() = wei;
    }

    pub fn submitted(&self) -> Vec<TransactionRequest> {
        self.submitted.lock().unwrap().iter().map(|(_, tx)| tx.clone()).collect()
    }

    pub fn submitted_hashes(&self) -> Vec<TxHash> {
        self.submitted.lock().unwrap().iter().map(|(hash, _)| *hash).collect()
    }

    pub fn approvals_submitted(&self) -> usize {
        self.submitted()
            .iter()
            .filter(|tx| {
                tx.input
                    .input()
                    .map(|data| data.starts_with(&IERC20::approveCall::SELECTOR))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Mines a pending transaction after the fact.
    pub fn mine(&self, tx_hash: TxHash, success: bool) {
        let tx = {
            let submitted = self.submitted.lock().unwrap();
            submitted.iter().find(|(hash, _)| *hash == tx_hash).map(|(_, tx)| tx.clone())
        };
        if let (Some(tx), true) = (tx, success) {
            self.apply_effects(&tx);
        }
        self.receipts.lock().unwrap().insert(tx_hash, Self::receipt(tx_hash, success));
    }

    fn receipt(tx_hash: TxHash, success: bool) -> ReceiptSummary {
        ReceiptSummary {
            tx_hash,
            success,
            block_number: Some(19_000_000),
            gas_used: 120_000,
            effective_gas_price: 20_000_000_000,
            logs: vec![],
        }
    }

    fn apply_effects(&self, tx: &TransactionRequest) {
        let Some(token) = tx.to.and_then(|k| k.to().copied()) else { return };
        let Some(data) = tx.input.input() else { return };
        if let Ok(call) = IERC20::approveCall::abi_decode(data, true) {
            self.set_allowance(token, call.spender, call.amount);
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn network(&self) -> Network {
        self.network
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn native_balance(&self, _owner: Address) -> EngineResult<U256> {
        Ok(*self.native_balance.lock().unwrap())
    }

    async fn call(&self, tx: TransactionRequest) -> EngineResult<Bytes> {
        let data = tx.input.input().cloned().unwrap_or_default();
        let handlers = self.call_handlers.lock().unwrap();
        let selector: [u8; 4] = data.get(..4).and_then(|s| s.try_into().ok()).unwrap_or_default();
        match handlers.get(&selector) {
            Some(handler) => handler(&data).map(Bytes::from),
            None => Err(EngineError::Contract {
                contract: tx.to.and_then(|k| k.to().copied()).unwrap_or_default(),
                message: "execution reverted".to_string(),
                source: anyhow::anyhow!("no handler for selector {:?}", selector),
            }),
        }
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> EngineResult<u64> {
        Ok(140_000)
    }

    async fn gas_price(&self) -> EngineResult<u128> {
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn submit_transaction(&self, tx: TransactionRequest) -> EngineResult<TxHash> {
        let hash = {
            let mut submitted = self.submitted.lock().unwrap();
            let hash = keccak256(format!("{}:{:?}", submitted.len(), tx).as_bytes());
            submitted.push((hash, tx));
            hash
        };
        if self.auto_mine.load(Ordering::SeqCst) {
            let success = !self.revert_submissions.load(Ordering::SeqCst);
            self.mine(hash, success);
        }
        Ok(hash)
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> EngineResult<Option<ReceiptSummary>> {
        self.receipt_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.receipts.lock().unwrap().get(&tx_hash).cloned())
    }

    async fn token_balance(&self, token: Address, _owner: Address) -> EngineResult<U256> {
        if self.invalid_tokens.lock().unwrap().contains(&token) {
            return Err(EngineError::Contract {
                contract: token,
                message: "balanceOf reverted".to_string(),
                source: anyhow::anyhow!("execution reverted"),
            });
        }
        Ok(self.token_balances.lock().unwrap().get(&token).copied().unwrap_or_default())
    }

    async fn allowance(&self, token: Address, _owner: Address, spender: Address) -> EngineResult<U256> {
        Ok(self.allowances.lock().unwrap().get(&(token, spender)).copied().unwrap_or_default())
    }
}

/// Scriptable venue with call counters.
pub struct MockAdapter {
    name: String,
    network: Network,
    spender: Address,
    quote: Mutex<Option<TradeQuote>>,
    quote_delay: Mutex<Option<std::time::Duration>>,
    fail_quotes: AtomicBool,
    execute_error: Mutex<Option<String>>,
    statuses: Mutex<VecDeque<EngineResult<TxStatus>>>,
    final_status: Mutex<TxStatus>,
    pub quote_calls: AtomicU32,
    pub execute_calls: AtomicU32,
    pub status_calls: AtomicU32,
}

impl MockAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            network: Network::Ethereum,
            spender: Address::repeat_byte(0x22),
            quote: Mutex::new(None),
            quote_delay: Mutex::new(None),
            fail_quotes: AtomicBool::new(false),
            execute_error: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            final_status: Mutex::new(TxStatus::Pending),
            quote_calls: AtomicU32::new(0),
            execute_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
        }
    }

    pub fn with_quote(self, quote: TradeQuote) -> Self {
        *self.quote.lock().unwrap() = Some(quote);
        self
    }

    pub fn with_quote_delay(self, delay: std::time::Duration) -> Self {
        *self.quote_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn failing_quotes(self) -> Self {
        self.fail_quotes.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_execution(self, message: &str) -> Self {
        *self.execute_error.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Status returned once the scripted sequence is exhausted.
    pub fn settling_to(self, status: TxStatus) -> Self {
        *self.final_status.lock().unwrap() = status;
        self
    }

    pub fn push_status(&self, status: EngineResult<TxStatus>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn executions(&self) -> u32 {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn network(&self) -> Network {
        self.network
    }

    fn spender(&self) -> Address {
        self.spender
    }

    async fn get_quote(&self, token_in: &str, token_out: &str, amount_in: Decimal) -> EngineResult<Option<TradeQuote>> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.quote_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_quotes.load(Ordering::SeqCst) {
            return Err(EngineError::network("quote", anyhow::anyhow!("connection refused")));
        }
        let quote = self.quote.lock().unwrap().clone();
        Ok(quote.map(|mut q| {
            q.exchange = self.name.clone();
            q.token_in = token_in.to_uppercase();
            q.token_out = token_out.to_uppercase();
            q.amount_in = amount_in;
            q
        }))
    }

    async fn execute_trade(&self, _quote: &TradeQuote, _wallet: Address, _max_slippage: Decimal) -> EngineResult<String> {
        let call = self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.execute_error.lock().unwrap().clone() {
            return Err(EngineError::Network { message, source: None, retry_count: 0 });
        }
        Ok(format!("0x{:064x}", call + 1))
    }

    async fn get_transaction_status(&self, _tx_hash: &str) -> EngineResult<TxStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.statuses.lock().unwrap().pop_front() {
            return next;
        }
        Ok(self.final_status.lock().unwrap().clone())
    }

    async fn estimate_gas(&self, quote: &TradeQuote) -> EngineResult<u64> {
        Ok(quote.gas_estimate)
    }
}
