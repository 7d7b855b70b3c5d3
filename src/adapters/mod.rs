//! Exchange adapters: one implementation per liquidity venue

pub mod uniswap_v2;
pub mod uniswap_v3;

pub use uniswap_v2::*;
pub use uniswap_v3::*;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use crate::{
    config::{Config, SWAP_DEADLINE_SECS},
    errors::{EngineError, EngineResult},
    network::{decode_transfers, ChainClient, ReceiptSummary, TokenTransfer},
    types::{lookup_token, Network, TokenInfo, TradeQuote},
};

/// On-chain state of a submitted swap as seen by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum TxStatus {
    Pending,
    Success {
        block_number: Option<u64>,
        gas_used: u64,
        gas_price: u128,
        transfers: Vec<TokenTransfer>,
    },
    Failed {
        block_number: Option<u64>,
        gas_used: u64,
        reason: String,
    },
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn network(&self) -> Network;

    /// Contract that pulls `token_in` from the wallet and therefore needs an allowance.
    fn spender(&self) -> Address;

    fn resolve_token(&self, symbol: &str) -> EngineResult<TokenInfo> {
        lookup_token(self.network(), symbol).ok_or_else(|| EngineError::UnknownToken {
            symbol: symbol.to_string(),
            network: self.network().to_string(),
        })
    }

    /// `Ok(None)` when the venue has no route for the pair.
    async fn get_quote(&self, token_in: &str, token_out: &str, amount_in: Decimal) -> EngineResult<Option<TradeQuote>>;

    /// Submits the swap and returns the transaction hash. Does not wait for inclusion.
    async fn execute_trade(&self, quote: &TradeQuote, wallet: Address, max_slippage: Decimal) -> EngineResult<String>;

    async fn get_transaction_status(&self, tx_hash: &str) -> EngineResult<TxStatus>;

    async fn estimate_gas(&self, quote: &TradeQuote) -> EngineResult<u64>;
}

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub max_gas_price_gwei: u64,
    pub quote_validity_secs: u64,
    pub deadline_secs: u64,
}

impl AdapterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_gas_price_gwei: config.max_gas_price_gwei as u64,
            quote_validity_secs: config.quote_validity_secs,
            deadline_secs: SWAP_DEADLINE_SECS,
        }
    }
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            max_gas_price_gwei: crate::config::DEFAULT_GAS_PRICE_GWEI as u64,
            quote_validity_secs: crate::config::DEFAULT_QUOTE_VALIDITY_SECS,
            deadline_secs: SWAP_DEADLINE_SECS,
        }
    }
}

/// Adapters keyed by venue name.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ExchangeAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any adapter already registered under `name`.
    pub fn register(&mut self, name: &str, adapter: Arc<dyn ExchangeAdapter>) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.insert(name.to_lowercase(), adapter)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.get(&name.to_lowercase()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn all(&self) -> Vec<Arc<dyn ExchangeAdapter>> {
        self.adapters.values().cloned().collect()
    }

    /// Adapters for the given venue names. Unregistered names are skipped.
    pub fn select(&self, names: &[&str]) -> Vec<Arc<dyn ExchangeAdapter>> {
        let mut selected: Vec<Arc<dyn ExchangeAdapter>> = Vec::new();
        for name in names {
            match self.get(name) {
                Some(adapter) if !selected.iter().any(|a| Arc::ptr_eq(a, &adapter)) => selected.push(adapter),
                Some(_) => {}
                None => warn!("⚠️ Skipping unregistered exchange {}", name),
            }
        }
        selected
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Builds every enabled adapter that has a deployment on the client's network.
pub fn build_adapters(chain: Arc<dyn ChainClient>, config: &Config) -> AdapterRegistry {
    let settings = AdapterSettings::from_config(config);
    let mut registry = AdapterRegistry::new();

    for name in &config.enabled_exchanges {
        let adapter: EngineResult<Arc<dyn ExchangeAdapter>> = match name.as_str() {
            "uniswap_v2" | "sushiswap" => UniswapV2Adapter::new(name, chain.clone(), settings.clone())
                .map(|a| Arc::new(a) as Arc<dyn ExchangeAdapter>),
            "uniswap_v3" => UniswapV3Adapter::new(chain.clone(), settings.clone())
                .map(|a| Arc::new(a) as Arc<dyn ExchangeAdapter>),
            other => Err(EngineError::UnknownExchange(other.to_string())),
        };

        match adapter {
            Ok(adapter) => {
                registry.register(name, adapter);
            }
            Err(e) => warn!("⚠️ Skipping exchange {}: {}", name, e),
        }
    }

    registry
}

pub(crate) fn parse_tx_hash(tx_hash: &str) -> EngineResult<TxHash> {
    TxHash::from_str(tx_hash).map_err(|e| EngineError::Contract {
        contract: Address::ZERO,
        message: format!("Malformed transaction hash {}", tx_hash),
        source: e.into(),
    })
}

pub(crate) fn tx_status_from_receipt(receipt: Option<ReceiptSummary>) -> TxStatus {
    match receipt {
        None => TxStatus::Pending,
        Some(r) if r.success => TxStatus::Success {
            block_number: r.block_number,
            gas_used: r.gas_used,
            gas_price: r.effective_gas_price,
            transfers: decode_transfers(&r.logs),
        },
        Some(r) => TxStatus::Failed {
            block_number: r.block_number,
            gas_used: r.gas_used,
            reason: "Transaction reverted".to_string(),
        },
    }
}

/// Current gas price, refusing to proceed above the configured ceiling.
pub(crate) async fn checked_gas_price(chain: &dyn ChainClient, max_gwei: u64) -> EngineResult<u128> {
    let gas_price = chain.gas_price().await?;
    let max_wei = max_gwei as u128 * 1_000_000_000;
    if gas_price > max_wei {
        return Err(EngineError::GasPriceTooHigh {
            current_gwei: gas_price / 1_000_000_000,
            max_gwei: max_gwei as u128,
        });
    }
    Ok(gas_price)
}

pub(crate) fn swap_deadline(deadline_secs: u64) -> U256 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    U256::from(now + deadline_secs)
}

pub(crate) fn quote_valid_until(validity_secs: u64) -> chrono::DateTime<Utc> {
    Utc::now() + chrono::Duration::seconds(validity_secs as i64)
}
