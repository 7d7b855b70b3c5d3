//! Custom error types for the trade engine

use alloy::primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        retry_count: u32,
    },

    #[error("Contract interaction failed: {contract} - {message}")]
    Contract {
        contract: Address,
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: String, reason: String },

    #[error("Unknown token {symbol} on {network}")]
    UnknownToken { symbol: String, network: String },

    #[error("Exchange {0} not available")]
    UnknownExchange(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("No quotes available for {token_in} -> {token_out}")]
    QuoteUnavailable { token_in: String, token_out: String },

    #[error("Gas price too high: {current_gwei} gwei > {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u128, max_gwei: u128 },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn network(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        EngineError::Network {
            message: message.into(),
            source: Some(source.into()),
            retry_count: 0,
        }
    }

    /// True when the same call may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Network { .. } | EngineError::QuoteUnavailable { .. } | EngineError::GasPriceTooHigh { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
