//! Trading signals and the market data strategies consume

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
        }
    }
}

/// An intent to trade, produced by one strategy evaluation. Not yet priced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_type: SignalType,
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub strategy_id: String,
    pub reason: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TradingSignal {
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.as_f64())
    }

    /// The non-quote side of the trade: what a BUY acquires or a SELL disposes of.
    pub fn traded_token(&self) -> &str {
        match self.signal_type {
            SignalType::Sell => &self.token_in,
            _ => &self.token_out,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub price: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub symbol: String,
    pub amount: Decimal,
    pub value_usd: Decimal,
}
