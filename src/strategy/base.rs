//! Strategy contract and the risk checks every strategy shares

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use crate::types::{MarketData, PortfolioPosition, SignalType, TradingSignal};

/// A producer of trade intents. Implementations keep their own history, so
/// `analyze` takes `&mut self`.
pub trait Strategy: Send {
    fn id(&self) -> &str;

    fn analyze(&mut self, market_data: &[MarketData]) -> Option<TradingSignal>;

    fn validate_signal(&self, signal: &TradingSignal, portfolio: &[PortfolioPosition]) -> bool;

    /// Symbols the strategy wants market data for.
    fn required_data(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Signals below this confidence are rejected.
    pub min_confidence: f64,
    /// In units of the traded token.
    pub max_position_size: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            max_position_size: dec!(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy_id: String,
    pub enabled: bool,
    pub risk_limits: RiskLimits,
    /// Strategy-specific tuning, looked up by name with a default per key.
    pub parameters: HashMap<String, serde_json::Value>,
}

impl StrategyConfig {
    pub fn new(strategy_id: &str) -> Self {
        Self {
            strategy_id: strategy_id.to_string(),
            enabled: true,
            risk_limits: RiskLimits::default(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn f64_param(&self, key: &str, default: f64) -> f64 {
        self.parameters.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    pub fn usize_param(&self, key: &str, default: usize) -> usize {
        self.parameters
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn string_param(&self, key: &str, default: &str) -> String {
        self.parameters
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }

    pub fn list_param(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.parameters.get(key).and_then(|v| v.as_array()) {
            Some(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Checks shared by every strategy. An empty portfolio means holdings are
/// unknown, in which case SELL size is not checked against them.
pub fn check_risk_limits(signal: &TradingSignal, portfolio: &[PortfolioPosition], limits: &RiskLimits) -> bool {
    if signal.confidence < limits.min_confidence {
        info!(
            "Signal confidence {:.3} below minimum {:.3}",
            signal.confidence, limits.min_confidence
        );
        return false;
    }

    if signal.amount <= Decimal::ZERO || signal.amount > limits.max_position_size {
        info!(
            "Signal amount {} outside position limit {}",
            signal.amount, limits.max_position_size
        );
        return false;
    }

    if signal.signal_type == SignalType::Sell && !portfolio.is_empty() {
        let held = portfolio
            .iter()
            .filter(|p| p.symbol.eq_ignore_ascii_case(&signal.token_in))
            .map(|p| p.amount)
            .sum::<Decimal>();
        if held < signal.amount {
            info!("Cannot sell {} {}: only {} held", signal.amount, signal.token_in, held);
            return false;
        }
    }

    true
}
