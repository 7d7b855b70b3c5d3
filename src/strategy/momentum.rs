//! Momentum strategy: trend strength, moving-average crossover and volume

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};
use crate::{
    strategy::{check_risk_limits, trailing_mean, PriceHistory, Strategy, StrategyConfig},
    types::{MarketData, PortfolioPosition, SignalType, TradingSignal},
};

/// Share of the confidence contributed by each factor.
const MOMENTUM_WEIGHT: f64 = 0.4;
const CROSSOVER_WEIGHT: f64 = 0.3;
const VOLUME_WEIGHT: f64 = 0.3;
/// Current volume must beat the trailing average by this factor.
const VOLUME_SURGE_FACTOR: f64 = 1.2;
const MOMENTUM_SENSITIVITY: f64 = 10.0;

const DEFAULT_MONITORED_TOKENS: &[&str] = &["ETH", "BTC", "USDC", "USDT", "BNB", "ADA", "SOL", "DOT", "MATIC", "LINK"];

#[derive(Debug, Clone)]
pub struct MomentumParams {
    pub lookback_period: usize,
    pub momentum_threshold: f64,
    /// Absolute 24h volume floor in USD.
    pub volume_threshold: f64,
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub base_trade_amount: f64,
    pub min_trade_amount: f64,
    pub min_signal_interval: Duration,
    pub quote_token: String,
    pub monitored_tokens: Vec<String>,
}

impl MomentumParams {
    pub fn from_config(config: &StrategyConfig) -> Self {
        let short_ma_period = config.usize_param("short_ma_period", 5).max(1);
        Self {
            lookback_period: config.usize_param("lookback_period", 14).max(2),
            momentum_threshold: config.f64_param("momentum_threshold", 0.05),
            volume_threshold: config.f64_param("volume_threshold", 1_000_000.0),
            short_ma_period,
            long_ma_period: config.usize_param("long_ma_period", 20).max(short_ma_period + 1),
            base_trade_amount: config.f64_param("base_trade_amount", 0.1),
            min_trade_amount: config.f64_param("min_trade_amount", 0.01),
            min_signal_interval: Duration::seconds(config.f64_param("min_signal_interval", 3600.0) as i64),
            quote_token: config.string_param("quote_token", "ETH").to_uppercase(),
            monitored_tokens: config.list_param("monitored_tokens", DEFAULT_MONITORED_TOKENS),
        }
    }

    fn history_capacity(&self) -> usize {
        (self.long_ma_period * 2).max(50)
    }
}

pub struct MomentumStrategy {
    config: StrategyConfig,
    params: MomentumParams,
    history: HashMap<String, PriceHistory>,
    last_signals: HashMap<String, DateTime<Utc>>,
}

impl MomentumStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        let params = MomentumParams::from_config(&config);
        Self {
            config,
            params,
            history: HashMap::new(),
            last_signals: HashMap::new(),
        }
    }

    pub fn params(&self) -> &MomentumParams {
        &self.params
    }

    pub fn history(&self, symbol: &str) -> Option<&PriceHistory> {
        self.history.get(&symbol.to_uppercase())
    }

    /// `analyze` with an explicit clock.
    pub fn analyze_at(&mut self, market_data: &[MarketData], now: DateTime<Utc>) -> Option<TradingSignal> {
        self.update_history(market_data);

        for data in market_data {
            let symbol = data.symbol.to_uppercase();
            if symbol == self.params.quote_token {
                continue;
            }
            if let Some(last) = self.last_signals.get(&symbol) {
                if now - *last < self.params.min_signal_interval {
                    debug!("Skipping {}: last signal at {} is too recent", symbol, last);
                    continue;
                }
            }
            if let Some(signal) = self.evaluate(&symbol, data, now) {
                self.last_signals.insert(symbol, now);
                return Some(signal);
            }
        }
        None
    }

    fn update_history(&mut self, market_data: &[MarketData]) {
        let capacity = self.params.history_capacity();
        for data in market_data {
            self.history
                .entry(data.symbol.to_uppercase())
                .or_insert_with(|| PriceHistory::new(capacity))
                .push(data.price, data.volume_24h);
        }
    }

    fn evaluate(&self, symbol: &str, data: &MarketData, now: DateTime<Utc>) -> Option<TradingSignal> {
        let history = self.history.get(symbol)?;
        if history.len() < self.params.long_ma_period {
            return None;
        }

        let prices = history.prices();
        let momentum = momentum_score(&prices, self.params.lookback_period);
        let crossover = ma_crossover(&prices, self.params.short_ma_period, self.params.long_ma_period);
        let volume_ok = volume_confirmed(
            &history.volumes(),
            data.volume_24h,
            self.params.lookback_period,
            self.params.volume_threshold,
        );

        let signal_type = determine_signal_type(momentum, crossover, volume_ok, self.params.momentum_threshold);
        if signal_type == SignalType::Hold {
            return None;
        }

        let confidence = signal_confidence(momentum, crossover, volume_ok);
        let amount = trade_amount(self.params.base_trade_amount, confidence, momentum, self.params.min_trade_amount);

        let (token_in, token_out) = match signal_type {
            SignalType::Buy => (self.params.quote_token.clone(), symbol.to_string()),
            _ => (symbol.to_string(), self.params.quote_token.clone()),
        };

        let mut metadata = HashMap::new();
        metadata.insert("momentum_score".to_string(), serde_json::json!(momentum));
        metadata.insert("ma_signal".to_string(), serde_json::json!(crossover));
        metadata.insert("volume_confirmation".to_string(), serde_json::json!(volume_ok));
        metadata.insert("price".to_string(), serde_json::json!(data.price));
        metadata.insert("volume_24h".to_string(), serde_json::json!(data.volume_24h));

        let emoji = if signal_type == SignalType::Buy { "📈" } else { "📉" };
        info!(
            "{} Momentum {} signal for {}: score={:.3}, crossover={}, confidence={:.3}, amount={}",
            emoji, signal_type, symbol, momentum, crossover, confidence, amount
        );

        Some(TradingSignal {
            signal_type,
            token_in,
            token_out,
            amount,
            confidence,
            timestamp: now,
            strategy_id: self.config.strategy_id.clone(),
            reason: format!(
                "Momentum {} signal: score={:.3}, confidence={:.3}",
                signal_type, momentum, confidence
            ),
            metadata,
        })
    }
}

impl Strategy for MomentumStrategy {
    fn id(&self) -> &str {
        &self.config.strategy_id
    }

    fn analyze(&mut self, market_data: &[MarketData]) -> Option<TradingSignal> {
        self.analyze_at(market_data, Utc::now())
    }

    fn validate_signal(&self, signal: &TradingSignal, portfolio: &[PortfolioPosition]) -> bool {
        if !check_risk_limits(signal, portfolio, &self.config.risk_limits) {
            return false;
        }

        let momentum = signal.metadata_f64("momentum_score").unwrap_or(0.0);
        if momentum.abs() < self.params.momentum_threshold {
            info!(
                "Momentum too weak: {:.3} < {:.3}",
                momentum.abs(), self.params.momentum_threshold
            );
            return false;
        }
        true
    }

    fn required_data(&self) -> Vec<String> {
        self.params.monitored_tokens.clone()
    }
}

/// `tanh(10 × rate of change)` against the price `lookback` samples back,
/// counting the newest sample. Zero until enough history exists.
pub fn momentum_score(prices: &[f64], lookback: usize) -> f64 {
    if lookback == 0 || prices.len() < lookback {
        return 0.0;
    }
    let current = prices[prices.len() - 1];
    let past = prices[prices.len() - lookback];
    if past == 0.0 {
        return 0.0;
    }
    ((current - past) / past * MOMENTUM_SENSITIVITY).tanh()
}

/// +1 when the short average crosses above the long one on the newest
/// sample, -1 when it crosses below, 0 otherwise.
pub fn ma_crossover(prices: &[f64], short_period: usize, long_period: usize) -> i8 {
    let (Some(short), Some(long), Some(prev_short), Some(prev_long)) = (
        trailing_mean(prices, short_period, 0),
        trailing_mean(prices, long_period, 0),
        trailing_mean(prices, short_period, 1),
        trailing_mean(prices, long_period, 1),
    ) else {
        return 0;
    };

    if prev_short <= prev_long && short > long {
        1
    } else if prev_short >= prev_long && short < long {
        -1
    } else {
        0
    }
}

/// The trailing average includes the current sample.
pub fn volume_confirmed(volumes: &[f64], current_volume: f64, lookback: usize, floor: f64) -> bool {
    if volumes.is_empty() || current_volume < floor {
        return false;
    }
    let window = lookback.min(volumes.len());
    let average = trailing_mean(volumes, window, 0).unwrap_or(0.0);
    current_volume > average * VOLUME_SURGE_FACTOR
}

pub fn determine_signal_type(momentum: f64, crossover: i8, volume_ok: bool, threshold: f64) -> SignalType {
    if momentum > threshold && crossover >= 0 && volume_ok {
        SignalType::Buy
    } else if momentum < -threshold && crossover <= 0 && volume_ok {
        SignalType::Sell
    } else {
        SignalType::Hold
    }
}

pub fn signal_confidence(momentum: f64, crossover: i8, volume_ok: bool) -> f64 {
    let mut confidence = momentum.abs().min(1.0) * MOMENTUM_WEIGHT;
    if crossover != 0 {
        confidence += CROSSOVER_WEIGHT;
    }
    if volume_ok {
        confidence += VOLUME_WEIGHT;
    }
    confidence.min(1.0)
}

pub fn trade_amount(base: f64, confidence: f64, momentum: f64, minimum: f64) -> Decimal {
    let amount = (base * confidence * (momentum.abs() * 2.0).min(1.0)).max(minimum);
    Decimal::from_f64(amount)
        .or_else(|| Decimal::from_f64(minimum))
        .unwrap_or(Decimal::ZERO)
        .round_dp(6)
}
