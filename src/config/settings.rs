//! Engine configuration settings and environment variable handling

use alloy::primitives::Address;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use crate::types::Network;

// Configuration constants
pub const MIN_TRADE_AMOUNT: Decimal = dec!(0.0001);
pub const MAX_SLIPPAGE_BPS: u32 = 500; // 5%
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50; // 0.5%

// Trade Execution Constants
pub const DEFAULT_GAS_PRICE_GWEI: u32 = 100;
pub const MAX_GAS_PRICE_GWEI: u32 = 500;
pub const SWAP_DEADLINE_SECS: u64 = 1200;
pub const DEFAULT_QUOTE_VALIDITY_SECS: u64 = 300;

// Monitoring Constants
pub const MONITOR_POLL_INTERVAL_SECS: u64 = 5;
pub const MONITOR_MAX_ATTEMPTS: u32 = 60;
pub const APPROVAL_TIMEOUT_SECS: u64 = 300;
pub const APPROVAL_POLL_INTERVAL_SECS: u64 = 2;
pub const MIN_GAS_BALANCE_ETH: Decimal = dec!(0.005);

pub const DEFAULT_EXCHANGES: &str = "uniswap_v2,sushiswap,uniswap_v3";

#[derive(Debug, Clone)]
pub struct Config {
    pub network: Network,
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub wallet_address: Option<Address>,
    // Trade Execution Configuration
    pub default_slippage_bps: u32,
    pub max_gas_price_gwei: u32,
    pub min_trade_amount: Decimal,
    pub bypass_execution: bool,
    pub enabled_exchanges: Vec<String>,
    pub quote_timeout_secs: u64,
    pub quote_validity_secs: u64,
    pub max_retained_trades: usize,
    // Monitoring Configuration
    pub monitor_poll_interval_secs: u64,
    pub monitor_max_attempts: u32,
    pub approval_timeout_secs: u64,
    pub min_gas_balance_eth: Decimal,
    // Price feed / strategy loop
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,
    pub strategy_interval_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            network: env::var("NETWORK")
                .ok()
                .and_then(|s| Network::from_str(&s).ok())
                .unwrap_or(Network::Ethereum),
            rpc_url: env::var("RPC_URL").ok(),
            private_key: env::var("PRIVATE_KEY").ok(),
            wallet_address: env::var("WALLET_ADDRESS")
                .ok()
                .and_then(|s| Address::from_str(&s).ok()),
            default_slippage_bps: env::var("DEFAULT_SLIPPAGE_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SLIPPAGE_BPS)
                .min(MAX_SLIPPAGE_BPS),
            max_gas_price_gwei: env::var("MAX_GAS_PRICE_GWEI")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GAS_PRICE_GWEI)
                .min(MAX_GAS_PRICE_GWEI),
            min_trade_amount: env::var("MIN_TRADE_AMOUNT")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or(dec!(0.001))
                .max(MIN_TRADE_AMOUNT),
            bypass_execution: env::var("BYPASS_EXECUTION")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            enabled_exchanges: parse_list(
                &env::var("ENABLED_EXCHANGES").unwrap_or_else(|_| DEFAULT_EXCHANGES.to_string()),
            ),
            quote_timeout_secs: env_u64("QUOTE_TIMEOUT_SECS", 10),
            quote_validity_secs: env_u64("QUOTE_VALIDITY_SECS", DEFAULT_QUOTE_VALIDITY_SECS),
            max_retained_trades: env_u64("MAX_RETAINED_TRADES", 1000).max(1) as usize,
            monitor_poll_interval_secs: env_u64("MONITOR_POLL_INTERVAL_SECS", MONITOR_POLL_INTERVAL_SECS).max(1),
            monitor_max_attempts: env::var("MONITOR_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MONITOR_MAX_ATTEMPTS)
                .max(1),
            approval_timeout_secs: env_u64("APPROVAL_TIMEOUT_SECS", APPROVAL_TIMEOUT_SECS),
            min_gas_balance_eth: env::var("MIN_GAS_BALANCE_ETH")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or(MIN_GAS_BALANCE_ETH),
            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok(),
            strategy_interval_secs: env_u64("STRATEGY_INTERVAL_SECS", 60).max(1),
        }
    }

    /// Default slippage tolerance as a fraction.
    pub fn default_max_slippage(&self) -> Decimal {
        Decimal::from(self.default_slippage_bps) / dec!(10000)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_secs)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
