//! DEX Trade Engine - multi-venue swap execution for on-chain trading signals
//!
//! Turns trading intents from a momentum strategy into monitored swaps on the
//! best-priced decentralized exchange, with token approvals, slippage and gas
//! bounds, and a lifecycle record for every trade.

pub mod config;
pub mod types;
pub mod errors;
pub mod network;
pub mod adapters;
pub mod execution;
pub mod strategy;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{EngineError, EngineResult};
pub use types::*;
