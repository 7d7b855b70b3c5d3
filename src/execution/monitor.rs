//! Polls a submitted swap until it lands, reverts, or monitoring gives up

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::{
    adapters::{ExchangeAdapter, TxStatus},
    config::{Config, MONITOR_MAX_ATTEMPTS, MONITOR_POLL_INTERVAL_SECS},
    network::TokenTransfer,
};

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.monitor_poll_interval_secs),
            max_attempts: config.monitor_max_attempts,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(MONITOR_POLL_INTERVAL_SECS),
            max_attempts: MONITOR_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    Completed {
        block_number: Option<u64>,
        gas_used: u64,
        gas_price: u128,
        transfers: Vec<TokenTransfer>,
    },
    Reverted {
        block_number: Option<u64>,
        gas_used: u64,
        reason: String,
    },
    /// Attempts exhausted without a verdict. The transaction may still land.
    TimedOut { attempts: u32 },
    /// Shutdown requested while waiting.
    Aborted,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionMonitor {
    settings: MonitorSettings,
}

impl TransactionMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub async fn watch(&self, adapter: &dyn ExchangeAdapter, tx_hash: &str, cancel: &CancellationToken) -> MonitorOutcome {
        for attempt in 1..=self.settings.max_attempts {
            if cancel.is_cancelled() {
                return MonitorOutcome::Aborted;
            }

            match adapter.get_transaction_status(tx_hash).await {
                Ok(TxStatus::Success { block_number, gas_used, gas_price, transfers }) => {
                    info!("✅ Transaction {} confirmed in block {:?} after {} checks", tx_hash, block_number, attempt);
                    return MonitorOutcome::Completed { block_number, gas_used, gas_price, transfers };
                }
                Ok(TxStatus::Failed { block_number, gas_used, reason }) => {
                    warn!("❌ Transaction {} failed on-chain: {}", tx_hash, reason);
                    return MonitorOutcome::Reverted { block_number, gas_used, reason };
                }
                Ok(TxStatus::Pending) => {
                    debug!("⏳ {} still pending ({}/{})", tx_hash, attempt, self.settings.max_attempts);
                }
                Err(e) => {
                    warn!("⚠️ Error monitoring transaction {}: {}", tx_hash, e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return MonitorOutcome::Aborted,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        warn!("⏰ Transaction monitoring timeout: {} after {} checks", tx_hash, self.settings.max_attempts);
        MonitorOutcome::TimedOut { attempts: self.settings.max_attempts }
    }
}
