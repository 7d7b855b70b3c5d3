//! ERC-20 allowance check and approval before a swap can pull funds

use alloy::{
    primitives::{Address, TxHash, U256},
    rpc::types::eth::TransactionRequest,
    sol_types::SolCall,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use crate::{
    config::{Config, APPROVAL_POLL_INTERVAL_SECS, APPROVAL_TIMEOUT_SECS, MIN_GAS_BALANCE_ETH},
    errors::EngineError,
    network::{abi::IERC20, ChainClient, ReceiptSummary},
    types::TokenInfo,
    utils::{from_base_units, to_base_units},
};

const APPROVAL_GAS_FALLBACK: u64 = 150_000;

#[derive(Debug, Clone)]
pub struct ApprovalSettings {
    /// Native balance (in ETH) that must remain available to pay for the approval.
    pub min_gas_balance: Decimal,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
}

impl ApprovalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_gas_balance: config.min_gas_balance_eth,
            receipt_timeout: Duration::from_secs(config.approval_timeout_secs),
            poll_interval: Duration::from_secs(APPROVAL_POLL_INTERVAL_SECS),
        }
    }
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            min_gas_balance: MIN_GAS_BALANCE_ETH,
            receipt_timeout: Duration::from_secs(APPROVAL_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(APPROVAL_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    /// Native asset, nothing to approve.
    NotRequired,
    AlreadyApproved { allowance: U256 },
    Approved { tx_hash: TxHash, block_number: Option<u64> },
    /// The approval was broadcast but neither a receipt nor the new allowance
    /// could be observed in time. It may still land.
    Unconfirmed { tx_hash: TxHash },
    /// Not enough native balance to pay for the approval transaction.
    InsufficientFunds { reason: String },
    /// The wallet holds less of the token than the trade needs.
    InsufficientBalance { reason: String },
    Failed { reason: String },
}

impl ApprovalOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            ApprovalOutcome::NotRequired | ApprovalOutcome::AlreadyApproved { .. } | ApprovalOutcome::Approved { .. }
        )
    }
}

pub struct ApprovalWorkflow {
    chain: Arc<dyn ChainClient>,
    settings: ApprovalSettings,
    // Serializes check-then-approve so concurrent trades never double-approve.
    lock: Mutex<()>,
}

impl ApprovalWorkflow {
    pub fn new(chain: Arc<dyn ChainClient>, settings: ApprovalSettings) -> Self {
        Self {
            chain,
            settings,
            lock: Mutex::new(()),
        }
    }

    /// Makes sure `spender` may pull at least `required` base units of
    /// `token` from `owner`. Approves the maximum amount when it is short.
    pub async fn check_and_approve(
        &self,
        token: &TokenInfo,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> ApprovalOutcome {
        if token.is_native() {
            info!("✅ {} trade - no approval needed", token.symbol);
            return ApprovalOutcome::NotRequired;
        }

        let _guard = self.lock.lock().await;

        info!("🔍 Checking {} allowance for spender {}", token.symbol, spender);

        let min_gas_wei = to_base_units(self.settings.min_gas_balance, 18).unwrap_or_default();
        match self.chain.native_balance(owner).await {
            Ok(balance) if balance < min_gas_wei => {
                let have = from_base_units(balance, 18).unwrap_or_default();
                error!("❌ Insufficient ETH for approval gas. Balance: {} ETH", have);
                return ApprovalOutcome::InsufficientFunds {
                    reason: format!(
                        "Insufficient ETH for approval gas: {} ETH < {} ETH",
                        have, self.settings.min_gas_balance
                    ),
                };
            }
            Ok(_) => {}
            Err(e) => {
                return ApprovalOutcome::Failed { reason: format!("Failed to read ETH balance: {}", e) };
            }
        }

        match self.chain.token_balance(token.address, owner).await {
            Ok(balance) if balance < required => {
                error!("❌ Insufficient {} balance. Have: {}, Need: {}", token.symbol, balance, required);
                return ApprovalOutcome::InsufficientBalance {
                    reason: format!("Insufficient {} balance: have {}, need {}", token.symbol, balance, required),
                };
            }
            Ok(_) => {}
            Err(e @ EngineError::Contract { .. }) => {
                error!("❌ Failed to check token balance - invalid token contract? Error: {}", e);
                return ApprovalOutcome::Failed {
                    reason: format!("Invalid token contract {}: {}", token.address, e),
                };
            }
            Err(e) => {
                return ApprovalOutcome::Failed { reason: format!("Failed to read {} balance: {}", token.symbol, e) };
            }
        }

        let current = match self.chain.allowance(token.address, owner, spender).await {
            Ok(allowance) => allowance,
            Err(e) => {
                error!("❌ Failed to check allowance: {}", e);
                return ApprovalOutcome::Failed { reason: format!("Failed to read allowance: {}", e) };
            }
        };

        if current >= required {
            info!("✅ Sufficient allowance already exists");
            return ApprovalOutcome::AlreadyApproved { allowance: current };
        }

        let tx_hash = match self.submit_approval(token, owner, spender).await {
            Ok(hash) => hash,
            Err(e) => {
                error!("❌ Approval submission failed: {}", e);
                return ApprovalOutcome::Failed { reason: format!("Approval submission failed: {}", e) };
            }
        };
        info!("📡 Approval sent for {}: {}", token.symbol, tx_hash);

        let receipt = match tokio::time::timeout(self.settings.receipt_timeout, self.wait_for_receipt(tx_hash)).await {
            Ok(receipt) => Some(receipt),
            Err(_) => {
                warn!("⏰ Approval receipt not seen within {:?}, re-checking", self.settings.receipt_timeout);
                self.chain.get_receipt(tx_hash).await.ok().flatten()
            }
        };

        match receipt {
            Some(r) if r.success => {
                info!("✅ Approval confirmed in block {:?}", r.block_number);
                ApprovalOutcome::Approved { tx_hash, block_number: r.block_number }
            }
            Some(_) => {
                error!("❌ Approval transaction reverted: {}", tx_hash);
                ApprovalOutcome::Failed { reason: format!("Approval transaction {} reverted", tx_hash) }
            }
            None => match self.chain.allowance(token.address, owner, spender).await {
                Ok(allowance) if allowance >= required => {
                    info!("✅ Allowance updated although no receipt was seen");
                    ApprovalOutcome::Approved { tx_hash, block_number: None }
                }
                _ => {
                    warn!("⚠️ Approval {} unconfirmed; verify on-chain", tx_hash);
                    ApprovalOutcome::Unconfirmed { tx_hash }
                }
            },
        }
    }

    async fn submit_approval(&self, token: &TokenInfo, owner: Address, spender: Address) -> Result<TxHash, EngineError> {
        let data = IERC20::approveCall { spender, amount: U256::MAX }.abi_encode();
        let tx = TransactionRequest::default()
            .from(owner)
            .to(token.address)
            .input(data.into());

        let gas_limit = match self.chain.estimate_gas(tx.clone()).await {
            Ok(estimated) => estimated * 3 / 2,
            Err(e) => {
                warn!("⚠️ Gas estimation failed: {}, using default gas limit", e);
                APPROVAL_GAS_FALLBACK
            }
        };

        self.chain.submit_transaction(tx.gas_limit(gas_limit)).await
    }

    /// Polls until a receipt appears. Lookup errors are retried on the next tick.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ReceiptSummary {
        loop {
            match self.chain.get_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => warn!("⚠️ Receipt lookup failed for {}: {}", tx_hash, e),
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
