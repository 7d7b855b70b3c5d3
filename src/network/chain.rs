//! Blockchain access behind a trait so adapters and the approval workflow can be tested offline

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, Log, TxHash, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::eth::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
    transports::{RpcError, TransportError},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use crate::{
    config::Config,
    errors::{EngineError, EngineResult},
    network::abi::IERC20,
    network::retry::{retry_with_backoff, RetryConfig},
    types::Network,
};

/// The parts of a transaction receipt the engine acts on.
#[derive(Debug, Clone)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub logs: Vec<Log>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn network(&self) -> Network;

    /// Address transactions are signed from, if a key is configured.
    fn signer_address(&self) -> Option<Address>;

    async fn native_balance(&self, owner: Address) -> EngineResult<U256>;

    async fn call(&self, tx: TransactionRequest) -> EngineResult<Bytes>;

    async fn estimate_gas(&self, tx: TransactionRequest) -> EngineResult<u64>;

    async fn gas_price(&self) -> EngineResult<u128>;

    async fn submit_transaction(&self, tx: TransactionRequest) -> EngineResult<TxHash>;

    async fn get_receipt(&self, tx_hash: TxHash) -> EngineResult<Option<ReceiptSummary>>;

    async fn token_balance(&self, token: Address, owner: Address) -> EngineResult<U256> {
        let data = IERC20::balanceOfCall { owner }.abi_encode();
        let tx = TransactionRequest::default().to(token).input(data.into());
        let raw = self.call(tx).await?;
        IERC20::balanceOfCall::abi_decode_returns(&raw, true)
            .map(|r| r._0)
            .map_err(|e| EngineError::Contract {
                contract: token,
                message: "balanceOf returned malformed data".to_string(),
                source: e.into(),
            })
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> EngineResult<U256> {
        let data = IERC20::allowanceCall { owner, spender }.abi_encode();
        let tx = TransactionRequest::default().to(token).input(data.into());
        let raw = self.call(tx).await?;
        IERC20::allowanceCall::abi_decode_returns(&raw, true)
            .map(|r| r._0)
            .map_err(|e| EngineError::Contract {
                contract: token,
                message: "allowance returned malformed data".to_string(),
                source: e.into(),
            })
    }
}

/// A JSON-RPC error response means the node evaluated the request and
/// rejected it, so retrying will not help. Everything else is transport.
fn classify_rpc_error(context: &str, target: Option<Address>, err: TransportError) -> EngineError {
    match err {
        RpcError::ErrorResp(ref payload) => EngineError::Contract {
            contract: target.unwrap_or_default(),
            message: format!("{}: {}", context, payload.message),
            source: anyhow::anyhow!("{}", err),
        },
        other => EngineError::network(format!("{} failed", context), other),
    }
}

pub struct AlloyChainClient {
    provider: Arc<dyn Provider>,
    network: Network,
    signer: Option<Address>,
    retry: RetryConfig,
}

impl AlloyChainClient {
    pub async fn connect(config: &Config) -> Result<Self> {
        let rpc_url = config.rpc_url.as_ref()
            .ok_or_else(|| anyhow::anyhow!("RPC_URL is required for on-chain execution"))?;

        let (provider, signer): (Arc<dyn Provider>, Option<Address>) = match &config.private_key {
            Some(pk) => {
                let signer = PrivateKeySigner::from_str(pk)
                    .context("Failed to parse private key")?;
                let address = signer.address();
                let provider = ProviderBuilder::new()
                    .with_recommended_fillers()
                    .wallet(EthereumWallet::from(signer))
                    .on_builtin(rpc_url)
                    .await
                    .context("Failed to connect to RPC endpoint")?;
                (Arc::new(provider), Some(address))
            }
            None => {
                let provider = ProviderBuilder::new()
                    .on_builtin(rpc_url)
                    .await
                    .context("Failed to connect to RPC endpoint")?;
                (Arc::new(provider), None)
            }
        };

        let client = Self {
            provider,
            network: config.network,
            signer,
            retry: RetryConfig {
                max_attempts: 5,
                initial_delay_ms: 500,
                max_delay_ms: 10000,
                exponential_base: 2.0,
            },
        };

        info!("🔗 Testing connection to {}...", config.network.display_name());
        let chain_id = retry_with_backoff(
            || async {
                client.provider.get_chain_id().await
                    .map_err(|e| classify_rpc_error("get chain id", None, e))
            },
            &client.retry,
            "RPC connection",
        ).await?;

        if chain_id != config.network.chain_id() {
            return Err(anyhow::anyhow!(
                "RPC endpoint reports chain {} but {} expects {}",
                chain_id, config.network, config.network.chain_id()
            ));
        }

        info!("✅ Connected to {} (chain {})", config.network.display_name(), chain_id);
        Ok(client)
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    fn network(&self) -> Network {
        self.network
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn native_balance(&self, owner: Address) -> EngineResult<U256> {
        retry_with_backoff(
            || async {
                self.provider.get_balance(owner).await
                    .map_err(|e| classify_rpc_error("get balance", None, e))
            },
            &self.retry,
            "native balance",
        ).await
    }

    async fn call(&self, tx: TransactionRequest) -> EngineResult<Bytes> {
        let target = tx.to.and_then(|kind| kind.to().copied());
        retry_with_backoff(
            || async {
                self.provider.call(&tx).await
                    .map_err(|e| classify_rpc_error("eth_call", target, e))
            },
            &self.retry,
            "eth_call",
        ).await
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> EngineResult<u64> {
        let target = tx.to.and_then(|kind| kind.to().copied());
        retry_with_backoff(
            || async {
                self.provider.estimate_gas(&tx).await
                    .map(|gas| gas as u64)
                    .map_err(|e| classify_rpc_error("estimate gas", target, e))
            },
            &self.retry,
            "gas estimate",
        ).await
    }

    async fn gas_price(&self) -> EngineResult<u128> {
        retry_with_backoff(
            || async {
                self.provider.get_gas_price().await
                    .map_err(|e| classify_rpc_error("get gas price", None, e))
            },
            &self.retry,
            "gas price",
        ).await
    }

    // Not retried: a resend after an ambiguous failure could double-submit.
    async fn submit_transaction(&self, tx: TransactionRequest) -> EngineResult<TxHash> {
        let target = tx.to.and_then(|kind| kind.to().copied());
        let pending = self.provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify_rpc_error("send transaction", target, e))?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> EngineResult<Option<ReceiptSummary>> {
        let receipt = retry_with_backoff(
            || async {
                self.provider.get_transaction_receipt(tx_hash).await
                    .map_err(|e| classify_rpc_error("get receipt", None, e))
            },
            &self.retry,
            "transaction receipt",
        ).await?;

        Ok(receipt.map(|receipt| ReceiptSummary {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used as u64,
            effective_gas_price: receipt.effective_gas_price,
            logs: receipt.inner.logs().iter().map(|log| log.inner.clone()).collect(),
        }))
    }
}
