//! Concentrated-liquidity adapter (Uniswap V3 single-pool swaps at the 0.3% tier)

use alloy::{
    primitives::{aliases::{U160, U24}, Address, U256},
    rpc::types::eth::TransactionRequest,
    sol_types::SolCall,
};
use async_trait::async_trait;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, info};
use crate::{
    adapters::{
        checked_gas_price, parse_tx_hash, quote_valid_until, swap_deadline, tx_status_from_receipt,
        uniswap_v2::{price_impact, GAS_NATIVE_IN, GAS_TOKEN_IN},
        AdapterSettings, ExchangeAdapter, TxStatus,
    },
    errors::{EngineError, EngineResult},
    network::{abi::{IQuoterV2, ISwapRouter}, ChainClient},
    types::{find_deployment, Network, TokenInfo, TradeQuote},
    utils::{apply_slippage, from_base_units, to_base_units},
};

pub const V3_FEE_TIER: u32 = 3000;
const V3_FEE: Decimal = dec!(0.003);

pub struct UniswapV3Adapter {
    chain: Arc<dyn ChainClient>,
    router: Address,
    quoter: Address,
    settings: AdapterSettings,
}

impl UniswapV3Adapter {
    pub fn new(chain: Arc<dyn ChainClient>, settings: AdapterSettings) -> EngineResult<Self> {
        let network = chain.network();
        let deployment = find_deployment("uniswap_v3", network)
            .ok_or_else(|| EngineError::Config(format!("uniswap_v3 is not deployed on {}", network)))?;
        let quoter = deployment
            .quoter
            .ok_or_else(|| EngineError::Config(format!("uniswap_v3 quoter missing on {}", network)))?;
        Ok(Self::with_contracts(chain, deployment.router, quoter, settings))
    }

    pub fn with_contracts(chain: Arc<dyn ChainClient>, router: Address, quoter: Address, settings: AdapterSettings) -> Self {
        Self { chain, router, quoter, settings }
    }

    fn routable(&self, token: &TokenInfo) -> Address {
        if token.is_native() { self.network().wrapped_native() } else { token.address }
    }

    /// Returns `(amount_out, quoter gas estimate)`.
    async fn quote_single(&self, token_in: Address, token_out: Address, amount_in: U256) -> EngineResult<(U256, U256)> {
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::from(V3_FEE_TIER),
            sqrtPriceLimitX96: U160::ZERO,
        };
        let data = IQuoterV2::quoteExactInputSingleCall { params }.abi_encode();
        let tx = TransactionRequest::default().to(self.quoter).input(data.into());
        let raw = self.chain.call(tx).await?;
        let decoded = IQuoterV2::quoteExactInputSingleCall::abi_decode_returns(&raw, true)
            .map_err(|e| EngineError::Contract {
                contract: self.quoter,
                message: "quoteExactInputSingle returned malformed data".to_string(),
                source: e.into(),
            })?;
        Ok((decoded.amountOut, decoded.gasEstimate))
    }

    fn build_swap(&self, quote: &TradeQuote, wallet: Address, max_slippage: Decimal) -> EngineResult<TransactionRequest> {
        let token_in = self.resolve_token(&quote.token_in)?;
        let token_out = self.resolve_token(&quote.token_out)?;

        let amount_in = to_base_units(quote.amount_in, token_in.decimals)
            .ok_or_else(|| EngineError::InvalidSignal(format!("Amount {} not representable", quote.amount_in)))?;
        let expected_out = to_base_units(quote.amount_out, token_out.decimals)
            .ok_or_else(|| EngineError::InvalidSignal(format!("Amount {} not representable", quote.amount_out)))?;

        let params = ISwapRouter::ExactInputSingleParams {
            tokenIn: self.routable(&token_in),
            tokenOut: self.routable(&token_out),
            fee: U24::from(V3_FEE_TIER),
            recipient: wallet,
            deadline: swap_deadline(self.settings.deadline_secs),
            amountIn: amount_in,
            amountOutMinimum: apply_slippage(expected_out, max_slippage),
            sqrtPriceLimitX96: U160::ZERO,
        };
        let data = ISwapRouter::exactInputSingleCall { params }.abi_encode();
        let value = if token_in.is_native() { amount_in } else { U256::ZERO };

        Ok(TransactionRequest::default()
            .from(wallet)
            .to(self.router)
            .value(value)
            .input(data.into()))
    }
}

#[async_trait]
impl ExchangeAdapter for UniswapV3Adapter {
    fn name(&self) -> &str {
        "uniswap_v3"
    }

    fn network(&self) -> Network {
        self.chain.network()
    }

    fn spender(&self) -> Address {
        self.router
    }

    async fn get_quote(&self, token_in: &str, token_out: &str, amount_in: Decimal) -> EngineResult<Option<TradeQuote>> {
        let token_in = self.resolve_token(token_in)?;
        let token_out = self.resolve_token(token_out)?;
        // The router pays out WETH; unwrapping needs a multicall this adapter does not build.
        if token_out.is_native() || self.routable(&token_in) == self.routable(&token_out) {
            return Ok(None);
        }

        let amount_in_units = match to_base_units(amount_in, token_in.decimals) {
            Some(units) if !units.is_zero() => units,
            _ => return Ok(None),
        };

        let (path_in, path_out) = (self.routable(&token_in), self.routable(&token_out));
        let out_units = match self.quote_single(path_in, path_out, amount_in_units).await {
            Ok((out, _)) if !out.is_zero() => out,
            Ok(_) => return Ok(None),
            Err(EngineError::Contract { message, .. }) => {
                debug!("uniswap_v3: no pool for {} -> {}: {}", token_in.symbol, token_out.symbol, message);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let probe_in = (amount_in_units / U256::from(1000u64)).max(U256::from(1u64));
        let slippage_estimate = match self.quote_single(path_in, path_out, probe_in).await {
            Ok((probe_out, _)) => price_impact(amount_in_units, out_units, probe_in, probe_out),
            Err(e) => {
                debug!("uniswap_v3: probe quote failed, assuming no impact: {}", e);
                Decimal::ZERO
            }
        };

        let Some(amount_out) = from_base_units(out_units, token_out.decimals) else {
            return Ok(None);
        };
        let base_gas = if token_in.is_native() { GAS_NATIVE_IN } else { GAS_TOKEN_IN };

        Ok(Some(TradeQuote {
            exchange: "uniswap_v3".to_string(),
            token_in: token_in.symbol.clone(),
            token_out: token_out.symbol.clone(),
            amount_in,
            amount_out,
            price: amount_out / amount_in,
            gas_estimate: base_gas * 6 / 5,
            slippage_estimate,
            fees: (amount_out * V3_FEE).round_dp(token_out.decimals as u32),
            valid_until: quote_valid_until(self.settings.quote_validity_secs),
            route: vec![token_in.symbol, token_out.symbol],
        }))
    }

    async fn execute_trade(&self, quote: &TradeQuote, wallet: Address, max_slippage: Decimal) -> EngineResult<String> {
        let gas_price = checked_gas_price(self.chain.as_ref(), self.settings.max_gas_price_gwei).await?;
        let tx = self.build_swap(quote, wallet, max_slippage)?;

        let gas_limit = match self.chain.estimate_gas(tx.clone()).await {
            Ok(gas) => gas * 6 / 5,
            Err(e @ EngineError::Contract { .. }) => return Err(e),
            Err(e) => {
                debug!("uniswap_v3: gas estimate failed, using quote estimate: {}", e);
                quote.gas_estimate
            }
        };

        let tx = tx
            .gas_limit(gas_limit)
            .max_fee_per_gas(gas_price * 2)
            .max_priority_fee_per_gas(1_000_000_000u128.min(gas_price));

        let tx_hash = self.chain.submit_transaction(tx).await?;
        info!(
            "📡 uniswap_v3 swap sent: {} {} -> {} (gas limit {})",
            quote.amount_in, quote.token_in, quote.token_out, gas_limit
        );
        Ok(tx_hash.to_string())
    }

    async fn get_transaction_status(&self, tx_hash: &str) -> EngineResult<TxStatus> {
        let hash = parse_tx_hash(tx_hash)?;
        let receipt = self.chain.get_receipt(hash).await?;
        Ok(tx_status_from_receipt(receipt))
    }

    async fn estimate_gas(&self, quote: &TradeQuote) -> EngineResult<u64> {
        let wallet = self.chain.signer_address().unwrap_or_default();
        let tx = self.build_swap(quote, wallet, Decimal::ZERO)?;
        match self.chain.estimate_gas(tx).await {
            Ok(gas) => Ok(gas),
            Err(e) if e.is_transient() => Ok(quote.gas_estimate),
            Err(e) => Err(e),
        }
    }
}
