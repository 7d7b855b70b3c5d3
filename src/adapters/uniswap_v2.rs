//! Constant-product router adapter (Uniswap V2 and forks such as SushiSwap)

use alloy::{
    primitives::{Address, U256},
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
        AdapterSettings, ExchangeAdapter, TxStatus,
    },
    errors::{EngineError, EngineResult},
    network::{abi::IUniswapV2Router02, ChainClient},
    types::{find_deployment, Network, TokenInfo, TradeQuote},
    utils::{apply_slippage, from_base_units, to_base_units},
};

pub const V2_FEE: Decimal = dec!(0.003);
pub const GAS_NATIVE_IN: u64 = 150_000;
pub const GAS_TOKEN_IN: u64 = 200_000;
/// Extra gas per additional hop.
const GAS_PER_HOP: u64 = 60_000;

pub struct UniswapV2Adapter {
    name: String,
    chain: Arc<dyn ChainClient>,
    router: Address,
    settings: AdapterSettings,
}

impl UniswapV2Adapter {
    pub fn new(name: &str, chain: Arc<dyn ChainClient>, settings: AdapterSettings) -> EngineResult<Self> {
        let network = chain.network();
        let deployment = find_deployment(name, network).ok_or_else(|| {
            EngineError::Config(format!("{} is not deployed on {}", name, network))
        })?;
        Ok(Self::with_router(name, chain, deployment.router, settings))
    }

    pub fn with_router(name: &str, chain: Arc<dyn ChainClient>, router: Address, settings: AdapterSettings) -> Self {
        Self {
            name: name.to_string(),
            chain,
            router,
            settings,
        }
    }

    /// Native ETH trades through the wrapped token.
    fn routable(&self, token: &TokenInfo) -> Address {
        if token.is_native() { self.network().wrapped_native() } else { token.address }
    }

    async fn amounts_out(&self, amount_in: U256, path: &[Address]) -> EngineResult<U256> {
        let data = IUniswapV2Router02::getAmountsOutCall { amountIn: amount_in, path: path.to_vec() }.abi_encode();
        let tx = TransactionRequest::default().to(self.router).input(data.into());
        let raw = self.chain.call(tx).await?;
        let decoded = IUniswapV2Router02::getAmountsOutCall::abi_decode_returns(&raw, true)
            .map_err(|e| EngineError::Contract {
                contract: self.router,
                message: "getAmountsOut returned malformed data".to_string(),
                source: e.into(),
            })?;
        decoded.amounts.last().copied().ok_or_else(|| EngineError::Contract {
            contract: self.router,
            message: "getAmountsOut returned no amounts".to_string(),
            source: anyhow::anyhow!("empty amounts array"),
        })
    }

    /// Quote the direct pair first, then through the wrapped native token.
    /// A revert from the router means there is no pool for that path.
    async fn best_path(&self, token_in: &TokenInfo, token_out: &TokenInfo, amount_in: U256) -> EngineResult<Option<(Vec<TokenInfo>, U256)>> {
        let direct = vec![token_in.clone(), token_out.clone()];
        match self.amounts_out(amount_in, &self.addresses(&direct)).await {
            Ok(out) if !out.is_zero() => return Ok(Some((direct, out))),
            Ok(_) => {}
            Err(EngineError::Contract { message, .. }) => debug!("{}: direct path unavailable: {}", self.name, message),
            Err(e) => return Err(e),
        }

        let weth = self.network().wrapped_native();
        if self.routable(token_in) == weth || self.routable(token_out) == weth {
            return Ok(None);
        }
        let hop = self.resolve_token("WETH")?;
        let via_weth = vec![token_in.clone(), hop, token_out.clone()];
        match self.amounts_out(amount_in, &self.addresses(&via_weth)).await {
            Ok(out) if !out.is_zero() => Ok(Some((via_weth, out))),
            Ok(_) => Ok(None),
            Err(EngineError::Contract { message, .. }) => {
                debug!("{}: WETH path unavailable: {}", self.name, message);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn addresses(&self, tokens: &[TokenInfo]) -> Vec<Address> {
        tokens.iter().map(|t| self.routable(t)).collect()
    }

    fn route_tokens(&self, quote: &TradeQuote) -> EngineResult<Vec<TokenInfo>> {
        if quote.route.len() < 2 {
            return Err(EngineError::InvalidSignal(format!("Quote route too short: {:?}", quote.route)));
        }
        quote.route.iter().map(|s| self.resolve_token(s)).collect()
    }

    fn build_swap(&self, quote: &TradeQuote, wallet: Address, max_slippage: Decimal) -> EngineResult<TransactionRequest> {
        let tokens = self.route_tokens(quote)?;
        let (first, last) = (&tokens[0], &tokens[tokens.len() - 1]);
        let path = self.addresses(&tokens);

        let amount_in = to_base_units(quote.amount_in, first.decimals)
            .ok_or_else(|| EngineError::InvalidSignal(format!("Amount {} not representable", quote.amount_in)))?;
        let expected_out = to_base_units(quote.amount_out, last.decimals)
            .ok_or_else(|| EngineError::InvalidSignal(format!("Amount {} not representable", quote.amount_out)))?;
        let amount_out_min = apply_slippage(expected_out, max_slippage);
        let deadline = swap_deadline(self.settings.deadline_secs);

        let (data, value) = if first.is_native() {
            let call = IUniswapV2Router02::swapExactETHForTokensCall {
                amountOutMin: amount_out_min,
                path,
                to: wallet,
                deadline,
            };
            (call.abi_encode(), amount_in)
        } else if last.is_native() {
            let call = IUniswapV2Router02::swapExactTokensForETHCall {
                amountIn: amount_in,
                amountOutMin: amount_out_min,
                path,
                to: wallet,
                deadline,
            };
            (call.abi_encode(), U256::ZERO)
        } else {
            let call = IUniswapV2Router02::swapExactTokensForTokensCall {
                amountIn: amount_in,
                amountOutMin: amount_out_min,
                path,
                to: wallet,
                deadline,
            };
            (call.abi_encode(), U256::ZERO)
        };

        Ok(TransactionRequest::default()
            .from(wallet)
            .to(self.router)
            .value(value)
            .input(data.into()))
    }
}

/// Price impact of the full amount against a tiny probe trade on the same path.
pub(crate) fn price_impact(amount_in: U256, amount_out: U256, probe_in: U256, probe_out: U256) -> Decimal {
    let ratio = |out: U256, inp: U256| -> Option<Decimal> {
        let out = Decimal::from_str(&out.to_string()).ok()?;
        let inp = Decimal::from_str(&inp.to_string()).ok()?;
        out.checked_div(inp)
    };
    match (ratio(amount_out, amount_in), ratio(probe_out, probe_in)) {
        (Some(full), Some(spot)) if spot > Decimal::ZERO => (dec!(1) - full / spot).max(Decimal::ZERO).round_dp(6),
        _ => Decimal::ZERO,
    }
}

#[async_trait]
impl ExchangeAdapter for UniswapV2Adapter {
    fn name(&self) -> &str {
        &self.name
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
        if self.routable(&token_in) == self.routable(&token_out) {
            return Ok(None);
        }

        let amount_in_units = match to_base_units(amount_in, token_in.decimals) {
            Some(units) if !units.is_zero() => units,
            _ => return Ok(None),
        };

        let Some((route, out_units)) = self.best_path(&token_in, &token_out, amount_in_units).await? else {
            return Ok(None);
        };

        let probe_in = (amount_in_units / U256::from(1000u64)).max(U256::from(1u64));
        let slippage_estimate = match self.amounts_out(probe_in, &self.addresses(&route)).await {
            Ok(probe_out) => price_impact(amount_in_units, out_units, probe_in, probe_out),
            Err(e) => {
                debug!("{}: probe quote failed, assuming no impact: {}", self.name, e);
                Decimal::ZERO
            }
        };

        let Some(amount_out) = from_base_units(out_units, token_out.decimals) else {
            return Ok(None);
        };
        let hops = (route.len() - 1) as u64;
        let fee_rate = dec!(1) - (0..hops).fold(dec!(1), |kept, _| kept * (dec!(1) - V2_FEE));
        let base_gas = if token_in.is_native() { GAS_NATIVE_IN } else { GAS_TOKEN_IN };

        Ok(Some(TradeQuote {
            exchange: self.name.clone(),
            token_in: token_in.symbol.clone(),
            token_out: token_out.symbol.clone(),
            amount_in,
            amount_out,
            price: amount_out / amount_in,
            gas_estimate: base_gas + GAS_PER_HOP * (hops - 1),
            slippage_estimate,
            fees: (amount_out * fee_rate).round_dp(token_out.decimals as u32),
            valid_until: quote_valid_until(self.settings.quote_validity_secs),
            route: route.into_iter().map(|t| t.symbol).collect(),
        }))
    }

    async fn execute_trade(&self, quote: &TradeQuote, wallet: Address, max_slippage: Decimal) -> EngineResult<String> {
        let gas_price = checked_gas_price(self.chain.as_ref(), self.settings.max_gas_price_gwei).await?;
        let tx = self.build_swap(quote, wallet, max_slippage)?;

        // Contract errors here mean the swap would revert; do not send it.
        let gas_limit = match self.chain.estimate_gas(tx.clone()).await {
            Ok(gas) => gas * 6 / 5,
            Err(e @ EngineError::Contract { .. }) => return Err(e),
            Err(e) => {
                debug!("{}: gas estimate failed, using quote estimate: {}", self.name, e);
                quote.gas_estimate
            }
        };

        let tx = tx
            .gas_limit(gas_limit)
            .max_fee_per_gas(gas_price * 2)
            .max_priority_fee_per_gas(1_000_000_000u128.min(gas_price));

        let tx_hash = self.chain.submit_transaction(tx).await?;
        info!(
            "📡 {} swap sent: {} {} -> {} (gas limit {})",
            self.name, quote.amount_in, quote.token_in, quote.token_out, gas_limit
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
