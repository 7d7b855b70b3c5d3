//! Contract bindings and receipt log decoding

use alloy::{
    primitives::{Address, Log, U256},
    sol,
    sol_types::SolEvent,
};
use serde::Serialize;

sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);

        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    interface IWETH9 {
        event Withdrawal(address indexed src, uint256 wad);
    }

    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable returns (uint256[] memory amounts);
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
    }

    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
    }

    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferKind {
    /// ERC-20 `Transfer`
    Token,
    /// WETH `Withdrawal`, i.e. wrapped native unwrapped to ETH
    Unwrap,
}

/// A value movement decoded from a receipt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    pub kind: TransferKind,
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// Decode ERC-20 transfers and WETH withdrawals. Unrelated logs are skipped.
pub fn decode_transfers(logs: &[Log]) -> Vec<TokenTransfer> {
    logs.iter()
        .filter_map(|log| {
            let topic0 = log.data.topics().first()?;
            if *topic0 == IERC20::Transfer::SIGNATURE_HASH {
                let event = IERC20::Transfer::decode_log_data(&log.data, true).ok()?;
                Some(TokenTransfer {
                    kind: TransferKind::Token,
                    token: log.address,
                    from: event.from,
                    to: event.to,
                    value: event.value,
                })
            } else if *topic0 == IWETH9::Withdrawal::SIGNATURE_HASH {
                let event = IWETH9::Withdrawal::decode_log_data(&log.data, true).ok()?;
                Some(TokenTransfer {
                    kind: TransferKind::Unwrap,
                    token: log.address,
                    from: event.src,
                    to: Address::ZERO,
                    value: event.wad,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Total of `token` received by `recipient`. For native output pass the
/// wrapped-native contract and `native = true`: the router unwraps WETH
/// before forwarding ETH, so the withdrawal amount is what arrives.
pub fn received_amount(transfers: &[TokenTransfer], token: Address, recipient: Address, native: bool) -> U256 {
    transfers
        .iter()
        .filter(|t| t.token == token)
        .filter(|t| match t.kind {
            TransferKind::Token => !native && t.to == recipient,
            TransferKind::Unwrap => native,
        })
        .fold(U256::ZERO, |acc, t| acc.saturating_add(t.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const WALLET: Address = address!("1111111111111111111111111111111111111111");
    const PAIR: Address = address!("2222222222222222222222222222222222222222");

    fn transfer_log(token: Address, from: Address, to: Address, value: u64) -> Log {
        let event = IERC20::Transfer { from, to, value: U256::from(value) };
        Log { address: token, data: event.encode_log_data() }
    }

    #[test]
    fn sums_only_transfers_to_the_wallet() {
        let logs = vec![
            transfer_log(WETH, WALLET, PAIR, 1_000),
            transfer_log(USDC, PAIR, WALLET, 1_600_000_000),
            transfer_log(USDC, PAIR, PAIR, 5),
        ];
        let transfers = decode_transfers(&logs);
        assert_eq!(transfers.len(), 3);
        assert_eq!(received_amount(&transfers, USDC, WALLET, false), U256::from(1_600_000_000u64));
        assert_eq!(received_amount(&transfers, WETH, WALLET, false), U256::ZERO);
    }

    #[test]
    fn native_output_is_read_from_the_unwrap() {
        let withdrawal = IWETH9::Withdrawal { src: PAIR, wad: U256::from(42u64) };
        let logs = vec![Log { address: WETH, data: withdrawal.encode_log_data() }];
        let transfers = decode_transfers(&logs);
        assert_eq!(transfers[0].kind, TransferKind::Unwrap);
        assert_eq!(received_amount(&transfers, WETH, WALLET, true), U256::from(42u64));
    }
}
