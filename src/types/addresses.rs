//! Network definitions, token tables and router deployments

use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder address used for the native asset in token tables.
pub const NATIVE_ASSET: Address = Address::ZERO;
pub const NATIVE_SYMBOL: &str = "ETH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Ethereum,
    Base,
    BaseSepolia,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum Mainnet",
            Network::Base => "Base",
            Network::BaseSepolia => "Base Sepolia",
        }
    }

    pub fn tokens(&self) -> &'static [(&'static str, Address, u8)] {
        match self {
            Network::Ethereum => TOKENS_ETHEREUM,
            Network::Base => TOKENS_BASE,
            Network::BaseSepolia => TOKENS_BASE_SEPOLIA,
        }
    }

    pub fn wrapped_native(&self) -> Address {
        match self {
            Network::Ethereum => WETH_ETHEREUM,
            Network::Base | Network::BaseSepolia => WETH_BASE,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Ethereum => "ethereum",
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "mainnet" => Ok(Network::Ethereum),
            "base" => Ok(Network::Base),
            "base-sepolia" | "sepolia" => Ok(Network::BaseSepolia),
            other => Err(format!("Unsupported network: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_ASSET
    }
}

/// Resolve a symbol (case-insensitive) or a hex address against a network's token table.
pub fn lookup_token(network: Network, symbol_or_address: &str) -> Option<TokenInfo> {
    if let Ok(address) = Address::from_str(symbol_or_address) {
        return network
            .tokens()
            .iter()
            .find(|(_, addr, _)| *addr == address)
            .map(|(symbol, address, decimals)| TokenInfo {
                symbol: symbol.to_string(),
                address: *address,
                decimals: *decimals,
            });
    }

    let wanted = symbol_or_address.to_uppercase();
    network
        .tokens()
        .iter()
        .find(|(symbol, _, _)| *symbol == wanted)
        .map(|(symbol, address, decimals)| TokenInfo {
            symbol: symbol.to_string(),
            address: *address,
            decimals: *decimals,
        })
}

// Ethereum mainnet
pub const WETH_ETHEREUM: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

pub const TOKENS_ETHEREUM: &[(&str, Address, u8)] = &[
    ("ETH", NATIVE_ASSET, 18),
    ("WETH", WETH_ETHEREUM, 18),
    ("USDC", USDC_ETHEREUM, 6),
    ("USDT", address!("dAC17F958D2ee523a2206206994597C13D831ec7"), 6),
    ("DAI", address!("6B175474E89094C44Da98b954EedeAC495271d0F"), 18),
    ("WBTC", address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"), 8),
    ("LINK", address!("514910771AF9Ca656af840dff83E8264EcF986CA"), 18),
];

// Base mainnet
pub const WETH_BASE: Address = address!("4200000000000000000000000000000000000006");
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

pub const TOKENS_BASE: &[(&str, Address, u8)] = &[
    ("ETH", NATIVE_ASSET, 18),
    ("WETH", WETH_BASE, 18),
    ("USDC", USDC_BASE, 6),
    ("USDBC", address!("d9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA"), 6),
    ("DAI", address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb"), 18),
];

// Base Sepolia testnet
pub const TOKENS_BASE_SEPOLIA: &[(&str, Address, u8)] = &[
    ("ETH", NATIVE_ASSET, 18),
    ("WETH", WETH_BASE, 18),
    ("USDC", address!("036CbD53842c5426634e7929541eC2318f3dCF7e"), 6),
];

/// Router deployments per venue and network.
pub struct RouterDeployment {
    pub exchange: &'static str,
    pub network: Network,
    pub router: Address,
    pub quoter: Option<Address>,
}

pub const ROUTER_DEPLOYMENTS: &[RouterDeployment] = &[
    RouterDeployment {
        exchange: "uniswap_v2",
        network: Network::Ethereum,
        router: address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
        quoter: None,
    },
    RouterDeployment {
        exchange: "sushiswap",
        network: Network::Ethereum,
        router: address!("d9e1cE17f2641f24aE83637ab66a2cca9C378B9F"),
        quoter: None,
    },
    RouterDeployment {
        exchange: "uniswap_v3",
        network: Network::Ethereum,
        router: address!("E592427A0AEce92De3Edee1F18E0157C05861564"),
        quoter: Some(address!("61fFE014bA17989E743c5F6cB21bF9697530B21e")),
    },
    RouterDeployment {
        exchange: "uniswap_v2",
        network: Network::Base,
        router: address!("4752ba5DBc23f44D87826276BF6Fd6b1C372aD24"),
        quoter: None,
    },
    RouterDeployment {
        exchange: "uniswap_v2",
        network: Network::BaseSepolia,
        router: address!("C532a74256D3Db42D0Bf7a0400fEFDbad7694008"),
        quoter: None,
    },
];

pub fn find_deployment(exchange: &str, network: Network) -> Option<&'static RouterDeployment> {
    ROUTER_DEPLOYMENTS
        .iter()
        .find(|d| d.exchange == exchange && d.network == network)
}
