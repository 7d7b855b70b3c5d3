//! Market data from the CoinGecko simple price endpoint

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};
use crate::{
    errors::{EngineError, EngineResult},
    network::retry::{retry_with_backoff, RetryConfig},
    types::MarketData,
};

/// Last fetched USD prices, keyed by upper-case symbol.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    entries: HashMap<String, MarketData>,
}

impl PriceSnapshot {
    pub fn price_usd(&self, symbol: &str) -> Option<f64> {
        self.entries.get(&symbol.to_uppercase()).map(|d| d.price)
    }

    pub fn market_data(&self) -> impl Iterator<Item = &MarketData> {
        self.entries.values()
    }

    pub fn get(&self, symbol: &str) -> Option<&MarketData> {
        self.entries.get(&symbol.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn market_data(&self, symbols: &[String]) -> EngineResult<Vec<MarketData>>;

    /// USD price from the most recent successful fetch. No I/O.
    fn price_usd(&self, symbol: &str) -> Option<f64>;
}

fn coingecko_id(symbol: &str) -> Option<&'static str> {
    match symbol.to_uppercase().as_str() {
        "ETH" | "WETH" => Some("ethereum"),
        "BTC" => Some("bitcoin"),
        "WBTC" => Some("wrapped-bitcoin"),
        "USDC" | "USDBC" => Some("usd-coin"),
        "USDT" => Some("tether"),
        "DAI" => Some("dai"),
        "LINK" => Some("chainlink"),
        "UNI" => Some("uniswap"),
        _ => None,
    }
}

pub struct CoinGeckoFeed {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    last: RwLock<PriceSnapshot>,
}

impl CoinGeckoFeed {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| EngineError::network("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 200,
                ..Default::default()
            },
            last: RwLock::new(PriceSnapshot::default()),
        })
    }

    async fn fetch(&self, ids: &[&str]) -> EngineResult<serde_json::Value> {
        let url = format!("{}/simple/price", self.base_url);
        let joined = ids.join(",");
        let mut request = self.client.get(&url).query(&[
            ("ids", joined.as_str()),
            ("vs_currencies", "usd"),
            ("include_24hr_vol", "true"),
            ("include_24hr_change", "true"),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::network("CoinGecko request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("⚠️ CoinGecko returned error status {}: {}", status, body);
            let message = format!("CoinGecko API error: {} - {}", status, body);
            // 4xx other than rate limiting will not fix itself
            if status.is_client_error() && status.as_u16() != 429 {
                return Err(EngineError::Config(message));
            }
            return Err(EngineError::Network { message, source: None, retry_count: 0 });
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::network("Failed to parse CoinGecko response", e))
    }

    pub fn last_snapshot(&self) -> PriceSnapshot {
        self.last.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub async fn snapshot(&self, symbols: &[String]) -> EngineResult<PriceSnapshot> {
        let wanted: Vec<(String, &'static str)> = symbols
            .iter()
            .filter_map(|s| match coingecko_id(s) {
                Some(id) => Some((s.to_uppercase(), id)),
                None => {
                    warn!("⚠️ No CoinGecko id for {}, skipping", s);
                    None
                }
            })
            .collect();

        if wanted.is_empty() {
            return Ok(PriceSnapshot::default());
        }

        let mut ids: Vec<&str> = wanted.iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        ids.dedup();

        let json = retry_with_backoff(|| self.fetch(&ids), &self.retry, "CoinGecko price fetch").await?;

        let now = Utc::now();
        let mut entries = HashMap::new();
        for (symbol, id) in wanted {
            let entry = &json[id];
            let Some(price) = entry["usd"].as_f64() else {
                warn!("⚠️ Missing price for {} in CoinGecko response", symbol);
                continue;
            };
            if price <= 0.0 {
                warn!("⚠️ Invalid price received for {}: {}", symbol, price);
                continue;
            }
            entries.insert(symbol.clone(), MarketData {
                symbol,
                price,
                volume_24h: entry["usd_24h_vol"].as_f64().unwrap_or(0.0),
                price_change_24h: entry["usd_24h_change"].as_f64().unwrap_or(0.0),
                timestamp: now,
            });
        }

        debug!("Fetched {} prices from CoinGecko", entries.len());
        let snapshot = PriceSnapshot { entries };
        if let Ok(mut last) = self.last.write() {
            last.entries.extend(snapshot.entries.clone());
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn market_data(&self, symbols: &[String]) -> EngineResult<Vec<MarketData>> {
        let snapshot = self.snapshot(symbols).await?;
        Ok(snapshot.market_data().cloned().collect())
    }

    fn price_usd(&self, symbol: &str) -> Option<f64> {
        self.last.read().ok()?.price_usd(symbol)
    }
}
