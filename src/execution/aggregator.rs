//! Best-price selection across every registered venue

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::{adapters::ExchangeAdapter, types::TradeQuote};

#[derive(Debug, Clone)]
pub struct QuoteAggregator {
    pub quote_timeout: Duration,
}

impl Default for QuoteAggregator {
    fn default() -> Self {
        Self { quote_timeout: Duration::from_secs(10) }
    }
}

impl QuoteAggregator {
    pub fn new(quote_timeout: Duration) -> Self {
        Self { quote_timeout }
    }

    /// Queries all adapters concurrently. Errors, timeouts and empty answers
    /// count as "no quote" for that venue and never abort the others.
    pub async fn get_best_quote(
        &self,
        adapters: &[Arc<dyn ExchangeAdapter>],
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> Option<TradeQuote> {
        let requests = adapters.iter().map(|adapter| {
            let adapter = adapter.clone();
            async move {
                let name = adapter.name().to_string();
                match tokio::time::timeout(self.quote_timeout, adapter.get_quote(token_in, token_out, amount_in)).await {
                    Ok(Ok(Some(quote))) => {
                        debug!(
                            "💱 {} quote: {} {} -> {} {} (fees {}, gas {})",
                            name, amount_in, token_in, quote.amount_out, token_out, quote.fees, quote.gas_estimate
                        );
                        Some(quote)
                    }
                    Ok(Ok(None)) => {
                        debug!("{} has no route for {} -> {}", name, token_in, token_out);
                        None
                    }
                    Ok(Err(e)) => {
                        warn!("⚠️ Failed to get quote from {}: {}", name, e);
                        None
                    }
                    Err(_) => {
                        warn!("⚠️ Quote from {} timed out after {:?}", name, self.quote_timeout);
                        None
                    }
                }
            }
        });

        let mut quotes: Vec<TradeQuote> = join_all(requests).await.into_iter().flatten().collect();
        let received = quotes.len();
        rank_quotes(&mut quotes);
        for (rank, quote) in quotes.iter().enumerate() {
            debug!("   #{} {} net {} (gas {})", rank + 1, quote.exchange, quote.net_amount_out(), quote.gas_estimate);
        }
        let best = select_best_quote(quotes, Utc::now());

        match &best {
            Some(quote) => info!(
                "🏆 Best quote from {} of {} venues: {} {} (net {})",
                quote.exchange, received, quote.amount_out, quote.token_out, quote.net_amount_out()
            ),
            None => warn!("⚠️ No quotes available for {} {} -> {}", amount_in, token_in, token_out),
        }

        best
    }
}

/// Picks the quote with the highest `amount_out - fees`. Ties go to the
/// lower gas estimate, then to the venue name so the choice is stable.
/// Expired or non-positive quotes are ignored.
pub fn select_best_quote(quotes: Vec<TradeQuote>, now: DateTime<Utc>) -> Option<TradeQuote> {
    quotes
        .into_iter()
        .filter(|q| !q.is_expired_at(now) && q.amount_out > Decimal::ZERO)
        .max_by(|a, b| {
            a.net_amount_out()
                .cmp(&b.net_amount_out())
                .then_with(|| b.gas_estimate.cmp(&a.gas_estimate))
                .then_with(|| b.exchange.cmp(&a.exchange))
        })
}

/// Orders quotes best first for the quote book log.
pub fn rank_quotes(quotes: &mut [TradeQuote]) {
    quotes.sort_by(|a, b| match b.net_amount_out().cmp(&a.net_amount_out()) {
        Ordering::Equal => a.gas_estimate.cmp(&b.gas_estimate),
        other => other,
    });
}
