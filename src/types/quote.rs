//! Priced offers returned by exchange adapters

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TradeQuote {
    pub exchange: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    /// `amount_out / amount_in`
    pub price: Decimal,
    pub gas_estimate: u64,
    /// Fraction, e.g. `0.012` for 1.2%.
    pub slippage_estimate: Decimal,
    /// Denominated in `token_out` units so it compares against `amount_out`.
    pub fees: Decimal,
    pub valid_until: DateTime<Utc>,
    pub route: Vec<String>,
}

impl TradeQuote {
    pub fn net_amount_out(&self) -> Decimal {
        self.amount_out - self.fees
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_until
    }
}
