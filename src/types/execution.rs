//! Trade execution record and its lifecycle states

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use super::{Network, TradeQuote, TradingSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Submitted,
    Confirmed,
    Completed,
    Failed,
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Completed | TradeStatus::Failed | TradeStatus::Cancelled)
    }

    /// Allowed edges of the lifecycle. Terminal states have no outgoing edges.
    pub fn can_transition_to(&self, next: TradeStatus) -> bool {
        use TradeStatus::*;
        match (self, next) {
            (Pending, Submitted | Completed | Failed | Cancelled) => true,
            (Submitted, Confirmed | Failed) => true,
            (Confirmed, Completed | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Submitted => "SUBMITTED",
            TradeStatus::Confirmed => "CONFIRMED",
            TradeStatus::Completed => "COMPLETED",
            TradeStatus::Failed => "FAILED",
            TradeStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidSignal,
    UnknownExchange,
    QuoteUnavailable,
    QuoteExpired,
    SlippageExceeded,
    /// Not enough native balance to pay approval gas.
    InsufficientFunds,
    /// Wallet holds less of the input token than the trade amount.
    InsufficientBalance,
    Approval,
    Execution,
    Reverted,
    /// Monitoring gave up. The transaction may still land; verify on-chain.
    MonitoringTimeout,
    /// Monitoring was stopped by shutdown. Verify on-chain.
    MonitoringAborted,
}

impl FailureKind {
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, FailureKind::MonitoringTimeout | FailureKind::MonitoringAborted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecution {
    pub trade_id: String,
    pub signal: TradingSignal,
    pub status: TradeStatus,
    pub exchange: String,
    pub network: Network,
    pub transaction_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub gas_price: Option<u128>,
    pub actual_amount_in: Option<Decimal>,
    pub actual_amount_out: Option<Decimal>,
    pub execution_price: Option<Decimal>,
    pub slippage: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub dry_run: bool,
}

impl TradeExecution {
    pub fn new_pending(trade_id: String, signal: TradingSignal, exchange: Option<&str>, network: Network) -> Self {
        Self {
            trade_id,
            signal,
            status: TradeStatus::Pending,
            exchange: exchange.unwrap_or("auto").to_string(),
            network,
            transaction_hash: None,
            block_number: None,
            gas_used: None,
            gas_price: None,
            actual_amount_in: None,
            actual_amount_out: None,
            execution_price: None,
            slippage: None,
            fees: None,
            created_at: Utc::now(),
            executed_at: None,
            error_message: None,
            failure_kind: None,
            dry_run: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Moves to `next` if the lifecycle allows it. Returns false and leaves
    /// the record untouched otherwise.
    pub fn advance(&mut self, next: TradeStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> bool {
        if !self.advance(TradeStatus::Failed) {
            return false;
        }
        self.failure_kind = Some(kind);
        self.error_message = Some(message.into());
        true
    }

    /// Records the broadcast hash, but only if the trade may move to CONFIRMED.
    pub fn confirm_submission(&mut self, tx_hash: &str) -> bool {
        if !self.advance(TradeStatus::Confirmed) {
            return false;
        }
        self.transaction_hash = Some(tx_hash.to_string());
        true
    }

    /// Fills the result fields from a quote without any on-chain execution.
    pub fn complete_simulated(&mut self, quote: &TradeQuote) -> bool {
        if !self.advance(TradeStatus::Completed) {
            return false;
        }
        self.dry_run = true;
        self.actual_amount_in = Some(quote.amount_in);
        self.actual_amount_out = Some(quote.amount_out);
        self.execution_price = Some(quote.price);
        self.slippage = Some(quote.slippage_estimate);
        self.fees = Some(quote.fees);
        self.gas_used = Some(quote.gas_estimate);
        self.executed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_quote, sample_signal};
    use rust_decimal_macros::dec;

    fn pending() -> TradeExecution {
        TradeExecution::new_pending("trade_1".into(), sample_signal(), None, Network::Ethereum)
    }

    #[test]
    fn new_records_start_pending_with_auto_exchange() {
        let execution = pending();
        assert_eq!(execution.status, TradeStatus::Pending);
        assert_eq!(execution.exchange, "auto");
        assert!(execution.transaction_hash.is_none());
        assert!(execution.is_active());
    }

    #[test]
    fn hash_is_only_recorded_on_a_valid_confirmation() {
        let mut cancelled = pending();
        assert!(cancelled.advance(TradeStatus::Cancelled));
        assert!(!cancelled.confirm_submission("0xabc"));
        assert_eq!(cancelled.status, TradeStatus::Cancelled);
        assert!(cancelled.transaction_hash.is_none());

        let mut submitted = pending();
        assert!(submitted.advance(TradeStatus::Submitted));
        assert!(submitted.confirm_submission("0xabc"));
        assert_eq!(submitted.status, TradeStatus::Confirmed);
        assert_eq!(submitted.transaction_hash.as_deref(), Some("0xabc"));
    }

    #[test]
    fn terminal_states_are_never_left() {
        for terminal in [TradeStatus::Completed, TradeStatus::Failed, TradeStatus::Cancelled] {
            for next in [
                TradeStatus::Pending,
                TradeStatus::Submitted,
                TradeStatus::Confirmed,
                TradeStatus::Completed,
                TradeStatus::Failed,
                TradeStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn failing_a_failed_record_keeps_the_first_reason() {
        let mut execution = pending();
        assert!(execution.fail(FailureKind::QuoteUnavailable, "no quotes"));
        assert!(!execution.fail(FailureKind::Execution, "later"));
        assert_eq!(execution.error_message.as_deref(), Some("no quotes"));
        assert_eq!(execution.failure_kind, Some(FailureKind::QuoteUnavailable));
    }

    #[test]
    fn confirmed_trades_cannot_be_cancelled() {
        let mut execution = pending();
        assert!(execution.advance(TradeStatus::Submitted));
        assert!(!execution.advance(TradeStatus::Cancelled));
        assert!(execution.advance(TradeStatus::Confirmed));
        assert!(!execution.advance(TradeStatus::Cancelled));
    }

    #[test]
    fn simulated_fill_copies_quote_values() {
        let mut execution = pending();
        let quote = sample_quote("uniswap_v2", dec!(1600), dec!(5), 150_000);
        assert!(execution.complete_simulated(&quote));
        assert!(execution.dry_run);
        assert_eq!(execution.actual_amount_out, Some(quote.amount_out));
        assert_eq!(execution.fees, Some(dec!(5)));
        assert_eq!(execution.slippage, Some(quote.slippage_estimate));
    }
}
