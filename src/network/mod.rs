//! Chain access, market data and retry handling

pub mod abi;
pub mod chain;
pub mod price_feed;
pub mod retry;

pub use abi::{decode_transfers, received_amount, TokenTransfer, TransferKind};
pub use chain::*;
pub use price_feed::*;
pub use retry::*;
