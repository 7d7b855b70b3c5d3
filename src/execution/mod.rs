//! Quote routing, approvals, submission and monitoring of trades

pub mod aggregator;
pub mod approval;
pub mod engine;
pub mod jobs;
pub mod monitor;
pub mod registry;

pub use aggregator::*;
pub use approval::*;
pub use engine::*;
pub use jobs::*;
pub use monitor::*;
pub use registry::*;
