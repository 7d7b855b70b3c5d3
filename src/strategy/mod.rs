//! Signal-producing strategies

pub mod base;
pub mod history;
pub mod momentum;

pub use base::*;
pub use history::*;
pub use momentum::*;
