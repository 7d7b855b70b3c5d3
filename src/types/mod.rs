//! Core data types and structures

pub mod addresses;
pub mod signal;
pub mod quote;
pub mod execution;

pub use addresses::*;
pub use signal::*;
pub use quote::*;
pub use execution::*;
