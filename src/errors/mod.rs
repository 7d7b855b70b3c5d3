//! Error types shared by the engine, adapters and chain client

pub mod engine_error;

pub use engine_error::*;
