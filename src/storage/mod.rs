//! Data persistence and file operations

pub mod executions;

pub use executions::*;
