//! Shared utilities: error types and crate-wide defaults.

pub mod config;
pub mod error;
