//! Switchyard Core - Shared Infrastructure
//!
//! This crate provides the building blocks the routing layer sits on:
//! - Ledger: Durable per-day, per-provider usage accounting (SQLite)
//! - Utils: Retry with capped exponential backoff

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ledger;
pub mod utils;

pub use ledger::{DailyUsage, LedgerError, LedgerStore};
pub use utils::{retry_with_backoff, RetryConfig, RetryError};
