//! Append-only randomness beacon ledger.
//!
//! This crate is the heart of the beacon. It provides:
//! - [`Ledger`]: entropy draw, link hash, signature, and an optimistic
//!   sequenced append on top of any [`RecordStore`](beacon_store::RecordStore)
//! - Point and range queries: latest, by id, before and after a time
//! - The [`LedgerError`] taxonomy
//! - A bounded [`RetryPolicy`] for callers that want to retry chain conflicts

pub mod config;
pub mod error;
pub mod ledger;
pub mod retry;

pub use config::LedgerConfig;
pub use error::LedgerError;
pub use ledger::Ledger;
pub use retry::{append_with_retry, RetryPolicy};
