//! HTTP server for the randomness beacon.
//!
//! Serves signed records over a small JSON API and appends a fresh record
//! on a fixed schedule.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, HealthResponse, KeyResponse, RecordResponse};
pub use server::{load_signing_key, open_ledger, spawn_generator, BeaconServer};
