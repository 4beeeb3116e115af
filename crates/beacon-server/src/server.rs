use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use beacon_crypto::{OsEntropy, SigningKey};
use beacon_ledger::{append_with_retry, Ledger, LedgerError, RetryPolicy};
use beacon_store::StorageLocation;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Derive the signing key from a key file's contents.
pub fn load_signing_key(path: &Path) -> ServerResult<SigningKey> {
    let material = std::fs::read(path)
        .map_err(|e| ServerError::Config(format!("key file {}: {e}", path.display())))?;
    if material.is_empty() {
        return Err(ServerError::Config(format!(
            "key file {} is empty",
            path.display()
        )));
    }
    Ok(SigningKey::from_key_material(&material))
}

/// Open the ledger a config describes, drawing entropy from the OS.
///
/// A durable ledger needs a key file: records signed by a key that dies
/// with the process cannot be verified after a restart. Only in-memory
/// ledgers fall back to an ephemeral key.
pub fn open_ledger(config: &ServerConfig) -> ServerResult<Ledger> {
    let location = config.storage_location();
    let key = match (&config.key_file, &location) {
        (Some(path), _) => load_signing_key(path)?,
        (None, StorageLocation::Memory) => {
            warn!("no key file configured; signing with an ephemeral key");
            SigningKey::generate()
        }
        (None, StorageLocation::File(path)) => {
            return Err(ServerError::Config(format!(
                "a key file is required for the durable ledger at {}",
                path.display()
            )))
        }
    };
    Ok(Ledger::open(
        &location,
        Arc::new(key),
        Box::new(OsEntropy),
        config.ledger_config(),
    )?)
}

/// Append a record every `period` until the ledger closes.
///
/// Failures are logged and the next tick tries again.
pub fn spawn_generator(ledger: Arc<Ledger>, period: Duration, policy: RetryPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let ledger = Arc::clone(&ledger);
            let policy = policy.clone();
            match tokio::task::spawn_blocking(move || append_with_retry(&ledger, &policy)).await {
                Ok(Ok(record)) => {
                    debug!(id = record.id, hash = %record.hash.short_hex(), "generated record")
                }
                Ok(Err(LedgerError::Closed)) => {
                    info!("ledger closed; generator stopping");
                    break;
                }
                Ok(Err(e)) => warn!(error = %e, "record generation failed"),
                Err(e) => error!(error = %e, "generator task panicked"),
            }
        }
    })
}

/// Beacon HTTP server.
pub struct BeaconServer {
    config: ServerConfig,
    ledger: Arc<Ledger>,
}

impl BeaconServer {
    pub fn new(config: ServerConfig, ledger: Arc<Ledger>) -> Self {
        Self { config, ledger }
    }

    /// Open the configured ledger and wrap it in a server.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let ledger = Arc::new(open_ledger(&config)?);
        Ok(Self::new(config, ledger))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(Arc::clone(&self.ledger)))
    }

    /// Start the generator and serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let generator = match self.config.generate_interval_secs {
            0 => None,
            secs => Some(spawn_generator(
                Arc::clone(&self.ledger),
                Duration::from_secs(secs),
                self.config.retry.clone(),
            )),
        };

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            interval_secs = self.config.generate_interval_secs,
            "beacon server listening"
        );
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        if let Some(generator) = generator {
            generator.abort();
        }
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || ledger.close())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;
        served
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
