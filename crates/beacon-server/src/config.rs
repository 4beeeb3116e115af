use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use beacon_ledger::{LedgerConfig, RetryPolicy};
use beacon_store::StorageLocation;
use beacon_types::BitsLength;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Beacon deployment settings, loadable from a TOML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Record log path, or `":memory:"`.
    pub data: String,
    /// Signing key material. Required for a file-backed ledger; an in-memory
    /// ledger without one signs with an ephemeral key.
    pub key_file: Option<PathBuf>,
    pub bits_len: BitsLength,
    /// Seconds between generated records; `0` disables the generator.
    pub generate_interval_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            data: "beacon.log".into(),
            key_file: None,
            bits_len: BitsLength::default(),
            generate_interval_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Read a config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn storage_location(&self) -> StorageLocation {
        match self.data.parse() {
            Ok(location) => location,
            Err(never) => match never {},
        }
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            bits_len: self.bits_len,
        }
    }
}
