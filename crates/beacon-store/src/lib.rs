//! Ordered durable storage for beacon records.
//!
//! Records are keyed by a store-assigned, gapless integer id and indexed a
//! second time by `(time, id)` for point-in-time seeks.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FileRecordStore`] -- `fsync`ed append-only log with CRC-framed records
//!
//! # Design Rules
//!
//! 1. Records are immutable once committed; there is no update or delete.
//! 2. Id assignment, the caller's post-condition and the commit form one
//!    critical section. A failed post-condition releases the id.
//! 3. Concurrent reads are always safe.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
mod index;
mod log;
pub mod memory;
pub mod traits;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use traits::{InsertOutcome, RecordStore};

/// Where a ledger keeps its records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// Volatile, process-local storage.
    Memory,
    /// Durable log file at the given path.
    File(PathBuf),
}

impl StorageLocation {
    /// Open the backend this location names.
    pub fn open(&self) -> StoreResult<Arc<dyn RecordStore>> {
        Ok(match self {
            Self::Memory => Arc::new(InMemoryRecordStore::new()),
            Self::File(path) => Arc::new(FileRecordStore::open(path)?),
        })
    }
}

/// `":memory:"` selects [`StorageLocation::Memory`]; anything else is a path.
impl FromStr for StorageLocation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            ":memory:" => Self::Memory,
            path => Self::File(PathBuf::from(path)),
        })
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, ":memory:"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_memory_sentinel() {
        assert_eq!(":memory:".parse::<StorageLocation>().unwrap(), StorageLocation::Memory);
        assert_eq!(
            "data/beacon.log".parse::<StorageLocation>().unwrap(),
            StorageLocation::File(PathBuf::from("data/beacon.log"))
        );
    }

    #[test]
    fn open_each_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mem = StorageLocation::Memory.open().unwrap();
        assert!(mem.is_empty().unwrap());

        let location = StorageLocation::File(dir.path().join("b.log"));
        let file = location.open().unwrap();
        assert!(file.is_empty().unwrap());
        assert_eq!(location.to_string(), dir.path().join("b.log").display().to_string());
    }
}
