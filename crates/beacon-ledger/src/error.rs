use beacon_crypto::{EntropyError, SignatureError};
use beacon_store::StoreError;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A read found no qualifying record. An empty result, not a fault.
    #[error("no records")]
    NoRecords,

    #[error("entropy source returned {actual} of {expected} bytes")]
    EntropyFailure { expected: usize, actual: usize },

    #[error("entropy source error: {0}")]
    EntropySource(String),

    #[error("signing failed: {0}")]
    SigningFailure(String),

    /// Another append committed between reading the tip and inserting.
    #[error("chain conflict: expected id {expected}, store assigned {assigned}")]
    ChainConflict { expected: u64, assigned: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("ledger is closed")]
    Closed,

    #[error("ledger already closed")]
    AlreadyClosed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LedgerError {
    /// Whether a fresh attempt of the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChainConflict { .. })
    }
}

impl From<EntropyError> for LedgerError {
    fn from(e: EntropyError) -> Self {
        match e {
            EntropyError::ShortRead { expected, actual } => {
                Self::EntropyFailure { expected, actual }
            }
            EntropyError::Io(io) => Self::EntropySource(io.to_string()),
        }
    }
}

impl From<SignatureError> for LedgerError {
    fn from(e: SignatureError) -> Self {
        Self::SigningFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(LedgerError::ChainConflict {
            expected: 2,
            assigned: 3
        }
        .is_retryable());
        assert!(!LedgerError::NoRecords.is_retryable());
        assert!(!LedgerError::Storage(StoreError::Closed).is_retryable());
    }

    #[test]
    fn short_read_maps_to_entropy_failure() {
        let err: LedgerError = EntropyError::ShortRead {
            expected: 64,
            actual: 3,
        }
        .into();
        assert!(matches!(
            err,
            LedgerError::EntropyFailure {
                expected: 64,
                actual: 3
            }
        ));
    }

    #[test]
    fn messages_name_the_ids() {
        let err = LedgerError::ChainConflict {
            expected: 5,
            assigned: 6,
        };
        assert_eq!(
            err.to_string(),
            "chain conflict: expected id 5, store assigned 6"
        );
    }
}
