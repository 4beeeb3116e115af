use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unsupported entropy length {0}; expected 32 or 64")]
    UnsupportedBitsLength(usize),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
