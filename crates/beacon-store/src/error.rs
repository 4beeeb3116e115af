/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The persisted log is damaged somewhere other than a torn tail.
    #[error("corrupt record log at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// An insert could not be undone; the backend may hold a partial write.
    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
