use beacon_types::{Record, RecordDraft, Timestamp};

use crate::error::StoreResult;

/// Result of [`RecordStore::insert_atomically`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The post-condition held and the record is durable.
    Committed(Record),
    /// The post-condition rejected the assigned id; nothing was persisted
    /// and the id will be handed out again.
    RolledBack { assigned: u64 },
}

/// Ordered durable store for beacon records.
///
/// All implementations must satisfy these invariants:
/// - Ids are assigned by the store, starting at 1, with no gaps and no
///   duplicates. A rolled-back insert releases its id.
/// - Records are never updated or deleted; there is no API to do so.
/// - A committed insert is durable before `insert_atomically` returns.
/// - The time index orders by `(time, id)`, so equal-time ties resolve by id.
/// - Concurrent reads are always safe.
pub trait RecordStore: Send + Sync {
    /// Assign the next id to `draft`, evaluate `check` against it, and commit
    /// only if it returns `true`.
    ///
    /// Id assignment, `check` and commit happen in one critical section, so
    /// no other insert can interleave.
    fn insert_atomically(
        &self,
        draft: RecordDraft,
        check: &dyn Fn(u64) -> bool,
    ) -> StoreResult<InsertOutcome>;

    /// The record with the highest id.
    fn latest(&self) -> StoreResult<Option<Record>>;

    /// Exact lookup by id.
    fn get(&self, id: u64) -> StoreResult<Option<Record>>;

    /// The record with the smallest `time >= t`; lowest id among ties.
    fn seek_time_ge(&self, t: Timestamp) -> StoreResult<Option<Record>>;

    /// The record with the largest `time <= t`; highest id among ties.
    fn seek_time_le(&self, t: Timestamp) -> StoreResult<Option<Record>>;

    /// Number of committed records.
    fn len(&self) -> StoreResult<u64>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush and release the backend. Later calls fail with
    /// [`StoreError::Closed`](crate::StoreError::Closed).
    fn close(&self) -> StoreResult<()>;
}
