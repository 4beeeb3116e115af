use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use beacon_types::{Record, RecordDraft, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::index::RecordIndex;
use crate::traits::{InsertOutcome, RecordStore};

/// In-memory record store.
///
/// Intended for tests and embedding. Nothing survives the process; the
/// durability clause of [`RecordStore`] holds trivially for the lifetime of
/// the value.
pub struct InMemoryRecordStore {
    index: RwLock<RecordIndex>,
    closed: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(RecordIndex::default()),
            closed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, RecordIndex>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        self.index.read().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert_atomically(
        &self,
        draft: RecordDraft,
        check: &dyn Fn(u64) -> bool,
    ) -> StoreResult<InsertOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;
        let id = index.next_id();
        if !check(id) {
            return Ok(InsertOutcome::RolledBack { assigned: id });
        }
        let record = draft.into_record(id);
        index.push(record.clone());
        Ok(InsertOutcome::Committed(record))
    }

    fn latest(&self) -> StoreResult<Option<Record>> {
        Ok(self.read()?.latest().cloned())
    }

    fn get(&self, id: u64) -> StoreResult<Option<Record>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn seek_time_ge(&self, t: Timestamp) -> StoreResult<Option<Record>> {
        Ok(self.read()?.seek_time_ge(t).cloned())
    }

    fn seek_time_le(&self, t: Timestamp) -> StoreResult<Option<Record>> {
        Ok(self.read()?.seek_time_le(t).cloned())
    }

    fn len(&self) -> StoreResult<u64> {
        Ok(self.read()?.len())
    }

    fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}
