use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use beacon_types::{Record, RecordDraft, Timestamp};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::index::RecordIndex;
use crate::log::RecordLog;
use crate::traits::{InsertOutcome, RecordStore};

/// Durable record store backed by an append-only log file.
///
/// The log is the source of truth; the id and time indexes live in memory
/// and are rebuilt on open. Writers serialize on the log mutex and hold the
/// index write lock from id assignment until the record is indexed, so the
/// log and the index never disagree.
pub struct FileRecordStore {
    path: PathBuf,
    log: Mutex<Option<RecordLog>>,
    index: RwLock<RecordIndex>,
    closed: AtomicBool,
}

impl FileRecordStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let (log, records) = RecordLog::open(path)?;

        let mut index = RecordIndex::default();
        for record in records {
            index.push(record);
        }
        info!(path = %path.display(), records = index.len(), "record store opened");

        Ok(Self {
            path: path.to_path_buf(),
            log: Mutex::new(Some(log)),
            index: RwLock::new(index),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, RecordIndex>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        self.index.read().map_err(|_| StoreError::LockPoisoned)
    }
}

impl RecordStore for FileRecordStore {
    fn insert_atomically(
        &self,
        draft: RecordDraft,
        check: &dyn Fn(u64) -> bool,
    ) -> StoreResult<InsertOutcome> {
        let mut guard = self.log.lock().map_err(|_| StoreError::LockPoisoned)?;
        let log = guard.as_mut().ok_or(StoreError::Closed)?;

        // Held across the write so a durable record always reaches the index.
        let mut index = self.index.write().map_err(|_| StoreError::LockPoisoned)?;
        let id = index.next_id();
        if !check(id) {
            return Ok(InsertOutcome::RolledBack { assigned: id });
        }

        let record = draft.into_record(id);
        log.append(&record)?;
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
        let mut guard = self.log.lock().map_err(|_| StoreError::LockPoisoned)?;
        let log = guard.take().ok_or(StoreError::Closed)?;
        self.closed.store(true, Ordering::Release);
        log.sync()?;
        info!(path = %self.path.display(), "record store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::LinkHash;
    use std::fs::OpenOptions;

    fn draft(seed: u8, time: i64) -> RecordDraft {
        RecordDraft {
            bits: vec![seed; 32],
            time: Timestamp::from_millis(time),
            hash: LinkHash::from_bytes([seed; 32]),
            signature: vec![seed; 64],
        }
    }

    fn commit(store: &FileRecordStore, seed: u8, time: i64) -> Record {
        match store.insert_atomically(draft(seed, time), &|_| true).unwrap() {
            InsertOutcome::Committed(r) => r,
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.log");

        let store = FileRecordStore::open(&path).unwrap();
        let written: Vec<Record> = (1..=3).map(|i| commit(&store, i, i as i64 * 10)).collect();
        store.close().unwrap();

        let store = FileRecordStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 3);
        for r in &written {
            assert_eq!(store.get(r.id).unwrap().as_ref(), Some(r));
        }
        assert_eq!(
            store.seek_time_le(Timestamp::from_millis(25)).unwrap().unwrap().id,
            2
        );
        assert_eq!(commit(&store, 4, 40).id, 4);
    }

    #[test]
    fn rollback_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.log");
        let store = FileRecordStore::open(&path).unwrap();
        commit(&store, 1, 1);
        let len_before = std::fs::metadata(&path).unwrap().len();

        let outcome = store.insert_atomically(draft(2, 2), &|_| false).unwrap();
        assert_eq!(outcome, InsertOutcome::RolledBack { assigned: 2 });
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn torn_tail_recovers_to_last_complete_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.log");
        let store = FileRecordStore::open(&path).unwrap();
        commit(&store, 1, 1);
        commit(&store, 2, 2);
        store.close().unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 10).unwrap();
        drop(file);

        let store = FileRecordStore::open(&path).unwrap();
        assert_eq!(store.latest().unwrap().unwrap().id, 1);
        assert_eq!(commit(&store, 9, 9).id, 2);
    }

    #[test]
    fn poisoned_index_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.log");
        let store = std::sync::Arc::new(FileRecordStore::open(&path).unwrap());
        commit(&store, 1, 1);
        let len_before = std::fs::metadata(&path).unwrap().len();

        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.index.write().unwrap();
            panic!("poison the index lock");
        })
        .join();

        assert!(matches!(
            store.insert_atomically(draft(2, 2), &|_| true),
            Err(StoreError::LockPoisoned)
        ));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);

        let reopened = FileRecordStore::open(&path).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
        assert_eq!(commit(&reopened, 2, 2).id, 2);
    }

    #[test]
    fn close_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(dir.path().join("beacon.log")).unwrap();
        store.close().unwrap();
        assert!(matches!(store.close(), Err(StoreError::Closed)));
        assert!(matches!(store.get(1), Err(StoreError::Closed)));
        assert!(matches!(
            store.insert_atomically(draft(1, 1), &|_| true),
            Err(StoreError::Closed)
        ));
    }
}
