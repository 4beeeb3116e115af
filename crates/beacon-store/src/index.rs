use std::collections::{BTreeMap, BTreeSet};

use beacon_types::{Record, Timestamp};

/// Primary id map plus a secondary `(time, id)` index.
#[derive(Default)]
pub(crate) struct RecordIndex {
    by_id: BTreeMap<u64, Record>,
    by_time: BTreeSet<(Timestamp, u64)>,
}

impl RecordIndex {
    /// The id the next committed record will receive.
    pub(crate) fn next_id(&self) -> u64 {
        self.by_id.last_key_value().map_or(1, |(id, _)| id + 1)
    }

    /// Add a record. The caller guarantees `record.id == self.next_id()`.
    pub(crate) fn push(&mut self, record: Record) {
        debug_assert_eq!(record.id, self.next_id());
        self.by_time.insert((record.time, record.id));
        self.by_id.insert(record.id, record);
    }

    pub(crate) fn len(&self) -> u64 {
        self.by_id.len() as u64
    }

    pub(crate) fn latest(&self) -> Option<&Record> {
        self.by_id.last_key_value().map(|(_, r)| r)
    }

    pub(crate) fn get(&self, id: u64) -> Option<&Record> {
        self.by_id.get(&id)
    }

    pub(crate) fn seek_time_ge(&self, t: Timestamp) -> Option<&Record> {
        self.by_time
            .range((t, 0)..)
            .next()
            .and_then(|(_, id)| self.by_id.get(id))
    }

    pub(crate) fn seek_time_le(&self, t: Timestamp) -> Option<&Record> {
        self.by_time
            .range(..=(t, u64::MAX))
            .next_back()
            .and_then(|(_, id)| self.by_id.get(id))
    }
}
