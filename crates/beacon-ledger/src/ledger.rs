use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use beacon_crypto::entropy::{self, EntropySource};
use beacon_crypto::{ChainBuilder, Signer};
use beacon_store::{InsertOutcome, RecordStore, StorageLocation};
use beacon_types::{Record, RecordDraft, Timestamp};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::LedgerError;

type Clock = Box<dyn Fn() -> Timestamp + Send + Sync>;

/// The beacon ledger: an append-only sequence of signed, hash-chained
/// records over an injected [`RecordStore`].
///
/// Appends are optimistic. The tip is read, the link hash and signature are
/// computed without any lock, and the store then assigns the next id and
/// commits only if that id is exactly `tip.id + 1`. Concurrent appends that
/// observed the same tip therefore commit at most once; the rest fail with
/// [`LedgerError::ChainConflict`] and may be retried by the caller.
pub struct Ledger {
    store: Arc<dyn RecordStore>,
    signer: Arc<dyn Signer>,
    entropy: Mutex<Box<dyn EntropySource>>,
    public_key: Vec<u8>,
    config: LedgerConfig,
    clock: Clock,
    closed: AtomicBool,
}

impl Ledger {
    /// Open the store at `location` and build a ledger over it.
    pub fn open(
        location: &StorageLocation,
        signer: Arc<dyn Signer>,
        entropy: Box<dyn EntropySource>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let store = location.open()?;
        let ledger = Self::with_store(store, signer, entropy, config)?;
        let records = ledger.store.len()?;
        info!(
            %location,
            records,
            bits_len = ledger.config.bits_len.bytes(),
            "ledger opened"
        );
        Ok(ledger)
    }

    /// Build a ledger over an already opened store.
    pub fn with_store(
        store: Arc<dyn RecordStore>,
        signer: Arc<dyn Signer>,
        entropy: Box<dyn EntropySource>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let public_key = signer.public_key();
        if public_key.is_empty() {
            return Err(LedgerError::Config(
                "signer exposes an empty public key".into(),
            ));
        }
        if let Some(tip) = store.latest()? {
            let expected = config.bits_len.bytes();
            if tip.bits.len() != expected {
                return Err(LedgerError::Config(format!(
                    "configured for {expected}-byte records but the store holds {}-byte records",
                    tip.bits.len()
                )));
            }
        }
        Ok(Self {
            store,
            signer,
            entropy: Mutex::new(entropy),
            public_key,
            config,
            clock: Box::new(Timestamp::now),
            closed: AtomicBool::new(false),
        })
    }

    /// Replace the wall clock used to stamp new records.
    pub fn with_clock(mut self, clock: impl Fn() -> Timestamp + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Close the ledger and its store. Every later call fails with
    /// [`LedgerError::Closed`]; a second `close` with
    /// [`LedgerError::AlreadyClosed`].
    pub fn close(&self) -> Result<(), LedgerError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(LedgerError::AlreadyClosed);
        }
        self.store.close()?;
        info!("ledger closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Create, sign and durably append a new record.
    pub fn append(&self) -> Result<Record, LedgerError> {
        self.ensure_open()?;

        let bits = self.draw_bits()?;
        let previous = self.store.latest()?;
        let hash = ChainBuilder::link_hash(previous.as_ref(), &self.public_key, &bits);
        let signature = self
            .signer
            .sign(&ChainBuilder::signing_payload(&bits, &hash))?;

        let now = (self.clock)();
        let time = match &previous {
            Some(prev) if prev.time > now => prev.time,
            _ => now,
        };

        let expected = previous.as_ref().map_or(1, |p| p.id + 1);
        let draft = RecordDraft {
            bits,
            time,
            hash,
            signature,
        };

        match self
            .store
            .insert_atomically(draft, &|assigned| assigned == expected)?
        {
            InsertOutcome::Committed(record) => {
                debug!(
                    id = record.id,
                    hash = %record.hash.short_hex(),
                    time = %record.time,
                    "record appended"
                );
                Ok(record)
            }
            InsertOutcome::RolledBack { assigned } => {
                warn!(expected, assigned, "concurrent append detected; insert rolled back");
                Err(LedgerError::ChainConflict { expected, assigned })
            }
        }
    }

    /// The record with the highest id.
    pub fn latest(&self) -> Result<Record, LedgerError> {
        self.ensure_open()?;
        self.store.latest()?.ok_or(LedgerError::NoRecords)
    }

    /// The record with exactly this id.
    pub fn select(&self, id: u64) -> Result<Record, LedgerError> {
        self.ensure_open()?;
        self.store.get(id)?.ok_or(LedgerError::NoRecords)
    }

    /// The latest record at or before `t`. Among records sharing the same
    /// time, the one with the highest id.
    pub fn before(&self, t: Timestamp) -> Result<Record, LedgerError> {
        self.ensure_open()?;
        self.store.seek_time_le(t)?.ok_or(LedgerError::NoRecords)
    }

    /// The earliest record at or after `t`. Among records sharing the same
    /// time, the one with the lowest id.
    pub fn after(&self, t: Timestamp) -> Result<Record, LedgerError> {
        self.ensure_open()?;
        self.store.seek_time_ge(t)?.ok_or(LedgerError::NoRecords)
    }

    /// Number of committed records.
    pub fn len(&self) -> Result<u64, LedgerError> {
        self.ensure_open()?;
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    /// The signer's encoded public key; the genesis record chains from it.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.is_closed() {
            return Err(LedgerError::Closed);
        }
        Ok(())
    }

    fn draw_bits(&self) -> Result<Vec<u8>, LedgerError> {
        let mut source = self
            .entropy
            .lock()
            .map_err(|_| LedgerError::EntropySource("entropy lock poisoned".into()))?;
        Ok(entropy::draw(source.as_mut(), self.config.bits_len.bytes())?)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
