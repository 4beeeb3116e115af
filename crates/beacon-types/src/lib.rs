//! Foundation types for the randomness beacon.
//!
//! Every other beacon crate depends on `beacon-types`.
//!
//! # Key Types
//!
//! - [`Record`] -- A committed beacon record: id, entropy bits, time, link hash, signature
//! - [`RecordDraft`] -- A record that has not been assigned an id by the store yet
//! - [`LinkHash`] -- 32-byte digest chaining a record to its predecessor
//! - [`Timestamp`] -- Unix-millisecond append time, the secondary ordering key
//! - [`BitsLength`] -- Deployment-wide entropy payload size (32 or 64 bytes)

pub mod error;
pub mod hexser;
pub mod record;
pub mod temporal;

pub use error::TypeError;
pub use record::{BitsLength, LinkHash, Record, RecordDraft};
pub use temporal::Timestamp;
