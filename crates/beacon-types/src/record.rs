use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::temporal::Timestamp;

/// Digest linking a record to its predecessor (or, for the genesis record,
/// to the signer's public key).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkHash([u8; 32]);

impl LinkHash {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl TryFrom<&[u8]> for LinkHash {
    type Error = TypeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl From<[u8; 32]> for LinkHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for LinkHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::hexser::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for LinkHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = crate::hexser::deserialize(deserializer)?;
        Self::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for LinkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkHash({})", self.short_hex())
    }
}

impl fmt::Display for LinkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Size of the entropy payload carried by every record of a deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum BitsLength {
    /// 32 bytes (256 bits).
    Short,
    /// 64 bytes (512 bits).
    #[default]
    Long,
}

impl BitsLength {
    pub const fn bytes(self) -> usize {
        match self {
            Self::Short => 32,
            Self::Long => 64,
        }
    }
}

impl TryFrom<usize> for BitsLength {
    type Error = TypeError;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        match n {
            32 => Ok(Self::Short),
            64 => Ok(Self::Long),
            other => Err(TypeError::UnsupportedBitsLength(other)),
        }
    }
}

impl From<BitsLength> for usize {
    fn from(len: BitsLength) -> Self {
        len.bytes()
    }
}

/// A committed beacon record. Immutable once the store has assigned its id.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned sequence number, gapless from 1.
    pub id: u64,
    /// Entropy payload.
    #[serde(with = "crate::hexser")]
    pub bits: Vec<u8>,
    /// Append time captured by the ledger.
    pub time: Timestamp,
    /// Link hash to the predecessor.
    pub hash: LinkHash,
    /// Signature over `bits ‖ hash`.
    #[serde(with = "crate::hexser")]
    pub signature: Vec<u8>,
}

impl Record {
    /// Drop the id, e.g. to re-submit the same content.
    pub fn into_draft(self) -> RecordDraft {
        RecordDraft {
            bits: self.bits,
            time: self.time,
            hash: self.hash,
            signature: self.signature,
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("bits", &format_args!("{}..", hex::encode(&self.bits[..self.bits.len().min(4)])))
            .field("time", &self.time)
            .field("hash", &self.hash)
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// Fully computed record content awaiting id assignment by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordDraft {
    pub bits: Vec<u8>,
    pub time: Timestamp,
    pub hash: LinkHash,
    pub signature: Vec<u8>,
}

impl RecordDraft {
    /// Attach the id the store assigned at commit.
    pub fn into_record(self, id: u64) -> Record {
        Record {
            id,
            bits: self.bits,
            time: self.time,
            hash: self.hash,
            signature: self.signature,
        }
    }
}
