//! Cryptographic primitives for the randomness beacon.
//!
//! Provides the chain builder (domain-separated BLAKE3 link hashes), the
//! [`Signer`] capability with an Ed25519 implementation, entropy sources,
//! and a chain verifier for audits and tests.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod chain;
pub mod entropy;
pub mod signer;

pub use chain::{ChainBuilder, ChainError, ChainVerifier};
pub use entropy::{EntropyError, EntropySource, OsEntropy, ReaderEntropy, SeededEntropy};
pub use signer::{SignatureError, Signer, SigningKey, VerifyingKey};
