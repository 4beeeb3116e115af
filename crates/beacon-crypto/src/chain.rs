use beacon_types::{LinkHash, Record};

use crate::signer::VerifyingKey;

const LINK_DOMAIN: &[u8] = b"beacon-link-v1:";

/// Computes link hashes for new records.
///
/// The chain input is the previous record's `hash`, or the signer's encoded
/// public key for the genesis record. The digest is BLAKE3 over
///
/// ```text
/// "beacon-link-v1:" ‖ hex(chain_input) ‖ ":" ‖ hex(new_bits)
/// ```
///
/// with lowercase hex. `:` cannot occur inside hex, so the preimage is
/// unambiguous for any input lengths.
pub struct ChainBuilder;

impl ChainBuilder {
    /// Link hash for a record carrying `new_bits` appended after `previous`.
    pub fn link_hash(previous: Option<&Record>, public_key: &[u8], new_bits: &[u8]) -> LinkHash {
        match previous {
            None => Self::hash_input(public_key, new_bits),
            Some(prev) => Self::hash_input(prev.hash.as_bytes(), new_bits),
        }
    }

    /// The message a record's signature covers: `bits ‖ hash`.
    pub fn signing_payload(bits: &[u8], hash: &LinkHash) -> Vec<u8> {
        let mut payload = Vec::with_capacity(bits.len() + LinkHash::LEN);
        payload.extend_from_slice(bits);
        payload.extend_from_slice(hash.as_bytes());
        payload
    }

    fn hash_input(chain_input: &[u8], new_bits: &[u8]) -> LinkHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(LINK_DOMAIN);
        hasher.update(hex::encode(chain_input).as_bytes());
        hasher.update(b":");
        hasher.update(hex::encode(new_bits).as_bytes());
        LinkHash::from_bytes(*hasher.finalize().as_bytes())
    }
}

/// Verifies that a run of records forms a valid signed chain.
///
/// Checks, in order for each record:
/// 1. ids are consecutive
/// 2. the link hash recomputes from its predecessor (or the public key)
/// 3. the signature over `bits ‖ hash` verifies
/// 4. time does not go backwards
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify a chain that starts at the genesis record.
    pub fn verify_chain(records: &[Record], key: &VerifyingKey) -> Result<(), ChainError> {
        if let Some(first) = records.first() {
            if first.id != 1 {
                return Err(ChainError::MissingGenesis { first: first.id });
            }
        }
        Self::verify_segment(None, records, key)
    }

    /// Verify `records` as the continuation of `anchor`, which is trusted.
    pub fn verify_segment(
        anchor: Option<&Record>,
        records: &[Record],
        key: &VerifyingKey,
    ) -> Result<(), ChainError> {
        let public_key = key.as_bytes();
        let mut previous = anchor;

        for record in records {
            let expected_id = previous.map_or(1, |p| p.id + 1);
            if record.id != expected_id {
                return Err(ChainError::Gap {
                    expected: expected_id,
                    found: record.id,
                });
            }

            let computed = ChainBuilder::link_hash(previous, &public_key, &record.bits);
            if computed != record.hash {
                return Err(ChainError::HashMismatch { id: record.id });
            }

            let payload = ChainBuilder::signing_payload(&record.bits, &record.hash);
            if key.verify(&payload, &record.signature).is_err() {
                return Err(ChainError::BadSignature { id: record.id });
            }

            if let Some(prev) = previous {
                if record.time < prev.time {
                    return Err(ChainError::TimeRegression { id: record.id });
                }
            }

            previous = Some(record);
        }

        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain does not start at genesis: first id is {first}")]
    MissingGenesis { first: u64 },

    #[error("id gap: expected {expected}, found {found}")]
    Gap { expected: u64, found: u64 },

    #[error("link hash mismatch at id {id}")]
    HashMismatch { id: u64 },

    #[error("invalid signature at id {id}")]
    BadSignature { id: u64 },

    #[error("time goes backwards at id {id}")]
    TimeRegression { id: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::Timestamp;
    use proptest::prelude::*;

    use crate::signer::{Signer, SigningKey};

    fn build_chain(key: &SigningKey, count: usize) -> Vec<Record> {
        let public_key = key.public_key();
        let mut chain: Vec<Record> = Vec::new();
        for i in 0..count {
            let bits = vec![i as u8; 32];
            let hash = ChainBuilder::link_hash(chain.last(), &public_key, &bits);
            let signature = key
                .sign(&ChainBuilder::signing_payload(&bits, &hash))
                .unwrap();
            chain.push(Record {
                id: i as u64 + 1,
                bits,
                time: Timestamp::from_millis(1_000 + i as i64),
                hash,
                signature,
            });
        }
        chain
    }

    #[test]
    fn genesis_chains_from_public_key() {
        let key = SigningKey::from_bytes([7; 32]);
        let bits = [1u8; 32];
        let genesis = ChainBuilder::link_hash(None, &key.public_key(), &bits);
        let other_key = SigningKey::from_bytes([8; 32]);
        assert_ne!(
            genesis,
            ChainBuilder::link_hash(None, &other_key.public_key(), &bits)
        );
    }

    #[test]
    fn link_uses_previous_hash_not_bits() {
        let key = SigningKey::from_bytes([7; 32]);
        let chain = build_chain(&key, 1);
        let mut twin = chain[0].clone();
        twin.hash = LinkHash::from_bytes([0xaa; 32]);
        let bits = [9u8; 32];
        // Same bits, different hash: the link must change.
        assert_ne!(
            ChainBuilder::link_hash(Some(&chain[0]), &[], &bits),
            ChainBuilder::link_hash(Some(&twin), &[], &bits)
        );
        // Different bits, same hash: the link must not change.
        let mut other_bits = chain[0].clone();
        other_bits.bits = vec![0xff; 32];
        assert_eq!(
            ChainBuilder::link_hash(Some(&chain[0]), &[], &bits),
            ChainBuilder::link_hash(Some(&other_bits), &[], &bits)
        );
    }

    #[test]
    fn encoding_is_not_raw_concatenation() {
        // Raw concatenation would make these two preimages identical.
        let a = ChainBuilder::hash_input(&[1, 2], &[3]);
        let b = ChainBuilder::hash_input(&[1], &[2, 3]);
        assert_ne!(a, b);
    }

    #[test]
    fn signing_payload_is_bits_then_hash() {
        let hash = LinkHash::from_bytes([2; 32]);
        let payload = ChainBuilder::signing_payload(&[1, 1], &hash);
        assert_eq!(payload.len(), 34);
        assert_eq!(&payload[..2], &[1, 1]);
        assert_eq!(&payload[2..], &[2; 32]);
    }

    #[test]
    fn empty_chain_is_valid() {
        let key = SigningKey::from_bytes([1; 32]);
        assert!(ChainVerifier::verify_chain(&[], &key.verifying_key()).is_ok());
    }

    #[test]
    fn valid_chain_verifies() {
        let key = SigningKey::from_bytes([1; 32]);
        let chain = build_chain(&key, 10);
        assert!(ChainVerifier::verify_chain(&chain, &key.verifying_key()).is_ok());
    }

    #[test]
    fn segment_verifies_against_anchor() {
        let key = SigningKey::from_bytes([1; 32]);
        let chain = build_chain(&key, 5);
        assert!(
            ChainVerifier::verify_segment(Some(&chain[1]), &chain[2..], &key.verifying_key())
                .is_ok()
        );
        assert_eq!(
            ChainVerifier::verify_chain(&chain[2..], &key.verifying_key()).unwrap_err(),
            ChainError::MissingGenesis { first: 3 }
        );
    }

    #[test]
    fn gap_detected() {
        let key = SigningKey::from_bytes([1; 32]);
        let mut chain = build_chain(&key, 4);
        chain.remove(2);
        assert_eq!(
            ChainVerifier::verify_chain(&chain, &key.verifying_key()).unwrap_err(),
            ChainError::Gap {
                expected: 3,
                found: 4
            }
        );
    }

    #[test]
    fn tampered_bits_detected() {
        let key = SigningKey::from_bytes([1; 32]);
        let mut chain = build_chain(&key, 3);
        chain[1].bits[0] ^= 0xff;
        assert_eq!(
            ChainVerifier::verify_chain(&chain, &key.verifying_key()).unwrap_err(),
            ChainError::HashMismatch { id: 2 }
        );
    }

    #[test]
    fn foreign_signature_detected() {
        let key = SigningKey::from_bytes([1; 32]);
        let mut chain = build_chain(&key, 3);
        let imposter = SigningKey::from_bytes([2; 32]);
        chain[2].signature = imposter
            .sign(&ChainBuilder::signing_payload(&chain[2].bits, &chain[2].hash))
            .unwrap();
        assert_eq!(
            ChainVerifier::verify_chain(&chain, &key.verifying_key()).unwrap_err(),
            ChainError::BadSignature { id: 3 }
        );
    }

    #[test]
    fn time_regression_detected() {
        let key = SigningKey::from_bytes([1; 32]);
        let mut chain = build_chain(&key, 3);
        chain[2].time = Timestamp::from_millis(0);
        assert_eq!(
            ChainVerifier::verify_chain(&chain, &key.verifying_key()).unwrap_err(),
            ChainError::TimeRegression { id: 3 }
        );
    }

    proptest! {
        #[test]
        fn link_hash_is_deterministic(
            input in proptest::collection::vec(any::<u8>(), 0..96),
            bits in proptest::collection::vec(any::<u8>(), 32..=64),
        ) {
            prop_assert_eq!(
                ChainBuilder::hash_input(&input, &bits),
                ChainBuilder::hash_input(&input, &bits)
            );
        }

        #[test]
        fn distinct_bits_give_distinct_links(
            input in proptest::collection::vec(any::<u8>(), 32),
            a in proptest::collection::vec(any::<u8>(), 32),
            b in proptest::collection::vec(any::<u8>(), 32),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(
                ChainBuilder::hash_input(&input, &a),
                ChainBuilder::hash_input(&input, &b)
            );
        }
    }
}
