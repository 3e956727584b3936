//! Nullifier derivation for double-spend and double-vote prevention
//!
//! Nullifiers are deterministic so that a replay produces the same value
//! and is caught by the nullifier tree:
//! 1. note nullifier = BLAKE3(NOTE_DOMAIN || nullifier_key || commitment)
//! 2. vote nullifier = BLAKE3(VOTE_DOMAIN || nullifier_key || election)
//!
//! The vote nullifier does not depend on the candidate: one voter, one
//! nullifier per election, whatever they vote for.
//!
//! Uniqueness is enforced by the tree, never by the derivation.

use std::fmt;

use rand::RngCore;

use super::commitment::Commitment;

/// Domain separator for note nullifiers
const NOTE_NULLIFIER_DOMAIN: &[u8] = b"LEDGERLENS_NOTE_NULLIFIER_V1";
/// Domain separator for vote nullifiers
const VOTE_NULLIFIER_DOMAIN: &[u8] = b"LEDGERLENS_VOTE_NULLIFIER_V1";

/// Per-principal secret used for nullifier derivation
///
/// Never leaves the principal's private account.
#[derive(Clone, PartialEq, Eq)]
pub struct NullifierKey([u8; 32]);

impl NullifierKey {
    /// Sample a key from the given RNG
    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for NullifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NullifierKey(<redacted>)")
    }
}

/// A nullifier that marks a note (or a vote) as consumed
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nullifier([u8; 32]);

impl Nullifier {
    /// Derive the nullifier of a note from its owner's key and its commitment
    pub fn for_note(key: &NullifierKey, commitment: &Commitment) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(NOTE_NULLIFIER_DOMAIN);
        hasher.update(key.as_bytes());
        hasher.update(commitment.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Derive a voter's nullifier for a given election
    pub fn for_vote(key: &NullifierKey, election: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(VOTE_NULLIFIER_DOMAIN);
        hasher.update(key.as_bytes());
        hasher.update(&election.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full `0x`-prefixed hex form
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Abbreviated form for display
    pub fn short(&self) -> String {
        format!("0x{}...", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({})", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_note_nullifier_deterministic() {
        let key = NullifierKey::from_bytes([1u8; 32]);
        let commitment = Commitment::from_bytes([2u8; 32]);

        let n1 = Nullifier::for_note(&key, &commitment);
        let n2 = Nullifier::for_note(&key, &commitment);

        assert_eq!(n1, n2);
    }

    #[test]
    fn test_note_nullifier_unique_per_commitment() {
        let key = NullifierKey::from_bytes([1u8; 32]);

        let n1 = Nullifier::for_note(&key, &Commitment::from_bytes([2u8; 32]));
        let n2 = Nullifier::for_note(&key, &Commitment::from_bytes([3u8; 32]));

        assert_ne!(n1, n2);
    }

    #[test]
    fn test_note_nullifier_unique_per_key() {
        let commitment = Commitment::from_bytes([2u8; 32]);

        let n1 = Nullifier::for_note(&NullifierKey::from_bytes([1u8; 32]), &commitment);
        let n2 = Nullifier::for_note(&NullifierKey::from_bytes([9u8; 32]), &commitment);

        assert_ne!(n1, n2);
    }

    #[test]
    fn test_vote_nullifier_per_election() {
        let key = NullifierKey::from_bytes([4u8; 32]);

        assert_eq!(Nullifier::for_vote(&key, 100), Nullifier::for_vote(&key, 100));
        assert_ne!(Nullifier::for_vote(&key, 100), Nullifier::for_vote(&key, 101));
    }

    #[test]
    fn test_vote_and_note_domains_differ() {
        let key = NullifierKey::from_bytes([0u8; 32]);
        let commitment = Commitment::from_bytes([0u8; 32]);

        assert_ne!(
            Nullifier::for_vote(&key, 0),
            Nullifier::for_note(&key, &commitment)
        );
    }

    #[test]
    fn test_random_keys_differ() {
        let mut rng = StdRng::seed_from_u64(42);
        let k1 = NullifierKey::random(&mut rng);
        let k2 = NullifierKey::random(&mut rng);

        assert_ne!(k1, k2);
        assert_eq!(format!("{:?}", k1), "NullifierKey(<redacted>)");
    }
}
