//! Identifier derivation for notes and nullifiers
//!
//! The engine never builds identifiers itself; it asks a `Derivation`.
//! `Blake3Derivation` is the default policy: random commitments,
//! deterministic nullifiers.

pub mod commitment;
pub mod nullifier;

pub use commitment::Commitment;
pub use nullifier::{Nullifier, NullifierKey};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::ledger::Principal;

/// Source of commitments, nullifiers and nullifier keys
pub trait Derivation {
    /// Allocate a fresh nullifier key for a principal
    fn nullifier_key(&mut self, owner: &Principal) -> NullifierKey;

    /// Allocate a fresh commitment for a new note
    fn note_commitment(&mut self, owner: &Principal, value: u64) -> Commitment;

    /// Nullifier of a note; must return the same value for the same inputs
    fn note_nullifier(&self, key: &NullifierKey, commitment: &Commitment) -> Nullifier;

    /// Nullifier of a voter in an election; must be deterministic
    fn vote_nullifier(&self, key: &NullifierKey, election: u64) -> Nullifier;
}

/// Default derivation policy backed by BLAKE3
#[derive(Clone, Debug)]
pub struct Blake3Derivation {
    rng: StdRng,
}

impl Default for Blake3Derivation {
    fn default() -> Self {
        Self::new()
    }
}

impl Blake3Derivation {
    /// Salts and keys drawn from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible identifiers for replays and tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when a seed is given, OS entropy otherwise
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::new(),
        }
    }
}

impl Derivation for Blake3Derivation {
    fn nullifier_key(&mut self, _owner: &Principal) -> NullifierKey {
        NullifierKey::random(&mut self.rng)
    }

    fn note_commitment(&mut self, owner: &Principal, value: u64) -> Commitment {
        let mut salt = [0u8; 32];
        self.rng.fill_bytes(&mut salt);
        Commitment::derive(owner, value, &salt)
    }

    fn note_nullifier(&self, key: &NullifierKey, commitment: &Commitment) -> Nullifier {
        Nullifier::for_note(key, commitment)
    }

    fn vote_nullifier(&self, key: &NullifierKey, election: u64) -> Nullifier {
        Nullifier::for_vote(key, election)
    }
}
