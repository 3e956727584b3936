//! Nullifier tree
//!
//! Append-only set of spent markers. Insertion order is kept for display;
//! a hash index backs the membership check. `insert_if_absent` is the one
//! and only double-spend / double-vote guard.

use std::collections::HashSet;

use crate::crypto::{Commitment, Nullifier};
use crate::ledger::Principal;

/// Domain separator for the running root
const ROOT_DOMAIN: &[u8] = b"LEDGERLENS_NULLIFIER_ROOT_V1";

/// A published nullifier plus demo-only metadata
///
/// The back-references exist for traceability in the simulation. A real
/// system would never publish them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NullifierRecord {
    pub value: Nullifier,
    /// Commitment of the note this nullifier spends
    pub note_commitment: Option<Commitment>,
    /// Voter that published this nullifier
    pub voter: Option<Principal>,
}

impl NullifierRecord {
    pub fn new(value: Nullifier) -> Self {
        Self {
            value,
            note_commitment: None,
            voter: None,
        }
    }

    pub fn for_note(value: Nullifier, commitment: Commitment) -> Self {
        Self {
            value,
            note_commitment: Some(commitment),
            voter: None,
        }
    }

    pub fn for_voter(value: Nullifier, voter: Principal) -> Self {
        Self {
            value,
            note_commitment: None,
            voter: Some(voter),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NullifierTree {
    records: Vec<NullifierRecord>,
    index: HashSet<Nullifier>,
    root: [u8; 32],
}

impl Default for NullifierTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NullifierTree {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            index: HashSet::new(),
            root: [0u8; 32],
        }
    }

    /// Returns `true` if the nullifier has already been published.
    pub fn contains(&self, nullifier: &Nullifier) -> bool {
        self.index.contains(nullifier)
    }

    /// Insert a record unless its value is already present.
    ///
    /// Returns `true` if the record was newly inserted, `false` if the value
    /// already existed (the tree is left untouched).
    pub fn insert_if_absent(&mut self, record: NullifierRecord) -> bool {
        if !self.index.insert(record.value) {
            return false;
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(ROOT_DOMAIN);
        hasher.update(&self.root);
        hasher.update(record.value.as_bytes());
        self.root = *hasher.finalize().as_bytes();

        self.records.push(record);
        true
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &NullifierRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[NullifierRecord] {
        &self.records
    }

    /// Number of published nullifiers
    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Running digest over published values
    pub fn root(&self) -> [u8; 32] {
        self.root
    }
}
