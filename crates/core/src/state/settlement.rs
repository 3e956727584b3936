//! Simulated L1 settlement
//!
//! Each batch records the roots of both public trees and a combined state
//! root: SHA-256(domain || batch || note_hash_root || nullifier_root).
//! Records are append-only.

use sha2::{Digest, Sha256};

use super::commitment_tree::CommitmentTree;
use super::nullifier_tree::NullifierTree;

/// Domain separator for the L1 state root
const STATE_ROOT_DOMAIN: &[u8] = b"LEDGERLENS_L1_STATE_ROOT_V1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementRecord {
    /// Batch number, starting at 0
    pub batch: u64,
    pub note_hash_root: [u8; 32],
    pub nullifier_root: [u8; 32],
    pub state_root: [u8; 32],
    /// Tree sizes at settlement time
    pub commitments: u64,
    pub nullifiers: u64,
}

impl SettlementRecord {
    pub fn state_root_hex(&self) -> String {
        format!("0x{}", hex::encode(self.state_root))
    }
}

fn state_root(batch: u64, note_hash_root: &[u8; 32], nullifier_root: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(STATE_ROOT_DOMAIN);
    hasher.update(batch.to_le_bytes());
    hasher.update(note_hash_root);
    hasher.update(nullifier_root);
    hasher.finalize().into()
}

#[derive(Clone, Debug, Default)]
pub struct SettlementLog {
    records: Vec<SettlementRecord>,
}

impl SettlementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch over the current tree state and return a copy of it
    pub fn settle(&mut self, notes: &CommitmentTree, nullifiers: &NullifierTree) -> SettlementRecord {
        let batch = self.records.len() as u64;
        let note_hash_root = notes.root();
        let nullifier_root = nullifiers.root();

        let record = SettlementRecord {
            batch,
            note_hash_root,
            nullifier_root,
            state_root: state_root(batch, &note_hash_root, &nullifier_root),
            commitments: notes.len(),
            nullifiers: nullifiers.len(),
        };
        self.records.push(record.clone());
        record
    }

    pub fn latest(&self) -> Option<&SettlementRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettlementRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[SettlementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
