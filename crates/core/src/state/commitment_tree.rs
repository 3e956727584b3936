//! Note-hash tree
//!
//! An append-only, order-preserving list of note commitments. It is not a
//! Merkle tree: there are no membership proofs. `root()` is a running BLAKE3
//! chain over the leaves (root_n = H(root_{n-1} || leaf_n)). It changes on
//! every append and is what settlement records.

use crate::crypto::Commitment;

/// Domain separator for the running root
const ROOT_DOMAIN: &[u8] = b"LEDGERLENS_NOTE_HASH_ROOT_V1";

#[derive(Clone, Debug)]
pub struct CommitmentTree {
    leaves: Vec<Commitment>,
    root: [u8; 32],
}

impl Default for CommitmentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            leaves: Vec::new(),
            root: [0u8; 32],
        }
    }

    /// Append a commitment and return its leaf index
    pub fn append(&mut self, commitment: Commitment) -> u64 {
        let leaf_index = self.leaves.len() as u64;

        let mut hasher = blake3::Hasher::new();
        hasher.update(ROOT_DOMAIN);
        hasher.update(&self.root);
        hasher.update(commitment.as_bytes());
        self.root = *hasher.finalize().as_bytes();

        self.leaves.push(commitment);
        leaf_index
    }

    pub fn get(&self, index: u64) -> Option<&Commitment> {
        self.leaves.get(index as usize)
    }

    pub fn contains(&self, commitment: &Commitment) -> bool {
        self.leaves.contains(commitment)
    }

    /// Leaves in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Commitment> {
        self.leaves.iter()
    }

    pub fn as_slice(&self) -> &[Commitment] {
        &self.leaves
    }

    /// Get the number of leaves in the tree
    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Running digest over all leaves
    pub fn root(&self) -> [u8; 32] {
        self.root
    }
}
