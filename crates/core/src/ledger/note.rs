//! Notes and the principals that own them

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{Commitment, Nullifier};

/// A named participant (`Alice`, `Bob`, ...)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Principal {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.0)
    }
}

/// Sequential note identifier, unique for the lifetime of a ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A private unit of value
///
/// Everything except the spend transition is fixed at creation:
/// - `nullifier` and `spent` flip together, exactly once
/// - `leaf_index` is set once the commitment lands in the note-hash tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    pub value: u64,
    pub owner: Principal,
    pub commitment: Commitment,
    pub nullifier: Option<Nullifier>,
    pub spent: bool,
    /// Position of the commitment in the note-hash tree
    pub leaf_index: Option<u64>,
}

impl Note {
    pub(crate) fn new(id: NoteId, owner: Principal, value: u64, commitment: Commitment) -> Self {
        Self {
            id,
            value,
            owner,
            commitment,
            nullifier: None,
            spent: false,
            leaf_index: None,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Returns `false` (and changes nothing) if the note was already spent
    pub(crate) fn mark_spent(&mut self, nullifier: Nullifier) -> bool {
        if self.spent {
            return false;
        }
        self.spent = true;
        self.nullifier = Some(nullifier);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> Note {
        Note::new(
            NoteId(1),
            Principal::from("Alice"),
            100,
            Commitment::from_bytes([1u8; 32]),
        )
    }

    #[test]
    fn test_new_note_is_unspent() {
        let note = sample_note();

        assert!(!note.is_spent());
        assert!(note.nullifier.is_none());
        assert!(note.leaf_index.is_none());
    }

    #[test]
    fn test_mark_spent_only_once() {
        let mut note = sample_note();
        let first = Nullifier::from_bytes([2u8; 32]);
        let second = Nullifier::from_bytes([3u8; 32]);

        assert!(note.mark_spent(first));
        assert!(!note.mark_spent(second));

        // First nullifier sticks
        assert_eq!(note.nullifier, Some(first));
        assert!(note.is_spent());
    }

    #[test]
    fn test_principal_serializes_as_string() {
        let json = serde_json::to_string(&Principal::from("Bob")).unwrap();
        assert_eq!(json, "\"Bob\"");
        assert_eq!(NoteId(4).to_string(), "#4");
    }
}
