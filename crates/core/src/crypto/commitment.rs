//! Note commitments
//!
//! A commitment stands in for the public hash of a private note:
//! C = BLAKE3(domain || owner || value || salt)
//!
//! The salt is fresh per note, so two notes with identical owner and value
//! still publish different commitments. Nothing here is hiding or binding in
//! a cryptographic sense; the value only has to be opaque and unique enough
//! for the simulation.

use std::fmt;

use crate::ledger::Principal;

/// Domain separator for note commitments
const COMMITMENT_DOMAIN: &[u8] = b"LEDGERLENS_NOTE_COMMITMENT_V1";

/// Opaque 32-byte note commitment
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// Derive a commitment from the note's opening and a salt
    pub fn derive(owner: &Principal, value: u64, salt: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(COMMITMENT_DOMAIN);
        hasher.update(&(owner.as_str().len() as u64).to_le_bytes());
        hasher.update(owner.as_str().as_bytes());
        hasher.update(&value.to_le_bytes());
        hasher.update(salt);

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

    /// Abbreviated form for display, e.g. `0x1a2b3c4d...`
    pub fn short(&self) -> String {
        format!("0x{}...", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.short())
    }
}
