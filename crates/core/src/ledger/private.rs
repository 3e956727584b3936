//! Private per-principal state
//!
//! One `Account` per principal, keyed by the principal itself. Each account
//! holds the principal's nullifier key, its notes and its private voting
//! record. Nothing in here is visible to the public collections.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use super::note::{Note, NoteId, Principal};
use crate::crypto::{Commitment, Derivation, Nullifier, NullifierKey};
use crate::state::Candidate;

/// Upper bound on a single note's value
pub const MAX_NOTE_VALUE: u64 = 1_000_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown principal: {0}")]
    UnknownOwner(Principal),
    #[error("Unknown note: {0}")]
    UnknownNote(NoteId),
    #[error("Note {0} already spent")]
    AlreadySpent(NoteId),
    #[error("Insufficient balance for {owner}: {available} < {requested}")]
    InsufficientBalance {
        owner: Principal,
        available: u64,
        requested: u64,
    },
    #[error("Invalid note value: {0}")]
    InvalidValue(u64),
    #[error("Negative change: {total} - {amount}")]
    NegativeChange { total: u64, amount: u64 },
}

/// Private voting state of a principal
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoterRecord {
    pub has_voted: bool,
    pub nullifier: Option<Nullifier>,
    pub voted_for: Option<Candidate>,
}

/// Everything a principal keeps on their own device
#[derive(Clone, Debug)]
pub struct Account {
    key: NullifierKey,
    notes: Vec<Note>,
    vote: VoterRecord,
}

impl Account {
    fn new(key: NullifierKey) -> Self {
        Self {
            key,
            notes: Vec::new(),
            vote: VoterRecord::default(),
        }
    }
}

/// Notes chosen to fund a transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendSelection {
    pub consumed: Vec<Note>,
    pub total: u64,
}

/// Collection of all private accounts
#[derive(Clone, Debug, Default)]
pub struct PrivateLedger {
    accounts: BTreeMap<Principal, Account>,
    /// note id -> owner, for lookups by id
    owners: HashMap<NoteId, Principal>,
    next_note_id: u64,
}

impl PrivateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal. Returns `false` if the account already exists.
    pub fn open_account(&mut self, owner: Principal, key: NullifierKey) -> bool {
        if self.accounts.contains_key(&owner) {
            return false;
        }
        self.accounts.insert(owner, Account::new(key));
        true
    }

    pub fn has_account(&self, owner: &Principal) -> bool {
        self.accounts.contains_key(owner)
    }

    /// Principals in name order
    pub fn principals(&self) -> impl Iterator<Item = &Principal> {
        self.accounts.keys()
    }

    fn account(&self, owner: &Principal) -> Result<&Account, LedgerError> {
        self.accounts
            .get(owner)
            .ok_or_else(|| LedgerError::UnknownOwner(owner.clone()))
    }

    fn account_mut(&mut self, owner: &Principal) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(owner)
            .ok_or_else(|| LedgerError::UnknownOwner(owner.clone()))
    }

    fn note_mut(&mut self, id: NoteId) -> Result<&mut Note, LedgerError> {
        let owner = self
            .owners
            .get(&id)
            .cloned()
            .ok_or(LedgerError::UnknownNote(id))?;
        self.account_mut(&owner)?
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(LedgerError::UnknownNote(id))
    }

    pub fn nullifier_key(&self, owner: &Principal) -> Result<&NullifierKey, LedgerError> {
        Ok(&self.account(owner)?.key)
    }

    /// All notes of a principal, spent and unspent, in creation order
    pub fn notes_of(&self, owner: &Principal) -> Result<&[Note], LedgerError> {
        Ok(&self.account(owner)?.notes)
    }

    pub fn unspent_notes_of(&self, owner: &Principal) -> Result<Vec<&Note>, LedgerError> {
        Ok(self
            .account(owner)?
            .notes
            .iter()
            .filter(|n| !n.is_spent())
            .collect())
    }

    /// Sum of unspent note values
    pub fn balance_of(&self, owner: &Principal) -> Result<u64, LedgerError> {
        Ok(self
            .account(owner)?
            .notes
            .iter()
            .filter(|n| !n.is_spent())
            .map(|n| n.value)
            .sum())
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        let owner = self.owners.get(&id)?;
        self.accounts
            .get(owner)?
            .notes
            .iter()
            .find(|n| n.id == id)
    }

    /// Choose notes covering `amount`
    ///
    /// Policy: consume every unspent note of the owner. The whole surplus
    /// comes back as a single change note.
    pub fn select_spend_candidates(
        &self,
        owner: &Principal,
        amount: u64,
    ) -> Result<SpendSelection, LedgerError> {
        let consumed: Vec<Note> = self
            .unspent_notes_of(owner)?
            .into_iter()
            .cloned()
            .collect();
        let total: u64 = consumed.iter().map(|n| n.value).sum();

        if total < amount {
            return Err(LedgerError::InsufficientBalance {
                owner: owner.clone(),
                available: total,
                requested: amount,
            });
        }

        Ok(SpendSelection { consumed, total })
    }

    /// Allocate a new unspent note for `owner`
    pub fn create_note(
        &mut self,
        owner: &Principal,
        value: u64,
        commitment: Commitment,
    ) -> Result<Note, LedgerError> {
        if value > MAX_NOTE_VALUE {
            return Err(LedgerError::InvalidValue(value));
        }

        let id = NoteId(self.next_note_id);
        let account = self.account_mut(owner)?;
        let note = Note::new(id, owner.clone(), value, commitment);
        account.notes.push(note.clone());

        self.next_note_id += 1;
        self.owners.insert(id, owner.clone());
        Ok(note)
    }

    /// Nullifier the note would publish when spent, without spending it
    pub fn derive_nullifier<D: Derivation + ?Sized>(
        &self,
        id: NoteId,
        derivation: &D,
    ) -> Result<Nullifier, LedgerError> {
        let note = self.note(id).ok_or(LedgerError::UnknownNote(id))?;
        let key = self.nullifier_key(&note.owner)?;
        Ok(derivation.note_nullifier(key, &note.commitment))
    }

    /// Mark a note spent and return its nullifier
    ///
    /// Fails with `AlreadySpent` on every call after the first.
    pub fn spend<D: Derivation + ?Sized>(
        &mut self,
        id: NoteId,
        derivation: &D,
    ) -> Result<Nullifier, LedgerError> {
        let nullifier = self.derive_nullifier(id, derivation)?;
        let note = self.note_mut(id)?;
        if !note.mark_spent(nullifier) {
            return Err(LedgerError::AlreadySpent(id));
        }
        Ok(nullifier)
    }

    pub(crate) fn set_leaf_index(&mut self, id: NoteId, leaf_index: u64) -> Result<(), LedgerError> {
        self.note_mut(id)?.leaf_index = Some(leaf_index);
        Ok(())
    }

    pub fn voter_record(&self, voter: &Principal) -> Result<&VoterRecord, LedgerError> {
        Ok(&self.account(voter)?.vote)
    }

    pub(crate) fn record_vote(
        &mut self,
        voter: &Principal,
        nullifier: Nullifier,
        candidate: Candidate,
    ) -> Result<(), LedgerError> {
        let record = &mut self.account_mut(voter)?.vote;
        record.has_voted = true;
        record.nullifier = Some(nullifier);
        record.voted_for = Some(candidate);
        Ok(())
    }
}

/// Value returned to the sender after covering `amount`
pub fn change_value(consumed_total: u64, amount: u64) -> Result<u64, LedgerError> {
    consumed_total
        .checked_sub(amount)
        .ok_or(LedgerError::NegativeChange {
            total: consumed_total,
            amount,
        })
}
