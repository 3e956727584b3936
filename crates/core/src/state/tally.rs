//! Public voting state
//!
//! The tally is a candidate -> count map, kept in configured order. Counts
//! only ever move by +1, and only from the public-execution phase.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Principal;

/// Candidate identifier (`Candidate A`, ...)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(String);

impl Candidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Candidate {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Candidate {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Candidate({})", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    #[error("Unknown candidate: {0}")]
    UnknownCandidate(Candidate),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(Candidate, u64)>,
}

impl Tally {
    /// All candidates start at zero; duplicates are collapsed
    pub fn new<I: IntoIterator<Item = Candidate>>(candidates: I) -> Self {
        let mut counts: Vec<(Candidate, u64)> = Vec::new();
        for candidate in candidates {
            if !counts.iter().any(|(c, _)| *c == candidate) {
                counts.push((candidate, 0));
            }
        }
        Self { counts }
    }

    pub fn is_candidate(&self, candidate: &Candidate) -> bool {
        self.counts.iter().any(|(c, _)| c == candidate)
    }

    pub fn count_of(&self, candidate: &Candidate) -> Option<u64> {
        self.counts
            .iter()
            .find(|(c, _)| c == candidate)
            .map(|(_, count)| *count)
    }

    /// Add exactly one vote and return the new count
    pub fn increment(&mut self, candidate: &Candidate) -> Result<u64, TallyError> {
        let entry = self
            .counts
            .iter_mut()
            .find(|(c, _)| c == candidate)
            .ok_or_else(|| TallyError::UnknownCandidate(candidate.clone()))?;
        entry.1 += 1;
        Ok(entry.1)
    }

    /// Sum over all candidates
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    /// (candidate, count) pairs in configured order
    pub fn iter(&self) -> impl Iterator<Item = (&Candidate, u64)> {
        self.counts.iter().map(|(c, count)| (c, *count))
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.counts.iter().map(|(c, _)| c)
    }
}

/// Public storage of the voting contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VotingState {
    pub admin: Principal,
    pub vote_ended: bool,
    /// Election identifier, also the vote-nullifier domain
    pub active_at_block: u64,
    pub tally: Tally,
}

impl VotingState {
    pub fn new(admin: Principal, active_at_block: u64, candidates: Vec<Candidate>) -> Self {
        Self {
            admin,
            vote_ended: false,
            active_at_block,
            tally: Tally::new(candidates),
        }
    }

    pub fn is_admin(&self, caller: &Principal) -> bool {
        self.admin == *caller
    }

    /// Close the vote. Returns `false` if it was already closed.
    pub fn end(&mut self) -> bool {
        let was_open = !self.vote_ended;
        self.vote_ended = true;
        was_open
    }
}
