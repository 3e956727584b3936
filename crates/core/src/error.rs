//! Unified Error Types for the ledger simulation
//!
//! Every rejection the engine can surface is a `SimulationError`. The lower
//! layers (private ledger, tally) have their own narrow errors which map
//! into the top-level kinds.

use thiserror::Error;

use crate::engine::Phase;
use crate::ledger::{LedgerError, NoteId, Principal};
use crate::state::TallyError;

/// Top-level error type for the simulation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// Malformed operation request (self-transfer, missing candidate, bad amount)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The voter's private record already holds a vote
    #[error("{0} has already voted")]
    AlreadyVoted(Principal),

    /// The note was spent before
    #[error("Note {0} is already spent")]
    AlreadySpent(NoteId),

    /// Unspent notes do not cover the requested amount
    #[error("Insufficient balance for {owner}: available {available}, requested {requested}")]
    InsufficientBalance {
        owner: Principal,
        available: u64,
        requested: u64,
    },

    /// Nullifier already present in the nullifier tree (double-spend / double-vote)
    #[error("Duplicate nullifier: {0}")]
    DuplicateNullifier(String),

    /// The public vote has been closed by the admin
    #[error("Vote has ended")]
    VoteEnded,

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),

    /// A non-terminal session is already in flight
    #[error("Operation already in progress (phase: {0})")]
    OperationInProgress(Phase),

    /// Internal defect; the operation halts without further mutation
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// An advance command was issued out of order
    #[error("Phase mismatch: expected {expected}, current phase is {actual}")]
    PhaseMismatch { expected: Phase, actual: Phase },

    #[error("No operation in progress")]
    NoActiveOperation,

    #[error("Invalid note value: {0}")]
    InvalidValue(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for simulation operations
pub type SimulationResult<T> = Result<T, SimulationError>;

impl SimulationError {
    /// Everything except an invariant violation leaves the engine usable and
    /// can be retried with corrected input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SimulationError::InvariantViolation(_))
    }

    /// Errors that reject a command without touching the in-flight session.
    pub(crate) fn keeps_session(&self) -> bool {
        matches!(
            self,
            SimulationError::PhaseMismatch { .. }
                | SimulationError::NoActiveOperation
                | SimulationError::OperationInProgress(_)
        )
    }
}

impl From<LedgerError> for SimulationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownOwner(owner) => {
                SimulationError::InvalidRequest(format!("unknown principal {}", owner))
            }
            LedgerError::UnknownNote(id) => {
                SimulationError::InvariantViolation(format!("note {} does not exist", id))
            }
            LedgerError::AlreadySpent(id) => SimulationError::AlreadySpent(id),
            LedgerError::InsufficientBalance {
                owner,
                available,
                requested,
            } => SimulationError::InsufficientBalance {
                owner,
                available,
                requested,
            },
            LedgerError::InvalidValue(value) => SimulationError::InvalidValue(value),
            LedgerError::NegativeChange { total, amount } => SimulationError::InvariantViolation(
                format!("change would be negative: {} - {}", total, amount),
            ),
        }
    }
}

impl From<TallyError> for SimulationError {
    fn from(err: TallyError) -> Self {
        match err {
            TallyError::UnknownCandidate(candidate) => {
                SimulationError::UnknownCandidate(candidate.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(err: serde_json::Error) -> Self {
        SimulationError::Serialization(err.to_string())
    }
}

/// Input validation utilities
pub mod validation {
    use super::*;
    use crate::state::Candidate;

    /// Validate a transfer amount against the configured bounds
    pub fn validate_amount(amount: u64, min: u64, max: u64) -> Result<(), SimulationError> {
        if amount == 0 {
            return Err(SimulationError::InvalidRequest(
                "Amount must be greater than zero".to_string(),
            ));
        }

        if amount < min || amount > max {
            return Err(SimulationError::InvalidRequest(format!(
                "Amount {} outside allowed range {}..={}",
                amount, min, max
            )));
        }

        Ok(())
    }

    /// Validate that a principal is one of the configured participants
    pub fn validate_principal(
        principal: &Principal,
        known: &[Principal],
    ) -> Result<(), SimulationError> {
        if principal.as_str().trim().is_empty() {
            return Err(SimulationError::InvalidRequest(
                "Principal name cannot be empty".to_string(),
            ));
        }
        if !known.contains(principal) {
            return Err(SimulationError::InvalidRequest(format!(
                "Unknown principal: {}",
                principal
            )));
        }
        Ok(())
    }

    /// Validate a candidate selection: present and configured
    pub fn validate_candidate(
        candidate: &Candidate,
        known: &[Candidate],
    ) -> Result<(), SimulationError> {
        if candidate.as_str().trim().is_empty() {
            return Err(SimulationError::InvalidRequest(
                "Please select a candidate".to_string(),
            ));
        }
        if !known.contains(candidate) {
            return Err(SimulationError::UnknownCandidate(candidate.to_string()));
        }
        Ok(())
    }
}
