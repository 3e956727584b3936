//! In-flight operation state
//!
//! Everything one phase hands to a later phase lives on the session. It
//! disappears with the session, so a reset or an abort never leaves staged
//! data behind.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::phase::{Phase, Variant};
use crate::crypto::{Commitment, Nullifier};
use crate::ledger::{NoteId, Principal};
use crate::state::{Candidate, NullifierRecord};

/// Size reported for the simulated proof (the demo shows "~2KB")
pub const SIMULATED_PROOF_SIZE: usize = 2048;

/// What the user asked for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationRequest {
    Transfer {
        from: Principal,
        to: Principal,
        amount: u64,
    },
    /// Transfer that continues through L1 settlement
    Lifecycle {
        from: Principal,
        to: Principal,
        amount: u64,
    },
    Vote {
        voter: Principal,
        candidate: Candidate,
    },
}

impl OperationRequest {
    pub fn transfer(from: impl Into<Principal>, to: impl Into<Principal>, amount: u64) -> Self {
        OperationRequest::Transfer {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    pub fn lifecycle(from: impl Into<Principal>, to: impl Into<Principal>, amount: u64) -> Self {
        OperationRequest::Lifecycle {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    pub fn vote(voter: impl Into<Principal>, candidate: impl Into<Candidate>) -> Self {
        OperationRequest::Vote {
            voter: voter.into(),
            candidate: candidate.into(),
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            OperationRequest::Transfer { .. } => Variant::Transfer,
            OperationRequest::Lifecycle { .. } => Variant::Lifecycle,
            OperationRequest::Vote { .. } => Variant::Vote,
        }
    }

    /// Principal whose device runs the private phase
    pub fn initiator(&self) -> &Principal {
        match self {
            OperationRequest::Transfer { from, .. } | OperationRequest::Lifecycle { from, .. } => {
                from
            }
            OperationRequest::Vote { voter, .. } => voter,
        }
    }
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationRequest::Transfer { from, to, amount }
            | OperationRequest::Lifecycle { from, to, amount } => {
                write!(f, "{} → {} ({} tokens)", from, to, amount)
            }
            OperationRequest::Vote { voter, candidate } => {
                write!(f, "{} votes for {}", voter, candidate)
            }
        }
    }
}

/// A note created by the private phase, not yet visible to its owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingNote {
    pub owner: Principal,
    pub value: u64,
    pub commitment: Commitment,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedVote {
    pub nullifier: Nullifier,
    pub candidate: Candidate,
}

/// Outputs staged for the state-changing phases
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedOutputs {
    /// Notes to be marked spent
    pub consumed: Vec<NoteId>,
    pub consumed_total: u64,
    /// One record per consumed note, same order
    pub nullifiers: Vec<NullifierRecord>,
    /// Recipient note first, then the change note if any
    pub outputs: Vec<PendingNote>,
    pub change: Option<u64>,
    pub vote: Option<StagedVote>,
}

impl StagedOutputs {
    /// Every nullifier this session would publish
    pub fn nullifier_values(&self) -> Vec<Nullifier> {
        let mut values: Vec<Nullifier> = self.nullifiers.iter().map(|r| r.value).collect();
        if let Some(vote) = &self.vote {
            values.push(vote.nullifier);
        }
        values
    }

    pub fn commitments(&self) -> Vec<Commitment> {
        self.outputs.iter().map(|n| n.commitment).collect()
    }
}

/// What the sequencer receives instead of the private inputs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofBundle {
    pub commitments: Vec<Commitment>,
    pub nullifiers: Vec<Nullifier>,
    /// Arguments of the enqueued public call, if any
    pub public_inputs: Vec<String>,
    pub size_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub id: u64,
    pub request: OperationRequest,
    pub phase: Phase,
    pub staged: StagedOutputs,
    pub proof: Option<ProofBundle>,
}

impl Session {
    pub(crate) fn new(id: u64, request: OperationRequest) -> Self {
        Self {
            id,
            request,
            phase: Phase::PrivateExecution,
            staged: StagedOutputs::default(),
            proof: None,
        }
    }

    pub fn variant(&self) -> Variant {
        self.request.variant()
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}
