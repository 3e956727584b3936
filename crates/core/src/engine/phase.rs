//! Phases and the per-variant transition table
//!
//! Transfer:  Idle → PrivateExecution → ProofSubmission → StateUpdate → Complete
//! Lifecycle: Idle → PrivateExecution → ProofSubmission → StateUpdate → Settlement → Finalized
//! Vote:      Idle → PrivateExecution → ProofSubmission → PublicExecution → Complete
//!
//! A session's phase names the step that is waiting for its `advance_*`
//! command. Transitions are linear and forward-only.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    PrivateExecution,
    ProofSubmission,
    PublicExecution,
    StateUpdate,
    Settlement,
    Finalized,
    Complete,
}

impl Phase {
    /// `Complete` and `Finalized` end a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Finalized)
    }

    /// Private phases run on the user's device; the rest are public
    pub fn is_private(&self) -> bool {
        matches!(self, Phase::PrivateExecution | Phase::ProofSubmission)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::PrivateExecution => "Private Execution",
            Phase::ProofSubmission => "Submit Proof",
            Phase::PublicExecution => "Public Execution",
            Phase::StateUpdate => "Update Trees",
            Phase::Settlement => "L1 Settlement",
            Phase::Finalized => "Finalized",
            Phase::Complete => "Complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which lifecycle an operation follows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Private token transfer
    Transfer,
    /// Transfer followed by L1 settlement
    Lifecycle,
    /// Private vote with a public tally update
    Vote,
}

const TRANSFER_PHASES: &[Phase] = &[
    Phase::Idle,
    Phase::PrivateExecution,
    Phase::ProofSubmission,
    Phase::StateUpdate,
    Phase::Complete,
];

const LIFECYCLE_PHASES: &[Phase] = &[
    Phase::Idle,
    Phase::PrivateExecution,
    Phase::ProofSubmission,
    Phase::StateUpdate,
    Phase::Settlement,
    Phase::Finalized,
];

const VOTE_PHASES: &[Phase] = &[
    Phase::Idle,
    Phase::PrivateExecution,
    Phase::ProofSubmission,
    Phase::PublicExecution,
    Phase::Complete,
];

impl Variant {
    /// Full ordered phase sequence, starting at `Idle`
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Variant::Transfer => TRANSFER_PHASES,
            Variant::Lifecycle => LIFECYCLE_PHASES,
            Variant::Vote => VOTE_PHASES,
        }
    }

    /// Phase that follows `from`, or `None` if `from` is terminal or not
    /// part of this variant
    pub fn next(&self, from: Phase) -> Option<Phase> {
        let phases = self.phases();
        let pos = phases.iter().position(|p| *p == from)?;
        phases.get(pos + 1).copied()
    }

    /// Step number shown in the progress bar (`Idle` = 0)
    pub fn step_of(&self, phase: Phase) -> Option<usize> {
        self.phases().iter().position(|p| *p == phase)
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.phases().contains(&phase)
    }

    pub fn terminal(&self) -> Phase {
        match self {
            Variant::Lifecycle => Phase::Finalized,
            Variant::Transfer | Variant::Vote => Phase::Complete,
        }
    }
}
