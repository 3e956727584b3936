//! Ledger Simulation Engine
//!
//! Owns every piece of simulated state and moves one session at a time
//! through its variant's phases. Callers issue commands (`start_operation`,
//! `advance_*`, `reset`) and read state through queries. Nothing outside the
//! engine can mutate it.
//!
//! Failure model:
//! - a recoverable error inside a phase aborts the session, and every check
//!   runs before the first mutation, so engine state is left unchanged
//! - `InvariantViolation` halts the session without attempting further
//!   mutation
//! - out-of-order commands (`PhaseMismatch`, `NoActiveOperation`,
//!   `OperationInProgress`) are rejected and the session stays as it was

pub mod log;
pub mod phase;
pub mod session;

pub use log::{ExecutionLog, LogEntry, Severity};
pub use phase::{Phase, Variant};
pub use session::{
    OperationRequest, PendingNote, ProofBundle, Session, StagedOutputs, StagedVote,
    SIMULATED_PROOF_SIZE,
};

use tracing::{debug, error, info, warn};

use crate::config::SimulationConfig;
use crate::crypto::{Blake3Derivation, Derivation, Nullifier};
use crate::error::{validation, SimulationError, SimulationResult};
use crate::ledger::{
    change_value, LedgerError, Note, PrivateLedger, Principal, VoterRecord, MAX_NOTE_VALUE,
};
use crate::state::{
    Candidate, CommitmentTree, NullifierRecord, NullifierTree, SettlementLog, SettlementRecord,
    Tally, TallyError, VotingState,
};

/// Map a failure in the mutation half of a step to an invariant violation.
/// By then every precondition has been checked, so any error is a defect.
fn committed<T>(result: Result<T, LedgerError>, what: &str) -> SimulationResult<T> {
    result.map_err(|e| SimulationError::InvariantViolation(format!("{}: {}", what, e)))
}

/// A nullifier-tree insert refused during commit. Before any mutation this
/// is an ordinary duplicate; after one it means the commit is half applied.
fn collision(nullifier: Nullifier, nothing_applied: bool) -> SimulationError {
    if nothing_applied {
        SimulationError::DuplicateNullifier(nullifier.to_hex())
    } else {
        SimulationError::InvariantViolation(format!(
            "nullifier {} appeared during commit",
            nullifier
        ))
    }
}

pub struct Engine<D: Derivation = Blake3Derivation> {
    config: SimulationConfig,
    derivation: D,
    ledger: PrivateLedger,
    note_hashes: CommitmentTree,
    nullifiers: NullifierTree,
    voting: VotingState,
    settlements: SettlementLog,
    session: Option<Session>,
    log: ExecutionLog,
    next_session_id: u64,
}

impl Engine<Blake3Derivation> {
    /// Build an engine with the default derivation policy
    ///
    /// Identifiers are reproducible when `config.seed` is set.
    pub fn new(config: SimulationConfig) -> SimulationResult<Self> {
        let derivation = Blake3Derivation::from_seed(config.seed);
        Self::with_derivation(config, derivation)
    }
}

impl<D: Derivation> Engine<D> {
    pub fn with_derivation(config: SimulationConfig, derivation: D) -> SimulationResult<Self> {
        config.validate()?;

        let voting = VotingState::new(
            config.admin.clone(),
            config.active_at_block,
            config.candidates.clone(),
        );

        let mut engine = Self {
            config,
            derivation,
            ledger: PrivateLedger::new(),
            note_hashes: CommitmentTree::new(),
            nullifiers: NullifierTree::new(),
            voting,
            settlements: SettlementLog::new(),
            session: None,
            log: ExecutionLog::new(),
            next_session_id: 0,
        };
        engine.apply_genesis()?;
        Ok(engine)
    }

    /// Open every account and mint the genesis notes into the note-hash tree
    fn apply_genesis(&mut self) -> SimulationResult<()> {
        for principal in self.config.principals.clone() {
            let key = self.derivation.nullifier_key(&principal);
            self.ledger.open_account(principal, key);
        }

        for (owner, values) in self.config.genesis_notes.clone() {
            for value in values {
                let commitment = self.derivation.note_commitment(&owner, value);
                let note = self.ledger.create_note(&owner, value, commitment)?;
                let leaf_index = self.note_hashes.append(commitment);
                self.ledger.set_leaf_index(note.id, leaf_index)?;
            }
        }

        info!(
            principals = self.config.principals.len(),
            note_hashes = self.note_hashes.len(),
            "genesis state applied"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Validate a request and open a session for it
    ///
    /// A finished session is discarded; an unfinished one makes this fail
    /// with `OperationInProgress`.
    pub fn start_operation(&mut self, request: OperationRequest) -> SimulationResult<Phase> {
        if let Some(session) = &self.session {
            if !session.is_finished() {
                warn!(session = session.id, phase = %session.phase, "operation already in progress");
                return Err(SimulationError::OperationInProgress(session.phase));
            }
        }

        if let Err(err) = self.validate_request(&request) {
            warn!(error = %err, "operation rejected");
            self.log.error(format!("Rejected: {}", err));
            return Err(err);
        }

        self.session = None;
        self.log.clear();

        let id = self.next_session_id;
        self.next_session_id += 1;

        match &request {
            OperationRequest::Transfer { from, to, amount } => {
                self.log.success(format!(
                    "{} is transferring {} tokens to {}",
                    from, amount, to
                ));
            }
            OperationRequest::Lifecycle { from, to, amount } => {
                self.log.success(format!(
                    "Starting transaction: {} → {} ({} tokens)",
                    from, to, amount
                ));
            }
            OperationRequest::Vote { voter, candidate } => {
                self.log
                    .success(format!("{} is casting a vote for {}", voter, candidate));
            }
        }

        info!(session = id, variant = ?request.variant(), request = %request, "operation started");
        self.session = Some(Session::new(id, request));
        Ok(Phase::PrivateExecution)
    }

    fn validate_request(&self, request: &OperationRequest) -> SimulationResult<()> {
        match request {
            OperationRequest::Transfer { from, to, amount }
            | OperationRequest::Lifecycle { from, to, amount } => {
                validation::validate_principal(from, &self.config.principals)?;
                validation::validate_principal(to, &self.config.principals)?;
                if from == to {
                    return Err(SimulationError::InvalidRequest(
                        "Cannot transfer to yourself".to_string(),
                    ));
                }
                validation::validate_amount(
                    *amount,
                    self.config.min_transfer,
                    self.config.max_transfer,
                )
            }
            OperationRequest::Vote { voter, candidate } => {
                validation::validate_principal(voter, &self.config.principals)?;
                validation::validate_candidate(candidate, &self.config.candidates)?;
                if self.ledger.voter_record(voter)?.has_voted {
                    return Err(SimulationError::AlreadyVoted(voter.clone()));
                }
                Ok(())
            }
        }
    }

    pub fn advance_private_execution(&mut self) -> SimulationResult<Phase> {
        self.run_step(Phase::PrivateExecution, Self::private_execution_step)
    }

    pub fn advance_proof_submission(&mut self) -> SimulationResult<Phase> {
        self.run_step(Phase::ProofSubmission, Self::proof_submission_step)
    }

    /// Voting only
    pub fn advance_public_execution(&mut self) -> SimulationResult<Phase> {
        self.run_step(Phase::PublicExecution, Self::public_execution_step)
    }

    pub fn advance_state_update(&mut self) -> SimulationResult<Phase> {
        self.run_step(Phase::StateUpdate, Self::state_update_step)
    }

    /// Full lifecycle only
    pub fn advance_settlement(&mut self) -> SimulationResult<Phase> {
        self.run_step(Phase::Settlement, Self::settlement_step)
    }

    /// Run whichever step the current session is waiting for
    pub fn advance(&mut self) -> SimulationResult<Phase> {
        let phase = self
            .session
            .as_ref()
            .map(|s| s.phase)
            .ok_or(SimulationError::NoActiveOperation)?;

        match phase {
            Phase::PrivateExecution => self.advance_private_execution(),
            Phase::ProofSubmission => self.advance_proof_submission(),
            Phase::PublicExecution => self.advance_public_execution(),
            Phase::StateUpdate => self.advance_state_update(),
            Phase::Settlement => self.advance_settlement(),
            Phase::Idle | Phase::Complete | Phase::Finalized => {
                Err(SimulationError::NoActiveOperation)
            }
        }
    }

    /// Discard the session and clear the log. Ledger and trees are kept.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session = session.id, phase = %session.phase, "session reset");
        }
        self.log.clear();
    }

    /// Rebuild all state from configuration
    pub fn restore_genesis(&mut self) -> SimulationResult<()> {
        if let Some(session) = &self.session {
            if !session.is_finished() {
                return Err(SimulationError::OperationInProgress(session.phase));
            }
        }

        self.ledger = PrivateLedger::new();
        self.note_hashes = CommitmentTree::new();
        self.nullifiers = NullifierTree::new();
        self.voting = VotingState::new(
            self.config.admin.clone(),
            self.config.active_at_block,
            self.config.candidates.clone(),
        );
        self.settlements = SettlementLog::new();
        self.session = None;
        self.log.clear();
        self.apply_genesis()
    }

    /// Close the vote; only the configured admin may do this
    pub fn end_vote(&mut self, caller: &Principal) -> SimulationResult<()> {
        if !self.voting.is_admin(caller) {
            warn!(caller = %caller, "end_vote rejected");
            return Err(SimulationError::Unauthorized(format!(
                "{} is not the vote admin",
                caller
            )));
        }

        if self.voting.end() {
            info!(admin = %caller, "vote ended");
            self.log.warning(format!("Vote ended by {}", caller));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Step machinery
    // ------------------------------------------------------------------

    fn run_step(
        &mut self,
        expected: Phase,
        step: fn(&mut Self) -> SimulationResult<()>,
    ) -> SimulationResult<Phase> {
        let session = self
            .session
            .as_ref()
            .ok_or(SimulationError::NoActiveOperation)?;
        if session.phase != expected {
            return Err(SimulationError::PhaseMismatch {
                expected,
                actual: session.phase,
            });
        }

        debug!(session = session.id, phase = %expected, "running step");
        if let Err(err) = step(self) {
            self.abort(&err);
            return Err(err);
        }

        let session = self.active_mut()?;
        let next = session.variant().next(expected).ok_or_else(|| {
            SimulationError::InvariantViolation(format!("no phase after {}", expected))
        })?;
        session.phase = next;
        let id = session.id;

        info!(session = id, from = %expected, to = %next, "phase advanced");
        Ok(next)
    }

    fn abort(&mut self, err: &SimulationError) {
        if err.keeps_session() {
            return;
        }

        let id = self.session.as_ref().map(|s| s.id);
        if err.is_recoverable() {
            warn!(session = ?id, error = %err, "operation aborted");
            self.log.error(format!("Rejected: {}", err));
        } else {
            error!(session = ?id, error = %err, "operation halted");
            self.log.error(format!("Halted: {}", err));
        }
        self.session = None;
    }

    fn active(&self) -> SimulationResult<&Session> {
        self.session.as_ref().ok_or(SimulationError::NoActiveOperation)
    }

    fn active_mut(&mut self) -> SimulationResult<&mut Session> {
        self.session.as_mut().ok_or(SimulationError::NoActiveOperation)
    }

    // ------------------------------------------------------------------
    // Phase 1: private execution
    // ------------------------------------------------------------------

    fn private_execution_step(&mut self) -> SimulationResult<()> {
        let request = self.active()?.request.clone();
        self.log
            .info("Executing in Private Execution Environment (PXE)...");

        let staged = match &request {
            OperationRequest::Transfer { from, to, amount }
            | OperationRequest::Lifecycle { from, to, amount } => {
                self.private_transfer(from, to, *amount)?
            }
            OperationRequest::Vote { voter, candidate } => self.private_vote(voter, candidate)?,
        };

        self.active_mut()?.staged = staged;
        Ok(())
    }

    fn private_transfer(
        &mut self,
        from: &Principal,
        to: &Principal,
        amount: u64,
    ) -> SimulationResult<StagedOutputs> {
        self.log
            .info(format!("Running on {}'s device (off-chain)", from));
        self.log.info(format!("Reading {}'s private notes...", from));

        let selection = self.ledger.select_spend_candidates(from, amount)?;
        self.log.success(format!(
            "Found {} note(s) with total value: {}",
            selection.consumed.len(),
            selection.total
        ));

        self.log.info("Generating nullifiers for spent notes...");
        let mut nullifiers = Vec::with_capacity(selection.consumed.len());
        for note in &selection.consumed {
            let nullifier = self.ledger.derive_nullifier(note.id, &self.derivation)?;
            nullifiers.push(NullifierRecord::for_note(nullifier, note.commitment));
        }
        self.log
            .success(format!("Generated {} nullifier(s)", nullifiers.len()));

        self.log.info(format!(
            "Creating new note for {} (value: {})...",
            to, amount
        ));
        let recipient_commitment = self.derivation.note_commitment(to, amount);
        self.log
            .success(format!("New note hash: {}", recipient_commitment.short()));

        let mut outputs = vec![PendingNote {
            owner: to.clone(),
            value: amount,
            commitment: recipient_commitment,
        }];

        let change = change_value(selection.total, amount)?;
        let change = if change > 0 {
            self.log.info(format!(
                "Creating change note for {} (value: {})...",
                from, change
            ));
            let change_commitment = self.derivation.note_commitment(from, change);
            self.log
                .success(format!("Change note hash: {}", change_commitment.short()));
            outputs.push(PendingNote {
                owner: from.clone(),
                value: change,
                commitment: change_commitment,
            });
            Some(change)
        } else {
            None
        };

        self.log.success("Private execution complete!");
        debug!(
            consumed = selection.consumed.len(),
            outputs = outputs.len(),
            "transfer outputs staged"
        );

        Ok(StagedOutputs {
            consumed: selection.consumed.iter().map(|n| n.id).collect(),
            consumed_total: selection.total,
            nullifiers,
            outputs,
            change,
            vote: None,
        })
    }

    fn private_vote(
        &mut self,
        voter: &Principal,
        candidate: &Candidate,
    ) -> SimulationResult<StagedOutputs> {
        self.log
            .info(format!("Running on {}'s device (off-chain)", voter));
        self.log
            .info(format!("Checking if {} has already voted...", voter));
        if self.ledger.voter_record(voter)?.has_voted {
            return Err(SimulationError::AlreadyVoted(voter.clone()));
        }
        self.log
            .success(format!("No previous vote found for {}", voter));

        self.log.info(format!(
            "Retrieving {}'s nullifier secret key...",
            voter
        ));
        let key = self.ledger.nullifier_key(voter)?;
        let nullifier = self
            .derivation
            .vote_nullifier(key, self.voting.active_at_block);
        self.log
            .success(format!("Generated nullifier: {}", nullifier.short()));

        self.log
            .info("Creating public function call: add_to_tally_public()");
        self.log.success(format!(
            "Private execution complete! Vote for \"{}\" prepared",
            candidate
        ));

        Ok(StagedOutputs {
            vote: Some(StagedVote {
                nullifier,
                candidate: candidate.clone(),
            }),
            ..StagedOutputs::default()
        })
    }

    // ------------------------------------------------------------------
    // Phase 2: proof submission
    // ------------------------------------------------------------------

    fn proof_submission_step(&mut self) -> SimulationResult<()> {
        let session = self.active()?;
        let staged = session.staged.clone();
        let variant = session.variant();

        self.log.info("Submitting transaction to sequencer...");
        self.log.info("Sequencer validating zero-knowledge proof...");
        self.log.success("Proof is valid!");

        if variant == Variant::Vote {
            self.log
                .info("Checking nullifier tree for double-voting...");
        } else {
            self.log
                .info("Checking nullifier tree for double-spending...");
        }
        self.check_staged(&staged)?;
        self.log
            .success("Nullifiers are unique (no double-spending detected)");

        let public_inputs = staged
            .vote
            .as_ref()
            .map(|v| vec![v.candidate.to_string()])
            .unwrap_or_default();
        let proof = ProofBundle {
            commitments: staged.commitments(),
            nullifiers: staged.nullifier_values(),
            public_inputs,
            size_bytes: SIMULATED_PROOF_SIZE,
        };
        debug!(
            commitments = proof.commitments.len(),
            nullifiers = proof.nullifiers.len(),
            "proof bundle assembled"
        );

        self.active_mut()?.proof = Some(proof);
        Ok(())
    }

    /// Preconditions shared by every state-changing phase
    ///
    /// - no staged nullifier is in the tree or repeated within the session
    /// - every consumed note still exists, is unspent, and derives the
    ///   nullifier that was staged for it
    /// - every output note value is representable
    fn check_staged(&self, staged: &StagedOutputs) -> SimulationResult<()> {
        let values = staged.nullifier_values();
        for (i, nullifier) in values.iter().enumerate() {
            if self.nullifiers.contains(nullifier) || values[..i].contains(nullifier) {
                return Err(SimulationError::DuplicateNullifier(nullifier.to_hex()));
            }
        }

        if staged.consumed.len() != staged.nullifiers.len() {
            return Err(SimulationError::InvariantViolation(format!(
                "{} consumed notes but {} nullifiers",
                staged.consumed.len(),
                staged.nullifiers.len()
            )));
        }

        for (id, record) in staged.consumed.iter().zip(&staged.nullifiers) {
            let note = self.ledger.note(*id).ok_or_else(|| {
                SimulationError::InvariantViolation(format!("staged note {} missing", id))
            })?;
            if note.is_spent() {
                return Err(SimulationError::AlreadySpent(*id));
            }
            if self.ledger.derive_nullifier(*id, &self.derivation)? != record.value {
                return Err(SimulationError::InvariantViolation(format!(
                    "nullifier derivation for note {} is not deterministic",
                    id
                )));
            }
        }

        if let Some(pending) = staged.outputs.iter().find(|n| n.value > MAX_NOTE_VALUE) {
            return Err(SimulationError::InvalidValue(pending.value));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 3a: tree update (transfers)
    // ------------------------------------------------------------------

    fn state_update_step(&mut self) -> SimulationResult<()> {
        let staged = self.active()?.staged.clone();
        self.check_staged(&staged)?;

        // check_staged is the real guard; nothing below fails on a sound engine.
        // Nullifiers go in before any note is spent, so a collision on the
        // first insert still leaves the ledger untouched.
        self.log.info("Adding nullifiers to Nullifier Tree...");
        for (i, record) in staged.nullifiers.iter().enumerate() {
            if !self.nullifiers.insert_if_absent(record.clone()) {
                return Err(collision(record.value, i == 0));
            }
        }
        for id in &staged.consumed {
            committed(self.ledger.spend(*id, &self.derivation), "spend")?;
        }
        self.log
            .success("Nullifiers added (notes are now spent)");

        self.log.info("Adding new note hashes to Note Hash Tree...");
        for pending in &staged.outputs {
            let note = committed(
                self.ledger
                    .create_note(&pending.owner, pending.value, pending.commitment),
                "create note",
            )?;
            let leaf_index = self.note_hashes.append(pending.commitment);
            committed(
                self.ledger.set_leaf_index(note.id, leaf_index),
                "set leaf index",
            )?;
        }
        self.log.success(format!(
            "Note hash tree updated ({} new note{})",
            staged.outputs.len(),
            if staged.outputs.len() == 1 { "" } else { "s" }
        ));

        if self.active()?.variant() == Variant::Transfer {
            self.log.success("Transfer complete!");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 3b: public execution (votes)
    // ------------------------------------------------------------------

    fn public_execution_step(&mut self) -> SimulationResult<()> {
        let session = self.active()?;
        let staged = session.staged.clone();
        let voter = session.request.initiator().clone();

        self.log
            .info("Executing public function: add_to_tally_public()...");
        self.log.info("Reading public state: vote_ended...");
        if self.voting.vote_ended {
            return Err(SimulationError::VoteEnded);
        }
        self.log.success("Vote is still active (vote_ended = false)");

        let vote = staged.vote.clone().ok_or_else(|| {
            SimulationError::InvariantViolation("vote session has no staged vote".to_string())
        })?;
        self.check_staged(&staged)?;

        self.log.info(format!(
            "Reading current tally for {}...",
            vote.candidate
        ));
        let current = self
            .voting
            .tally
            .count_of(&vote.candidate)
            .ok_or_else(|| TallyError::UnknownCandidate(vote.candidate.clone()))?;
        self.log.info(format!("Current tally: {}", current));

        // Commit: nullifier, tally, private record
        if !self
            .nullifiers
            .insert_if_absent(NullifierRecord::for_voter(vote.nullifier, voter.clone()))
        {
            return Err(collision(vote.nullifier, true));
        }
        self.log
            .success("Nullifier added (prevents double-voting)");

        let new_tally = self
            .voting
            .tally
            .increment(&vote.candidate)
            .map_err(|e| SimulationError::InvariantViolation(e.to_string()))?;
        committed(
            self.ledger
                .record_vote(&voter, vote.nullifier, vote.candidate.clone()),
            "record vote",
        )?;

        self.log.success(format!("New tally: {}", new_tally));
        self.log.success("Vote successfully counted!");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 4: settlement (full lifecycle)
    // ------------------------------------------------------------------

    fn settlement_step(&mut self) -> SimulationResult<()> {
        self.log.info("Creating rollup proof batch...");
        self.log
            .info("Aggregating transactions into rollup");
        self.log.info("Submitting to Ethereum L1...");
        self.log
            .info("Verifier contract validating proof");
        self.log.success("Proof verified on L1!");
        self.log.info("Recording new state root on-chain");

        let record = self.settlements.settle(&self.note_hashes, &self.nullifiers);
        let (batch, root) = (record.batch, record.state_root_hex());
        info!(batch, state_root = %root, "batch settled");

        self.log
            .success(format!("State root {} recorded (batch {})", root, batch));
        self.log
            .success("Transaction finalized and immutable!");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn current_phase(&self) -> Phase {
        self.session.as_ref().map_or(Phase::Idle, |s| s.phase)
    }

    /// Progress-bar position of the current phase (`Idle` = 0)
    pub fn current_step(&self) -> usize {
        self.session
            .as_ref()
            .and_then(|s| s.variant().step_of(s.phase))
            .unwrap_or(0)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn private_notes_of(&self, owner: &Principal) -> SimulationResult<&[Note]> {
        Ok(self.ledger.notes_of(owner)?)
    }

    pub fn balance_of(&self, owner: &Principal) -> SimulationResult<u64> {
        Ok(self.ledger.balance_of(owner)?)
    }

    pub fn voter_record(&self, voter: &Principal) -> SimulationResult<&VoterRecord> {
        Ok(self.ledger.voter_record(voter)?)
    }

    pub fn ledger(&self) -> &PrivateLedger {
        &self.ledger
    }

    pub fn commitment_tree(&self) -> &CommitmentTree {
        &self.note_hashes
    }

    pub fn nullifier_tree(&self) -> &NullifierTree {
        &self.nullifiers
    }

    pub fn tally(&self) -> &Tally {
        &self.voting.tally
    }

    pub fn voting(&self) -> &VotingState {
        &self.voting
    }

    pub fn vote_ended(&self) -> bool {
        self.voting.vote_ended
    }

    pub fn settlements(&self) -> &[SettlementRecord] {
        self.settlements.as_slice()
    }

    pub fn log(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}
