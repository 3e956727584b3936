//! End-to-end scenarios driven through the public engine API

use std::cell::Cell;

use ledgerlens_core::crypto::{Blake3Derivation, Commitment, Derivation, Nullifier, NullifierKey};
use ledgerlens_core::pacing::Silent;
use ledgerlens_core::{
    Candidate, Engine, OperationRequest, Pacing, Phase, Principal, Severity, SimulationConfig,
    SimulationError, SimulationResult, Walkthrough,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn p(name: &str) -> Principal {
    Principal::from(name)
}

fn run_to_end<D: Derivation>(
    engine: &mut Engine<D>,
    request: OperationRequest,
) -> SimulationResult<Phase> {
    Walkthrough::new(engine, Pacing::immediate()).run(request, &mut Silent)
}

/// Derivation that publishes the same nullifier for every spend and vote
struct ReplayDerivation {
    inner: Blake3Derivation,
    replayed: Nullifier,
}

impl ReplayDerivation {
    fn new() -> Self {
        Self {
            inner: Blake3Derivation::seeded(7),
            replayed: Nullifier::from_bytes([0xab; 32]),
        }
    }
}

impl Derivation for ReplayDerivation {
    fn nullifier_key(&mut self, owner: &Principal) -> NullifierKey {
        self.inner.nullifier_key(owner)
    }

    fn note_commitment(&mut self, owner: &Principal, value: u64) -> Commitment {
        self.inner.note_commitment(owner, value)
    }

    fn note_nullifier(&self, _key: &NullifierKey, _commitment: &Commitment) -> Nullifier {
        self.replayed
    }

    fn vote_nullifier(&self, _key: &NullifierKey, _election: u64) -> Nullifier {
        self.replayed
    }
}

/// Derivation whose note nullifiers change on every call
struct DriftingDerivation {
    inner: Blake3Derivation,
    calls: Cell<u8>,
}

impl DriftingDerivation {
    fn new() -> Self {
        Self {
            inner: Blake3Derivation::seeded(7),
            calls: Cell::new(0),
        }
    }
}

impl Derivation for DriftingDerivation {
    fn nullifier_key(&mut self, owner: &Principal) -> NullifierKey {
        self.inner.nullifier_key(owner)
    }

    fn note_commitment(&mut self, owner: &Principal, value: u64) -> Commitment {
        self.inner.note_commitment(owner, value)
    }

    fn note_nullifier(&self, _key: &NullifierKey, _commitment: &Commitment) -> Nullifier {
        let call = self.calls.get().wrapping_add(1);
        self.calls.set(call);
        Nullifier::from_bytes([call; 32])
    }

    fn vote_nullifier(&self, key: &NullifierKey, election: u64) -> Nullifier {
        self.inner.vote_nullifier(key, election)
    }
}

#[test]
fn test_transfer_with_change() {
    init_tracing();
    let mut engine = Engine::new(SimulationConfig::lifecycle_demo().with_seed(11)).unwrap();

    let end = run_to_end(&mut engine, OperationRequest::transfer("Alice", "Bob", 30)).unwrap();

    assert_eq!(end, Phase::Complete);
    assert_eq!(engine.balance_of(&p("Bob")).unwrap(), 30);
    assert_eq!(engine.balance_of(&p("Alice")).unwrap(), 70);
    assert_eq!(engine.commitment_tree().len(), 1 + 2);
    assert_eq!(engine.nullifier_tree().len(), 1);

    let alice = engine.private_notes_of(&p("Alice")).unwrap();
    assert_eq!(alice.len(), 2);
    assert!(alice[0].is_spent());
    assert_eq!(alice[1].value, 70);
    assert!(!alice[1].is_spent());

    // The published nullifier is the one recorded on the spent note
    assert_eq!(
        Some(engine.nullifier_tree().as_slice()[0].value),
        alice[0].nullifier
    );

    // Recipient note lands before the change note
    let bob = &engine.private_notes_of(&p("Bob")).unwrap()[0];
    assert_eq!(bob.leaf_index, Some(1));
    assert_eq!(alice[1].leaf_index, Some(2));
}

#[test]
fn test_exact_transfer_has_no_change() {
    init_tracing();
    let mut engine = Engine::new(SimulationConfig::lifecycle_demo().with_seed(11)).unwrap();

    run_to_end(&mut engine, OperationRequest::transfer("Alice", "Bob", 100)).unwrap();

    assert_eq!(engine.balance_of(&p("Alice")).unwrap(), 0);
    assert_eq!(engine.balance_of(&p("Bob")).unwrap(), 100);
    assert_eq!(engine.commitment_tree().len(), 1 + 1);
    assert_eq!(engine.nullifier_tree().len(), 1);
    assert_eq!(engine.private_notes_of(&p("Alice")).unwrap().len(), 1);
}

#[test]
fn test_insufficient_balance_leaves_state_untouched() {
    init_tracing();
    let config = SimulationConfig::lifecycle_demo()
        .with_seed(11)
        .with_genesis("Alice", vec![30]);
    let mut engine = Engine::new(config).unwrap();
    let before = engine.snapshot();

    let err = run_to_end(&mut engine, OperationRequest::transfer("Alice", "Bob", 50)).unwrap_err();

    assert_eq!(
        err,
        SimulationError::InsufficientBalance {
            owner: p("Alice"),
            available: 30,
            requested: 50,
        }
    );
    assert!(err.is_recoverable());

    let after = engine.snapshot();
    assert_eq!(after.phase, Phase::Idle);
    assert_eq!(after.principals, before.principals);
    assert_eq!(after.note_hash_root, before.note_hash_root);
    assert_eq!(after.nullifier_root, before.nullifier_root);
    assert_eq!(after.log.last().unwrap().severity, Severity::Error);
}

#[test]
fn test_second_vote_rejected_at_start() {
    init_tracing();
    let mut engine = Engine::new(SimulationConfig::default().with_seed(11)).unwrap();

    run_to_end(&mut engine, OperationRequest::vote("Alice", "Candidate A")).unwrap();
    let err = engine
        .start_operation(OperationRequest::vote("Alice", "Candidate B"))
        .unwrap_err();

    assert_eq!(err, SimulationError::AlreadyVoted(p("Alice")));
    assert_eq!(engine.tally().total(), 1);
    assert_eq!(
        engine.tally().count_of(&Candidate::from("Candidate B")),
        Some(0)
    );
    assert_eq!(engine.nullifier_tree().len(), 1);
}

#[test]
fn test_replayed_note_nullifier_rejected() {
    init_tracing();
    let config = SimulationConfig::lifecycle_demo();
    let mut engine = Engine::with_derivation(config, ReplayDerivation::new()).unwrap();

    run_to_end(&mut engine, OperationRequest::transfer("Alice", "Bob", 40)).unwrap();
    let commitments = engine.commitment_tree().len();
    let root = engine.commitment_tree().root();

    // Alice's change note derives the replayed nullifier
    engine
        .start_operation(OperationRequest::transfer("Alice", "Bob", 10))
        .unwrap();
    engine.advance_private_execution().unwrap();
    let err = engine.advance_proof_submission().unwrap_err();

    assert!(matches!(err, SimulationError::DuplicateNullifier(_)));
    assert_eq!(engine.current_phase(), Phase::Idle);
    assert_eq!(engine.commitment_tree().len(), commitments);
    assert_eq!(engine.commitment_tree().root(), root);
    assert_eq!(engine.nullifier_tree().len(), 1);
    assert_eq!(engine.balance_of(&p("Alice")).unwrap(), 60);
}

#[test]
fn test_replayed_vote_nullifier_rejected() {
    init_tracing();
    let mut engine =
        Engine::with_derivation(SimulationConfig::default(), ReplayDerivation::new()).unwrap();

    run_to_end(&mut engine, OperationRequest::vote("Alice", "Candidate A")).unwrap();
    let err = run_to_end(&mut engine, OperationRequest::vote("Bob", "Candidate A")).unwrap_err();

    assert!(matches!(err, SimulationError::DuplicateNullifier(_)));
    assert_eq!(
        engine.tally().count_of(&Candidate::from("Candidate A")),
        Some(1)
    );
    assert!(!engine.voter_record(&p("Bob")).unwrap().has_voted);
    assert_eq!(engine.commitment_tree().len(), 3);
}

#[test]
fn test_lifecycle_finalizes_with_one_settlement() {
    init_tracing();
    let mut engine = Engine::new(SimulationConfig::lifecycle_demo().with_seed(11)).unwrap();

    let end = run_to_end(&mut engine, OperationRequest::lifecycle("Alice", "Bob", 25)).unwrap();

    assert_eq!(end, Phase::Finalized);
    assert_eq!(engine.settlements().len(), 1);

    let record = &engine.settlements()[0];
    assert_eq!(record.batch, 0);
    assert_eq!(record.nullifier_root, engine.nullifier_tree().root());
    assert!(record.state_root_hex().starts_with("0x"));
    assert!(engine
        .log()
        .iter()
        .any(|e| e.message.contains("finalized")));
}

#[test]
fn test_vote_ended_mid_flight() {
    init_tracing();
    let mut engine = Engine::new(SimulationConfig::default().with_seed(11)).unwrap();

    engine
        .start_operation(OperationRequest::vote("Bob", "Candidate C"))
        .unwrap();
    engine.advance_private_execution().unwrap();
    engine.advance_proof_submission().unwrap();

    assert!(matches!(
        engine.end_vote(&p("Bob")),
        Err(SimulationError::Unauthorized(_))
    ));
    engine.end_vote(&p("Admin")).unwrap();

    let err = engine.advance_public_execution().unwrap_err();

    assert_eq!(err, SimulationError::VoteEnded);
    assert_eq!(engine.current_phase(), Phase::Idle);
    assert_eq!(engine.tally().total(), 0);
    assert!(engine.nullifier_tree().is_empty());
    assert!(!engine.voter_record(&p("Bob")).unwrap().has_voted);
}

#[test]
fn test_sequential_transfers_chain_change_notes() {
    init_tracing();
    let mut engine = Engine::new(SimulationConfig::default().with_seed(11)).unwrap();

    run_to_end(&mut engine, OperationRequest::transfer("Alice", "Bob", 100)).unwrap();
    run_to_end(&mut engine, OperationRequest::transfer("Bob", "Charlie", 350)).unwrap();
    run_to_end(&mut engine, OperationRequest::transfer("Alice", "Charlie", 400)).unwrap();

    assert_eq!(engine.balance_of(&p("Alice")).unwrap(), 0);
    assert_eq!(engine.balance_of(&p("Bob")).unwrap(), 50);
    assert_eq!(engine.balance_of(&p("Charlie")).unwrap(), 950);
    // Bob's second spend consumed his genesis note and the note from Alice
    assert_eq!(engine.nullifier_tree().len(), 1 + 2 + 1);
    assert_eq!(engine.commitment_tree().len(), 3 + 2 + 2 + 1);
}

#[test]
fn test_duplicate_nullifiers_within_one_bundle() {
    init_tracing();
    let config = SimulationConfig::lifecycle_demo().with_genesis("Alice", vec![40, 60]);
    let mut engine = Engine::with_derivation(config, ReplayDerivation::new()).unwrap();
    let root = engine.nullifier_tree().root();

    // Both genesis notes derive the same nullifier; the tree is still empty
    engine
        .start_operation(OperationRequest::transfer("Alice", "Bob", 10))
        .unwrap();
    engine.advance_private_execution().unwrap();
    assert_eq!(engine.session().unwrap().staged.nullifiers.len(), 2);

    let err = engine.advance_proof_submission().unwrap_err();

    assert!(matches!(err, SimulationError::DuplicateNullifier(_)));
    assert_eq!(engine.current_phase(), Phase::Idle);
    assert!(engine.nullifier_tree().is_empty());
    assert_eq!(engine.nullifier_tree().root(), root);
    assert_eq!(engine.commitment_tree().len(), 2);
    assert_eq!(engine.balance_of(&p("Alice")).unwrap(), 100);
}

#[test]
fn test_nondeterministic_nullifier_halts_operation() {
    init_tracing();
    let mut engine =
        Engine::with_derivation(SimulationConfig::lifecycle_demo(), DriftingDerivation::new())
            .unwrap();
    let note_root = engine.commitment_tree().root();

    engine
        .start_operation(OperationRequest::transfer("Alice", "Bob", 10))
        .unwrap();
    engine.advance_private_execution().unwrap();
    let err = engine.advance_proof_submission().unwrap_err();

    assert!(matches!(err, SimulationError::InvariantViolation(_)));
    assert!(!err.is_recoverable());
    assert_eq!(engine.current_phase(), Phase::Idle);
    assert!(engine.session().is_none());

    assert_eq!(engine.commitment_tree().len(), 1);
    assert_eq!(engine.commitment_tree().root(), note_root);
    assert!(engine.nullifier_tree().is_empty());
    assert_eq!(engine.balance_of(&p("Alice")).unwrap(), 100);

    let last = engine.log().last().unwrap();
    assert_eq!(last.severity, Severity::Error);
    assert!(last.message.starts_with("Halted"));
}
