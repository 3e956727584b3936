//! Read-only views of engine state for presentation layers
//!
//! Identifiers are rendered as hex strings so the snapshot can go straight
//! to JSON.

use serde::Serialize;

use crate::crypto::Derivation;
use crate::engine::{Engine, LogEntry, Phase, Session};
use crate::error::SimulationResult;
use crate::ledger::Note;
use crate::state::{NullifierRecord, SettlementRecord};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NoteView {
    pub id: u64,
    pub value: u64,
    pub commitment: String,
    pub nullifier: Option<String>,
    pub spent: bool,
    pub leaf_index: Option<u64>,
}

impl From<&Note> for NoteView {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.0,
            value: note.value,
            commitment: note.commitment.to_hex(),
            nullifier: note.nullifier.map(|n| n.to_hex()),
            spent: note.spent,
            leaf_index: note.leaf_index,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrincipalView {
    pub name: String,
    pub balance: u64,
    pub notes: Vec<NoteView>,
    pub has_voted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NullifierView {
    pub value: String,
    pub note_commitment: Option<String>,
    pub voter: Option<String>,
}

impl From<&NullifierRecord> for NullifierView {
    fn from(record: &NullifierRecord) -> Self {
        Self {
            value: record.value.to_hex(),
            note_commitment: record.note_commitment.map(|c| c.to_hex()),
            voter: record.voter.as_ref().map(|v| v.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettlementView {
    pub batch: u64,
    pub note_hash_root: String,
    pub nullifier_root: String,
    pub state_root: String,
    pub commitments: u64,
    pub nullifiers: u64,
}

impl From<&SettlementRecord> for SettlementView {
    fn from(record: &SettlementRecord) -> Self {
        Self {
            batch: record.batch,
            note_hash_root: hex::encode(record.note_hash_root),
            nullifier_root: hex::encode(record.nullifier_root),
            state_root: record.state_root_hex(),
            commitments: record.commitments,
            nullifiers: record.nullifiers,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub id: u64,
    pub request: String,
    pub phase: Phase,
    /// Output commitments staged by the private phase
    pub staged_commitments: Vec<String>,
    pub staged_nullifiers: Vec<String>,
    pub proof_size_bytes: Option<usize>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            request: session.request.to_string(),
            phase: session.phase,
            staged_commitments: session
                .staged
                .commitments()
                .iter()
                .map(|c| c.to_hex())
                .collect(),
            staged_nullifiers: session
                .staged
                .nullifier_values()
                .iter()
                .map(|n| n.to_hex())
                .collect(),
            proof_size_bytes: session.proof.as_ref().map(|p| p.size_bytes),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TallyEntry {
    pub candidate: String,
    pub votes: u64,
}

/// Everything a visualizer needs to draw one frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub phase: Phase,
    pub step: usize,
    pub session: Option<SessionView>,
    pub principals: Vec<PrincipalView>,
    pub note_hash_tree: Vec<String>,
    pub note_hash_root: String,
    pub nullifier_tree: Vec<NullifierView>,
    pub nullifier_root: String,
    pub tally: Vec<TallyEntry>,
    pub vote_ended: bool,
    pub settlements: Vec<SettlementView>,
    pub log: Vec<LogEntry>,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> SimulationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> SimulationResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn principal(&self, name: &str) -> Option<&PrincipalView> {
        self.principals.iter().find(|p| p.name == name)
    }
}

impl<D: Derivation> Engine<D> {
    pub fn snapshot(&self) -> EngineSnapshot {
        let ledger = self.ledger();

        // Configured order, not map order
        let principals = self
            .config()
            .principals
            .iter()
            .filter_map(|name| {
                let notes = ledger.notes_of(name).ok()?;
                Some(PrincipalView {
                    name: name.to_string(),
                    balance: ledger.balance_of(name).unwrap_or(0),
                    notes: notes.iter().map(NoteView::from).collect(),
                    has_voted: ledger
                        .voter_record(name)
                        .map(|r| r.has_voted)
                        .unwrap_or(false),
                })
            })
            .collect();

        EngineSnapshot {
            phase: self.current_phase(),
            step: self.current_step(),
            session: self.session().map(SessionView::from),
            principals,
            note_hash_tree: self.commitment_tree().iter().map(|c| c.to_hex()).collect(),
            note_hash_root: hex::encode(self.commitment_tree().root()),
            nullifier_tree: self
                .nullifier_tree()
                .iter()
                .map(NullifierView::from)
                .collect(),
            nullifier_root: hex::encode(self.nullifier_tree().root()),
            tally: self
                .tally()
                .iter()
                .map(|(candidate, votes)| TallyEntry {
                    candidate: candidate.to_string(),
                    votes,
                })
                .collect(),
            vote_ended: self.vote_ended(),
            settlements: self.settlements().iter().map(SettlementView::from).collect(),
            log: self.log().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::engine::OperationRequest;

    #[test]
    fn test_snapshot_at_genesis() {
        let engine = Engine::new(SimulationConfig::default().with_seed(5)).unwrap();
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.step, 0);
        assert!(snapshot.session.is_none());
        assert_eq!(snapshot.note_hash_tree.len(), 3);
        assert!(snapshot.nullifier_tree.is_empty());

        let names: Vec<&str> = snapshot.principals.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
        assert_eq!(snapshot.principal("Bob").unwrap().balance, 300);
    }

    #[test]
    fn test_snapshot_tracks_session() {
        let mut engine = Engine::new(SimulationConfig::default().with_seed(5)).unwrap();
        engine
            .start_operation(OperationRequest::transfer("Alice", "Bob", 40))
            .unwrap();
        engine.advance_private_execution().unwrap();

        let snapshot = engine.snapshot();
        let session = snapshot.session.as_ref().unwrap();
        assert_eq!(snapshot.phase, Phase::ProofSubmission);
        assert_eq!(snapshot.step, 2);
        assert_eq!(session.staged_commitments.len(), 2);
        assert_eq!(session.staged_nullifiers.len(), 1);
        assert!(session.proof_size_bytes.is_none());
        assert!(!snapshot.log.is_empty());
    }

    #[test]
    fn test_snapshot_json() {
        let mut engine = Engine::new(SimulationConfig::default().with_seed(5)).unwrap();
        engine
            .start_operation(OperationRequest::vote("Charlie", "Candidate C"))
            .unwrap();
        while !engine.current_phase().is_terminal() {
            engine.advance().unwrap();
        }

        let value: serde_json::Value =
            serde_json::from_str(&engine.snapshot().to_json().unwrap()).unwrap();
        assert_eq!(value["phase"], "Complete");
        assert_eq!(value["tally"][2]["candidate"], "Candidate C");
        assert_eq!(value["tally"][2]["votes"], 1);
        assert_eq!(value["nullifier_tree"][0]["voter"], "Charlie");
        assert_eq!(value["log"][0]["severity"], "success");
    }
}
