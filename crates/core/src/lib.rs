//! LedgerLens - Private Ledger Simulation Core
//!
//! Step-by-step state machine for privacy-preserving transactions: private
//! notes, nullifiers, the public note-hash and nullifier trees, a voting
//! tally and simulated L1 settlement.
//!
//! # Modules
//! - `engine`: Phase state machine, sessions and the execution log
//! - `ledger`: Per-principal private notes and voter records
//! - `state`: Public state (note-hash tree, nullifier tree, tally, settlement)
//! - `crypto`: Commitment and nullifier derivation
//! - `config`: Engine configuration and demo presets
//! - `pacing`: Step-by-step playback with optional delays
//! - `snapshot`: Serializable views for presentation layers
//!
//! # Example
//! ```
//! use ledgerlens_core::{Engine, OperationRequest, Phase, SimulationConfig};
//!
//! let mut engine = Engine::new(SimulationConfig::default()).unwrap();
//! engine.start_operation(OperationRequest::transfer("Alice", "Bob", 30)).unwrap();
//! engine.advance_private_execution().unwrap();
//! engine.advance_proof_submission().unwrap();
//! assert_eq!(engine.advance_state_update().unwrap(), Phase::Complete);
//! assert_eq!(engine.balance_of(&"Bob".into()).unwrap(), 330);
//! ```

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod pacing;
pub mod snapshot;
pub mod state;

#[cfg(feature = "python")]
mod python;

// Re-export common types
pub use config::SimulationConfig;
pub use crypto::{Blake3Derivation, Commitment, Derivation, Nullifier, NullifierKey};
pub use engine::{Engine, LogEntry, OperationRequest, Phase, Severity, Variant};
pub use error::{SimulationError, SimulationResult};
pub use ledger::{Note, NoteId, Principal};
pub use pacing::{Pacing, StepObserver, StepReport, Walkthrough};
pub use snapshot::EngineSnapshot;
pub use state::{Candidate, CommitmentTree, NullifierTree, Tally};
