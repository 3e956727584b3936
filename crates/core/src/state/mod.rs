//! Public state: note-hash tree, nullifier tree, voting tally, settlements

pub mod commitment_tree;
pub mod nullifier_tree;
pub mod settlement;
pub mod tally;

pub use commitment_tree::CommitmentTree;
pub use nullifier_tree::{NullifierRecord, NullifierTree};
pub use settlement::{SettlementLog, SettlementRecord};
pub use tally::{Candidate, Tally, TallyError, VotingState};
