//! Engine configuration
//!
//! Every field has a default matching the token demo, so a partial JSON
//! document is enough:
//!
//! ```json
//! { "min_transfer": 10, "genesis_notes": { "Alice": [100] } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};
use crate::ledger::{Principal, MAX_NOTE_VALUE};
use crate::state::Candidate;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Principals allowed to transact and vote
    #[serde(default = "default_principals")]
    pub principals: Vec<Principal>,

    /// Candidates on the ballot
    #[serde(default = "default_candidates")]
    pub candidates: Vec<Candidate>,

    /// Inclusive transfer bounds
    #[serde(default = "default_min_transfer")]
    pub min_transfer: u64,
    #[serde(default = "default_max_transfer")]
    pub max_transfer: u64,

    /// Only principal allowed to end the vote
    #[serde(default = "default_admin")]
    pub admin: Principal,

    /// Election identifier; feeds the vote-nullifier derivation
    #[serde(default = "default_active_at_block")]
    pub active_at_block: u64,

    /// Note values each principal starts with
    #[serde(default = "default_genesis_notes")]
    pub genesis_notes: BTreeMap<Principal, Vec<u64>>,

    /// Fixed seed for reproducible identifiers
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_principals() -> Vec<Principal> {
    vec!["Alice".into(), "Bob".into(), "Charlie".into()]
}

fn default_candidates() -> Vec<Candidate> {
    vec!["Candidate A".into(), "Candidate B".into(), "Candidate C".into()]
}

fn default_min_transfer() -> u64 {
    1
}

fn default_max_transfer() -> u64 {
    1000
}

fn default_admin() -> Principal {
    "Admin".into()
}

fn default_active_at_block() -> u64 {
    100
}

fn default_genesis_notes() -> BTreeMap<Principal, Vec<u64>> {
    let mut notes = BTreeMap::new();
    notes.insert("Alice".into(), vec![500]);
    notes.insert("Bob".into(), vec![300]);
    notes.insert("Charlie".into(), vec![200]);
    notes
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::token_demo()
    }
}

impl SimulationConfig {
    /// Three principals with 500 / 300 / 200 tokens and a three-way ballot
    pub fn token_demo() -> Self {
        Self {
            principals: default_principals(),
            candidates: default_candidates(),
            min_transfer: default_min_transfer(),
            max_transfer: default_max_transfer(),
            admin: default_admin(),
            active_at_block: default_active_at_block(),
            genesis_notes: default_genesis_notes(),
            seed: None,
        }
    }

    /// Alice holds a single note of 100, Bob holds nothing
    pub fn lifecycle_demo() -> Self {
        let mut genesis_notes = BTreeMap::new();
        genesis_notes.insert("Alice".into(), vec![100]);

        Self {
            principals: vec!["Alice".into(), "Bob".into()],
            max_transfer: 100,
            genesis_notes,
            ..Self::token_demo()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_genesis(mut self, owner: impl Into<Principal>, values: Vec<u64>) -> Self {
        self.genesis_notes.insert(owner.into(), values);
        self
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> SimulationResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SimulationError::Configuration(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> SimulationResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> SimulationResult<()> {
        if self.principals.is_empty() {
            return Err(SimulationError::Configuration(
                "at least one principal is required".to_string(),
            ));
        }

        for (i, principal) in self.principals.iter().enumerate() {
            if principal.as_str().trim().is_empty() {
                return Err(SimulationError::Configuration(
                    "principal names cannot be empty".to_string(),
                ));
            }
            if self.principals[..i].contains(principal) {
                return Err(SimulationError::Configuration(format!(
                    "duplicate principal: {}",
                    principal
                )));
            }
        }

        for (i, candidate) in self.candidates.iter().enumerate() {
            if candidate.as_str().trim().is_empty() {
                return Err(SimulationError::Configuration(
                    "candidate names cannot be empty".to_string(),
                ));
            }
            if self.candidates[..i].contains(candidate) {
                return Err(SimulationError::Configuration(format!(
                    "duplicate candidate: {}",
                    candidate
                )));
            }
        }

        if self.min_transfer == 0 {
            return Err(SimulationError::Configuration(
                "min_transfer must be at least 1".to_string(),
            ));
        }
        if self.min_transfer > self.max_transfer {
            return Err(SimulationError::Configuration(format!(
                "min_transfer {} exceeds max_transfer {}",
                self.min_transfer, self.max_transfer
            )));
        }

        for (owner, values) in &self.genesis_notes {
            if !self.principals.contains(owner) {
                return Err(SimulationError::Configuration(format!(
                    "genesis notes for unknown principal: {}",
                    owner
                )));
            }
            if let Some(value) = values.iter().find(|v| **v > MAX_NOTE_VALUE) {
                return Err(SimulationError::Configuration(format!(
                    "genesis note value {} exceeds maximum {}",
                    value, MAX_NOTE_VALUE
                )));
            }
        }

        Ok(())
    }
}
