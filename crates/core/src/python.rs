//! Python bindings
//!
//! Build with `--features python`. Errors surface as `ValueError` for
//! rejected commands and `RuntimeError` for invariant violations.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::SimulationConfig;
use crate::engine::{Engine, OperationRequest, Phase};
use crate::error::SimulationError;
use crate::ledger::Principal;

fn to_py_err(err: SimulationError) -> PyErr {
    if err.is_recoverable() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

fn phase_name(phase: Phase) -> String {
    format!("{:?}", phase)
}

/// Interactive ledger engine
#[pyclass]
struct LedgerEngine {
    inner: Engine,
}

#[pymethods]
impl LedgerEngine {
    /// Create an engine; `config_json` overrides the token-demo defaults
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => SimulationConfig::from_json(json).map_err(to_py_err)?,
            None => SimulationConfig::default(),
        };
        let inner = Engine::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn start_transfer(&mut self, sender: &str, recipient: &str, amount: u64) -> PyResult<String> {
        self.start(OperationRequest::transfer(sender, recipient, amount))
    }

    fn start_lifecycle(&mut self, sender: &str, recipient: &str, amount: u64) -> PyResult<String> {
        self.start(OperationRequest::lifecycle(sender, recipient, amount))
    }

    fn start_vote(&mut self, voter: &str, candidate: &str) -> PyResult<String> {
        self.start(OperationRequest::vote(voter, candidate))
    }

    fn advance_private_execution(&mut self) -> PyResult<String> {
        self.inner
            .advance_private_execution()
            .map(phase_name)
            .map_err(to_py_err)
    }

    fn advance_proof_submission(&mut self) -> PyResult<String> {
        self.inner
            .advance_proof_submission()
            .map(phase_name)
            .map_err(to_py_err)
    }

    fn advance_public_execution(&mut self) -> PyResult<String> {
        self.inner
            .advance_public_execution()
            .map(phase_name)
            .map_err(to_py_err)
    }

    fn advance_state_update(&mut self) -> PyResult<String> {
        self.inner
            .advance_state_update()
            .map(phase_name)
            .map_err(to_py_err)
    }

    fn advance_settlement(&mut self) -> PyResult<String> {
        self.inner
            .advance_settlement()
            .map(phase_name)
            .map_err(to_py_err)
    }

    /// Run whichever step is pending
    fn advance(&mut self) -> PyResult<String> {
        self.inner.advance().map(phase_name).map_err(to_py_err)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn restore_genesis(&mut self) -> PyResult<()> {
        self.inner.restore_genesis().map_err(to_py_err)
    }

    fn end_vote(&mut self, caller: &str) -> PyResult<()> {
        self.inner
            .end_vote(&Principal::from(caller))
            .map_err(to_py_err)
    }

    fn current_phase(&self) -> String {
        phase_name(self.inner.current_phase())
    }

    fn balance_of(&self, owner: &str) -> PyResult<u64> {
        self.inner
            .balance_of(&Principal::from(owner))
            .map_err(to_py_err)
    }

    /// Full engine state as a JSON string
    fn snapshot_json(&self) -> PyResult<String> {
        self.inner.snapshot().to_json().map_err(to_py_err)
    }
}

impl LedgerEngine {
    fn start(&mut self, request: OperationRequest) -> PyResult<String> {
        self.inner
            .start_operation(request)
            .map(phase_name)
            .map_err(to_py_err)
    }
}

/// Python module definition
#[pymodule]
fn _ledgerlens_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<LedgerEngine>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
