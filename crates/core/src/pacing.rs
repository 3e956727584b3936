//! Step-by-step playback
//!
//! The engine never waits on its own; a presentation layer that wants the
//! phases to be visible drives it through a `Walkthrough`. Delays have no
//! effect on results.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::Derivation;
use crate::engine::{Engine, LogEntry, OperationRequest, Phase};
use crate::error::SimulationResult;

/// Delay inserted after every completed step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    pub step_delay: Duration,
}

impl Pacing {
    /// No delay; what tests and batch runs want
    pub fn immediate() -> Self {
        Self::default()
    }

    /// The 500 ms rhythm of the interactive demos
    pub fn demo() -> Self {
        Self::from_millis(500)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self {
            step_delay: Duration::from_millis(ms),
        }
    }

    fn wait(&self) {
        if !self.step_delay.is_zero() {
            thread::sleep(self.step_delay);
        }
    }
}

/// One completed step as seen by an observer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub completed: Phase,
    pub next: Phase,
    /// Progress-bar position of `next`
    pub step: usize,
    /// Log entries written by this step
    pub entries: Vec<LogEntry>,
}

pub trait StepObserver {
    fn on_step(&mut self, report: &StepReport);
}

/// Observer that ignores every step
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl StepObserver for Silent {
    fn on_step(&mut self, _report: &StepReport) {}
}

impl<F: FnMut(&StepReport)> StepObserver for F {
    fn on_step(&mut self, report: &StepReport) {
        self(report)
    }
}

/// Runs one operation from start to its terminal phase
pub struct Walkthrough<'a, D: Derivation> {
    engine: &'a mut Engine<D>,
    pacing: Pacing,
}

impl<'a, D: Derivation> Walkthrough<'a, D> {
    pub fn new(engine: &'a mut Engine<D>, pacing: Pacing) -> Self {
        Self { engine, pacing }
    }

    /// Start `request` and advance until the session finishes
    ///
    /// Stops at the first failing step; the engine has already aborted the
    /// session by then and its log holds the reason.
    pub fn run<O: StepObserver>(
        &mut self,
        request: OperationRequest,
        observer: &mut O,
    ) -> SimulationResult<Phase> {
        let mut phase = self.engine.start_operation(request)?;
        let mut seen = 0;

        while !phase.is_terminal() {
            self.pacing.wait();

            let completed = phase;
            phase = self.engine.advance()?;

            let log = self.engine.log();
            let report = StepReport {
                completed,
                next: phase,
                step: self.engine.current_step(),
                entries: log.get(seen..).unwrap_or(&[]).to_vec(),
            };
            seen = log.len();

            debug!(completed = %completed, next = %phase, "walkthrough step");
            observer.on_step(&report);
        }

        Ok(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::error::SimulationError;

    #[test]
    fn test_default_is_immediate() {
        assert_eq!(Pacing::default(), Pacing::immediate());
        assert!(Pacing::immediate().step_delay.is_zero());
        assert_eq!(Pacing::demo().step_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_transfer_walkthrough() {
        let mut engine = Engine::new(SimulationConfig::default().with_seed(3)).unwrap();
        let mut reports = Vec::new();

        let end = Walkthrough::new(&mut engine, Pacing::immediate())
            .run(
                OperationRequest::transfer("Bob", "Charlie", 50),
                &mut |r: &StepReport| reports.push(r.clone()),
            )
            .unwrap();

        assert_eq!(end, Phase::Complete);
        let completed: Vec<Phase> = reports.iter().map(|r| r.completed).collect();
        assert_eq!(
            completed,
            vec![
                Phase::PrivateExecution,
                Phase::ProofSubmission,
                Phase::StateUpdate
            ]
        );
        assert!(reports.iter().all(|r| !r.entries.is_empty()));
        assert_eq!(reports.last().unwrap().step, 4);
        assert_eq!(engine.balance_of(&"Charlie".into()).unwrap(), 250);
    }

    #[test]
    fn test_lifecycle_walkthrough() {
        let mut engine = Engine::new(SimulationConfig::lifecycle_demo().with_seed(3)).unwrap();

        let end = Walkthrough::new(&mut engine, Pacing::immediate())
            .run(OperationRequest::lifecycle("Alice", "Bob", 30), &mut Silent)
            .unwrap();

        assert_eq!(end, Phase::Finalized);
        assert_eq!(engine.settlements().len(), 1);
    }

    #[test]
    fn test_walkthrough_stops_on_failure() {
        let mut engine = Engine::new(SimulationConfig::default().with_seed(3)).unwrap();
        engine.end_vote(&"Admin".into()).unwrap();

        let mut steps = 0;
        let err = Walkthrough::new(&mut engine, Pacing::immediate())
            .run(
                OperationRequest::vote("Alice", "Candidate B"),
                &mut |_: &StepReport| steps += 1,
            )
            .unwrap_err();

        assert_eq!(err, SimulationError::VoteEnded);
        assert_eq!(steps, 2);
        assert_eq!(engine.current_phase(), Phase::Idle);
    }
}
