//! Job phase/progress tracker
//!
//! One writer (the pipeline and its fetch workers) and any number of readers
//! (progress pollers). Every access is a short critical section that copies
//! the state in or out.

use serde::{Deserialize, Serialize};
use shelf_common::events::{EventBus, JobEvent, JobPhase};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Point-in-time view of a job's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub phase: JobPhase,
    pub current: usize,
    pub total: usize,
}

/// Rejected phase transition
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid phase transition {from} -> {to}")]
pub struct PhaseError {
    pub from: JobPhase,
    pub to: JobPhase,
}

/// Phase/progress state for one job
pub struct JobTracker {
    job_id: Uuid,
    state: RwLock<ProgressSnapshot>,
    event_bus: EventBus,
}

impl JobTracker {
    /// New tracker in the `idle` phase
    pub fn new(job_id: Uuid, event_bus: EventBus) -> Self {
        Self {
            job_id,
            state: RwLock::new(ProgressSnapshot::default()),
            event_bus,
        }
    }

    /// Copy out the current state
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter `parsing`, discarding any previous state
    pub fn start(&self) {
        let old_phase = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let old = state.phase;
            *state = ProgressSnapshot {
                phase: JobPhase::Parsing,
                current: 0,
                total: 0,
            };
            old
        };
        self.emit_phase(old_phase, JobPhase::Parsing);
    }

    /// Enter `fetching` with `total` lookups pending
    pub fn begin_fetch(&self, total: usize) -> Result<(), PhaseError> {
        self.transition(JobPhase::Fetching, |state| {
            state.current = 0;
            state.total = total;
        })
    }

    /// Record one completed lookup
    ///
    /// Saturates at `total`; ignored outside `fetching`.
    pub fn advance(&self) -> ProgressSnapshot {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.phase == JobPhase::Fetching && state.current < state.total {
                state.current += 1;
            }
            *state
        };
        self.event_bus.emit_lossy(JobEvent::ProgressUpdate {
            job_id: self.job_id,
            current: snapshot.current,
            total: snapshot.total,
        });
        snapshot
    }

    /// Enter `building`
    pub fn begin_build(&self) -> Result<(), PhaseError> {
        self.transition(JobPhase::Building, |_| {})
    }

    /// Enter `done`
    pub fn finish(&self) -> Result<(), PhaseError> {
        self.transition(JobPhase::Done, |_| {})
    }

    fn transition(
        &self,
        to: JobPhase,
        update: impl FnOnce(&mut ProgressSnapshot),
    ) -> Result<(), PhaseError> {
        let from = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let from = state.phase;
            if to.predecessor() != Some(from) {
                return Err(PhaseError { from, to });
            }
            state.phase = to;
            update(&mut *state);
            from
        };
        self.emit_phase(from, to);
        Ok(())
    }

    fn emit_phase(&self, old_phase: JobPhase, new_phase: JobPhase) {
        tracing::info!(
            job_id = %self.job_id,
            from = %old_phase,
            to = %new_phase,
            "Job phase changed"
        );
        self.event_bus.emit_lossy(JobEvent::PhaseChanged {
            job_id: self.job_id,
            old_phase,
            new_phase,
            timestamp: chrono::Utc::now(),
        });
    }
}
