//! Ingestion job ownership
//!
//! A [`Job`] owns everything one upload produces: its progress tracker, its
//! cover log, its cancellation token and, once built, its stats and graph.
//! The [`JobSlot`] in application state holds the single active job;
//! installing a new job supersedes the previous one, whose results become
//! unreachable and whose in-flight work is cancelled.

pub mod covers;
pub mod tracker;

pub use covers::{CoverLog, CoverPage, CoverUpdate};
pub use tracker::{JobTracker, PhaseError, ProgressSnapshot};

use crate::graph::ReadingGraph;
use crate::models::BookRecord;
use crate::stats::StatsSnapshot;
use chrono::{DateTime, Utc};
use shelf_common::events::{EventBus, JobEvent};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything a finished job exposes to queries
#[derive(Debug)]
pub struct JobOutput {
    pub stats: StatsSnapshot,
    pub graph: ReadingGraph,
    /// Enriched books in export order
    pub books: Vec<BookRecord>,
}

impl JobOutput {
    /// The book whose node key is `node_key`
    pub fn book(&self, node_key: &str) -> Option<&BookRecord> {
        self.books.iter().find(|b| b.node_key() == node_key)
    }
}

/// One ingestion job
pub struct Job {
    id: Uuid,
    started_at: DateTime<Utc>,
    tracker: JobTracker,
    covers: CoverLog,
    cancel: CancellationToken,
    output: OnceLock<Arc<JobOutput>>,
    event_bus: EventBus,
}

impl Job {
    /// Create a job already in the `parsing` phase
    pub fn new(event_bus: EventBus) -> Self {
        let id = Uuid::new_v4();
        let job = Self {
            id,
            started_at: Utc::now(),
            tracker: JobTracker::new(id, event_bus.clone()),
            covers: CoverLog::new(),
            cancel: CancellationToken::new(),
            output: OnceLock::new(),
            event_bus,
        };
        job.event_bus.emit_lossy(JobEvent::JobStarted {
            job_id: id,
            timestamp: job.started_at,
        });
        job.tracker.start();
        job
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn covers(&self) -> &CoverLog {
        &self.covers
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Append a resolved cover to this job's log and announce it
    pub fn record_cover(&self, book_id: &str, cover_url: &str) {
        if self.covers.push(book_id, cover_url) {
            self.event_bus.emit_lossy(JobEvent::CoverResolved {
                job_id: self.id,
                book_id: book_id.to_string(),
                cover_url: cover_url.to_string(),
            });
        }
    }

    /// Store the built results; the first call wins
    pub fn set_output(&self, output: JobOutput) -> Arc<JobOutput> {
        let output = Arc::new(output);
        if self.output.set(output.clone()).is_err() {
            tracing::warn!(job_id = %self.id, "Job output already set, keeping the first");
        }
        output
    }

    pub fn output(&self) -> Option<Arc<JobOutput>> {
        self.output.get().cloned()
    }

    /// Cancel this job's remaining work in favour of `successor`
    fn supersede(&self, successor: Uuid) {
        self.cancel.cancel();
        tracing::info!(job_id = %self.id, superseded_by = %successor, "Job superseded");
        self.event_bus.emit_lossy(JobEvent::JobSuperseded {
            job_id: self.id,
            superseded_by: successor,
            timestamp: Utc::now(),
        });
    }
}

/// Holder of the single active job
#[derive(Clone, Default)]
pub struct JobSlot {
    current: Arc<RwLock<Option<Arc<Job>>>>,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `job` the active job, superseding the previous one
    pub fn install(&self, job: Arc<Job>) -> Option<Arc<Job>> {
        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.replace(job.clone())
        };
        if let Some(previous) = &previous {
            previous.supersede(job.id());
        }
        previous
    }

    /// Undo the install of `failed` after its pipeline failed
    ///
    /// A finished `previous` job becomes active again; otherwise the slot is
    /// emptied. Does nothing if `failed` is no longer the active job.
    pub fn rollback(&self, failed: Uuid, previous: Option<Arc<Job>>) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !current.as_ref().is_some_and(|job| job.id() == failed) {
            return false;
        }
        *current = previous.filter(|job| job.output().is_some());
        true
    }

    /// The active job, if any upload has been accepted
    pub fn current(&self) -> Option<Arc<Job>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether `job_id` is still the active job
    pub fn is_current(&self, job_id: Uuid) -> bool {
        self.current().is_some_and(|job| job.id() == job_id)
    }

    /// Progress of the active job, or idle when there is none
    pub fn progress(&self) -> ProgressSnapshot {
        self.current()
            .map(|job| job.tracker().snapshot())
            .unwrap_or_default()
    }

    /// Output of the active job, once it has been built
    pub fn output(&self) -> Option<Arc<JobOutput>> {
        self.current().and_then(|job| job.output())
    }
}
