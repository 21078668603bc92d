//! Event types for the Shelfscope event system
//!
//! Provides job event definitions and the EventBus used to broadcast them.

mod job_types;

pub use job_types::JobPhase;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Ingestion job events
///
/// Broadcast via [`EventBus`] and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// A new upload created a job
    JobStarted {
        job_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job moved to a new phase
    PhaseChanged {
        job_id: Uuid,
        old_phase: JobPhase,
        new_phase: JobPhase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Enrichment progress
    ProgressUpdate {
        job_id: Uuid,
        current: usize,
        total: usize,
    },

    /// A cover URL was resolved for a book
    CoverResolved {
        job_id: Uuid,
        book_id: String,
        cover_url: String,
    },

    /// A newer upload replaced this job
    JobSuperseded {
        job_id: Uuid,
        superseded_by: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl JobEvent {
    /// Event type name used as the SSE event field
    pub fn event_type(&self) -> &'static str {
        match self {
            JobEvent::JobStarted { .. } => "JobStarted",
            JobEvent::PhaseChanged { .. } => "PhaseChanged",
            JobEvent::ProgressUpdate { .. } => "ProgressUpdate",
            JobEvent::CoverResolved { .. } => "CoverResolved",
            JobEvent::JobSuperseded { .. } => "JobSuperseded",
        }
    }

    /// Job the event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::JobStarted { job_id, .. }
            | JobEvent::PhaseChanged { job_id, .. }
            | JobEvent::ProgressUpdate { job_id, .. }
            | JobEvent::CoverResolved { job_id, .. }
            | JobEvent::JobSuperseded { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast channel for [`JobEvent`]s
///
/// Cloning shares the underlying channel. Subscribers only receive events
/// emitted after they subscribe; slow subscribers lose the oldest events
/// once `capacity` is exceeded.
///
/// # Examples
///
/// ```
/// use shelf_common::events::{EventBus, JobEvent};
///
/// let event_bus = EventBus::new(100);
/// let _rx = event_bus.subscribe();
/// event_bus.emit_lossy(JobEvent::JobStarted {
///     job_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: JobEvent) -> Result<usize, broadcast::error::SendError<JobEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: JobEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!(event = e.0.event_type(), "No event subscribers");
        }
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
