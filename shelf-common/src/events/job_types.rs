//! Ingestion job type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ingestion job lifecycle phase
///
/// A job moves strictly `Parsing → Fetching → Building → Done`. `Idle` is
/// only reported when no job has ever been started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    #[default]
    Idle,
    /// Reading and validating the export
    Parsing,
    /// Enrichment lookups in flight
    Fetching,
    /// Aggregating statistics and building the graph
    Building,
    /// Results available
    Done,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Parsing => "parsing",
            JobPhase::Fetching => "fetching",
            JobPhase::Building => "building",
            JobPhase::Done => "done",
        }
    }

    /// The phase a job must be in before entering `self`
    pub fn predecessor(&self) -> Option<JobPhase> {
        match self {
            JobPhase::Idle | JobPhase::Parsing => None,
            JobPhase::Fetching => Some(JobPhase::Parsing),
            JobPhase::Building => Some(JobPhase::Fetching),
            JobPhase::Done => Some(JobPhase::Building),
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
