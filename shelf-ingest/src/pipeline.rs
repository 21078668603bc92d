//! Per-upload ingestion pipeline
//!
//! Drives one job from `fetching` through `building` to `done`:
//! enrich every record, then aggregate stats and build the graph from the
//! enriched records, then hand records still lacking a cover to the
//! background fallback pass.

use crate::enrichment::EnrichmentFetcher;
use crate::graph::{build_graph, ReadingGraph};
use crate::job::{Job, JobOutput, JobSlot, PhaseError};
use crate::models::BookRecord;
use crate::stats::{aggregate, StatsSnapshot};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Job {0} was superseded by a newer upload")]
    Superseded(Uuid),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("Build task failed: {0}")]
    Build(String),
}

/// The `building` phase: stats and graph from enriched records
pub type BuildFn = fn(&[BookRecord], NaiveDate) -> (StatsSnapshot, ReadingGraph);

pub fn build_output(books: &[BookRecord], today: NaiveDate) -> (StatsSnapshot, ReadingGraph) {
    (aggregate(books, today), build_graph(books))
}

/// Run the pipeline for `job` over already-parsed `records`
///
/// `today` decides which records fall in the `this_year` view.
pub async fn run_pipeline(
    job: Arc<Job>,
    records: Vec<BookRecord>,
    enricher: Arc<EnrichmentFetcher>,
    today: NaiveDate,
) -> Result<Arc<JobOutput>, PipelineError> {
    run_pipeline_with(job, records, enricher, today, build_output).await
}

/// Run the pipeline for a job just installed in `jobs`
///
/// If the pipeline fails for any reason other than being superseded, the
/// install is rolled back so the slot never holds a job that cannot finish.
pub async fn run_installed(
    jobs: JobSlot,
    job: Arc<Job>,
    previous: Option<Arc<Job>>,
    records: Vec<BookRecord>,
    enricher: Arc<EnrichmentFetcher>,
    today: NaiveDate,
    build: BuildFn,
) -> Result<Arc<JobOutput>, PipelineError> {
    let result = run_pipeline_with(Arc::clone(&job), records, enricher, today, build).await;
    if let Err(e) = &result {
        if !matches!(e, PipelineError::Superseded(_)) {
            let restored = previous.as_ref().map(|p| p.id());
            if jobs.rollback(job.id(), previous) {
                warn!(job_id = %job.id(), error = %e, restored = ?restored, "Job failed, install rolled back");
            }
        }
    }
    result
}

pub async fn run_pipeline_with(
    job: Arc<Job>,
    records: Vec<BookRecord>,
    enricher: Arc<EnrichmentFetcher>,
    today: NaiveDate,
    build: BuildFn,
) -> Result<Arc<JobOutput>, PipelineError> {
    let started = Instant::now();
    let total = records.len();

    job.tracker().begin_fetch(total)?;
    info!(
        job_id = %job.id(),
        records = total,
        workers = enricher.workers(),
        "Enrichment started"
    );

    let books = enricher.enrich_all(records, &job).await;
    if job.is_cancelled() {
        return Err(PipelineError::Superseded(job.id()));
    }

    job.tracker().begin_build()?;
    let (stats, graph, books) = tokio::task::spawn_blocking(move || {
        let (stats, graph) = build(&books, today);
        (stats, graph, books)
    })
    .await
    .map_err(|e| PipelineError::Build(e.to_string()))?;

    // Results of a superseded job are never published
    if job.is_cancelled() {
        return Err(PipelineError::Superseded(job.id()));
    }

    let output = job.set_output(JobOutput { stats, graph, books });
    job.tracker().finish()?;

    info!(
        job_id = %job.id(),
        books = output.books.len(),
        covers = job.covers().len(),
        nodes = output.graph.node_count(),
        edges = output.graph.edge_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Job complete"
    );

    enricher.spawn_cover_fallback(&output.books, Arc::clone(&job));
    Ok(output)
}
