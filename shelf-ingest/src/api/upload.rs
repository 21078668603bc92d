//! Export upload
//!
//! POST /upload accepts a multipart body whose `file` field holds the export.
//! The export is parsed before anything else happens, so a malformed file
//! leaves the current job (and its results) untouched. A well-formed file
//! becomes the new active job, superseding the previous one, and the request
//! resolves once its stats are built.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::job::{Job, JobOutput};
use crate::models::BookRecord;
use crate::parser::parse_export;
use crate::pipeline::{build_output, run_installed};
use crate::stats::StatsSnapshot;
use crate::AppState;

/// Multipart field carrying the export
pub const FILE_FIELD: &str = "file";

/// POST /upload response: the stats snapshot plus the enriched books
#[derive(Serialize)]
pub struct UploadResponse<'a> {
    #[serde(flatten)]
    pub stats: &'a StatsSnapshot,
    pub books: &'a [BookRecord],
}

async fn read_file_field(multipart: &mut Multipart) -> ApiResult<Vec<u8>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?.to_vec());
        }
    }
    Err(ApiError::BadRequest(format!(
        "No file uploaded (expected multipart field '{FILE_FIELD}')"
    )))
}

/// POST /upload
pub async fn upload_export(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let bytes = read_file_field(&mut multipart).await?;
    let parsed = parse_export(&bytes).map_err(|e| {
        warn!(error = %e, bytes = bytes.len(), "Rejected export");
        ApiError::from(e)
    })?;

    let job = Arc::new(Job::new(state.event_bus.clone()));
    info!(
        job_id = %job.id(),
        books = parsed.books.len(),
        rows = parsed.rows_read,
        skipped = parsed.rows_skipped,
        "Export accepted"
    );
    let previous = state.jobs.install(Arc::clone(&job));
    if let Some(previous) = &previous {
        info!(job_id = %job.id(), previous = %previous.id(), "Replaced active job");
    }

    // Run detached so a dropped connection does not abort the job
    let today = chrono::Local::now().date_naive();
    let handle = tokio::spawn(run_installed(
        state.jobs.clone(),
        Arc::clone(&job),
        previous,
        parsed.books,
        Arc::clone(&state.enricher),
        today,
        build_output,
    ));
    let output: Arc<JobOutput> = handle
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {e}")))??;

    let body = serde_json::to_value(UploadResponse {
        stats: &output.stats,
        books: &output.books,
    })
    .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(body))
}

/// Build upload routes with the given body size limit
pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_export))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
