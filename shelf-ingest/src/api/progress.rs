//! Progress and cover polling
//!
//! Both endpoints answer with idle/empty bodies when no upload has been
//! accepted yet; polling is never an error.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::job::{CoverPage, ProgressSnapshot};
use crate::AppState;

/// GET /progress
pub async fn get_progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.jobs.progress())
}

#[derive(Debug, Default, Deserialize)]
pub struct CoversQuery {
    /// Cursor returned as `next` by the previous poll
    #[serde(default)]
    pub since: usize,
}

/// GET /covers?since=n
pub async fn get_covers(
    State(state): State<AppState>,
    Query(query): Query<CoversQuery>,
) -> Json<CoverPage> {
    let page = state
        .jobs
        .current()
        .map(|job| job.covers().since(query.since))
        .unwrap_or_default();
    Json(page)
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(get_progress))
        .route("/covers", get(get_covers))
}
