//! Graph neighbourhood and recommendation endpoints
//!
//! Unless `?unread=false` is given, responses also carry unread catalogue
//! suggestions for the queried book.

use axum::{
    extract::{Path, Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::graph::{rank_recommendations, render_html, Recommendation, Subgraph};
use crate::job::JobOutput;
use crate::AppState;

const DEFAULT_RECOMMENDATIONS: usize = 5;
const MAX_RECOMMENDATIONS: usize = 50;
/// Unread suggestions drawn into a graph view
const GRAPH_SUGGESTIONS: usize = 5;

fn finished_output(state: &AppState) -> ApiResult<Arc<JobOutput>> {
    state
        .jobs
        .output()
        .ok_or_else(|| ApiError::NotFound("No reading graph available yet".to_string()))
}

/// Unread catalogue suggestions for the book addressed by `key`
async fn unread_suggestions(
    state: &AppState,
    output: &JobOutput,
    key: &str,
    limit: usize,
) -> ApiResult<Vec<Recommendation>> {
    let node_key = output.graph.book_key(key)?;
    let Some(root) = output.book(&node_key) else {
        return Ok(Vec::new());
    };
    let found = state.enricher.unread_suggestions(root, &output.books, limit).await;
    tracing::debug!(book = %node_key, suggestions = found.len(), "Unread suggestions fetched");
    Ok(found.iter().map(|book| Recommendation::unread(root, book)).collect())
}

async fn subgraph_with_suggestions(state: &AppState, key: &str, unread: bool) -> ApiResult<Subgraph> {
    let output = finished_output(state)?;
    let mut subgraph = output.graph.subgraph(key)?;
    if unread {
        let suggestions = unread_suggestions(state, &output, key, GRAPH_SUGGESTIONS).await?;
        subgraph.attach_unread(&suggestions);
    }
    Ok(subgraph)
}

fn default_unread() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    #[serde(default = "default_unread")]
    pub unread: bool,
}

/// GET /graph/:key
pub async fn get_graph_html(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GraphQuery>,
) -> ApiResult<Html<String>> {
    let subgraph = subgraph_with_suggestions(&state, &key, query.unread).await?;
    Ok(Html(render_html(&subgraph)))
}

/// GET /graph/:key/json
pub async fn get_graph_json(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GraphQuery>,
) -> ApiResult<Json<Subgraph>> {
    Ok(Json(subgraph_with_suggestions(&state, &key, query.unread).await?))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<usize>,
    #[serde(default = "default_unread")]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub book: String,
    pub recommendations: Vec<Recommendation>,
}

/// GET /recommendations/:key?limit=n&unread=bool
///
/// Read books and unread suggestions are ranked together by weight.
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<RecommendationResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECOMMENDATIONS)
        .min(MAX_RECOMMENDATIONS);
    let output = finished_output(&state)?;
    let mut recommendations = output.graph.recommend(&key, limit)?;
    if query.unread {
        recommendations.extend(unread_suggestions(&state, &output, &key, limit).await?);
        rank_recommendations(&mut recommendations, limit);
    }
    Ok(Json(RecommendationResponse {
        book: key,
        recommendations,
    }))
}

pub fn graph_routes() -> Router<AppState> {
    Router::new()
        .route("/graph/:key", get(get_graph_html))
        .route("/graph/:key/json", get(get_graph_json))
        .route("/recommendations/:key", get(get_recommendations))
}
