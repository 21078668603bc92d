//! Test Helper Utilities
//!
//! Shared utilities for testing shelf-ingest over HTTP

pub mod export;
pub mod sources;

pub use export::{multipart_upload, ExportBuilder};
pub use sources::{FakeSource, StallingSource};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shelf_common::config::ShelfConfig;
use shelf_ingest::enrichment::{EnrichmentFetcher, MetadataSource};
use shelf_ingest::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// App state whose enrichment runs against `primary` only
pub fn test_state(primary: Arc<dyn MetadataSource>) -> AppState {
    test_state_with_fallbacks(primary, Vec::new())
}

pub fn test_state_with_fallbacks(
    primary: Arc<dyn MetadataSource>,
    fallbacks: Vec<Arc<dyn MetadataSource>>,
) -> AppState {
    let config = ShelfConfig {
        fetch_workers: 4,
        ..ShelfConfig::default()
    };
    let enricher = EnrichmentFetcher::new(primary, fallbacks, config.fetch_workers, Duration::from_secs(60));
    AppState::new(config, Arc::new(enricher))
}

pub fn test_app(state: &AppState) -> Router {
    build_router(state.clone())
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn upload(app: &Router, csv: &[u8]) -> Response<Body> {
    send(app, multipart_upload("file", csv)).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
