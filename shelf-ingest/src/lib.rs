//! shelf-ingest library interface
//!
//! Reading-history export ingestion: parse an export, enrich the records from
//! external catalogues, aggregate reading statistics and build a book/author
//! graph, all held in memory for the lifetime of the active job.

pub mod api;
pub mod enrichment;
pub mod error;
pub mod graph;
pub mod job;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod stats;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use enrichment::EnrichmentFetcher;
use job::JobSlot;
use shelf_common::config::ShelfConfig;
use shelf_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ShelfConfig>,
    /// The single active ingestion job
    pub jobs: JobSlot,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub enricher: Arc<EnrichmentFetcher>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ShelfConfig, enricher: Arc<EnrichmentFetcher>) -> Self {
        let event_bus = EventBus::new(config.event_capacity);
        Self {
            config: Arc::new(config),
            jobs: JobSlot::new(),
            event_bus,
            enricher,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(api::upload_routes(max_upload_bytes))
        .merge(api::progress_routes())
        .merge(api::graph_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
