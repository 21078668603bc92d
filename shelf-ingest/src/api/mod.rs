//! HTTP API handlers for shelf-ingest

pub mod graph;
pub mod health;
pub mod progress;
pub mod sse;
pub mod upload;

pub use graph::graph_routes;
pub use health::health_routes;
pub use progress::progress_routes;
pub use sse::event_routes;
pub use upload::upload_routes;
