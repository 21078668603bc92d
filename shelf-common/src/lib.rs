//! # Shelfscope Common Library
//!
//! Shared code for the Shelfscope services:
//! - Error types
//! - Configuration loading (TOML file, environment, CLI overrides)
//! - Job phase and event types
//! - Event bus used for phase-change notification

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, JobEvent, JobPhase};
