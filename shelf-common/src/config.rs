//! Configuration loading and resolution
//!
//! Resolution priority, highest first:
//! 1. Command-line overrides
//! 2. Environment variables (`SHELF_*`)
//! 3. TOML config file (explicit path, or the platform config directory)
//! 4. Compiled defaults
//!
//! A missing or unreadable config file never aborts startup: the resolver
//! records a warning and falls back to the next tier.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable names
pub const ENV_CONFIG_PATH: &str = "SHELF_CONFIG";
pub const ENV_BIND_ADDRESS: &str = "SHELF_BIND_ADDRESS";
pub const ENV_PORT: &str = "SHELF_PORT";
pub const ENV_LOG_LEVEL: &str = "SHELF_LOG_LEVEL";
pub const ENV_FETCH_WORKERS: &str = "SHELF_FETCH_WORKERS";
pub const ENV_GOOGLE_BOOKS_API_KEY: &str = "SHELF_GOOGLE_BOOKS_API_KEY";

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
    /// Default tracing filter directive (RUST_LOG takes precedence)
    pub log_level: String,
    /// Concurrent enrichment lookups per job
    pub fetch_workers: usize,
    /// Requests per second allowed against each external catalogue
    pub requests_per_second: u32,
    /// Timeout for a single external request
    pub request_timeout_secs: u64,
    /// Optional Google Books API key
    pub google_books_api_key: Option<String>,
    /// How long a found lookup result stays cached in memory
    pub lookup_cache_ttl_secs: u64,
    /// Event bus buffer size
    pub event_capacity: usize,
    /// Maximum accepted upload body size in bytes
    pub max_upload_bytes: usize,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5740,
            log_level: "info".to_string(),
            fetch_workers: 8,
            requests_per_second: 5,
            request_timeout_secs: 10,
            google_books_api_key: None,
            lookup_cache_ttl_secs: 24 * 60 * 60,
            event_capacity: 100,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ShelfConfig {
    /// Socket address string for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch_workers == 0 {
            return Err(Error::Config("fetch_workers must be at least 1".to_string()));
        }
        if self.requests_per_second == 0 {
            return Err(Error::Config(
                "requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub fetch_workers: Option<usize>,
}

/// Where the file tier of the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from this TOML file
    File(PathBuf),
    /// No file was usable; compiled defaults
    Defaults,
}

/// Outcome of configuration resolution
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ShelfConfig,
    pub source: ConfigSource,
    /// Problems encountered while resolving; logged by the caller once
    /// tracing is up
    pub warnings: Vec<String>,
}

/// Resolves [`ShelfConfig`] across CLI, environment, file and defaults
pub struct ConfigResolver {
    overrides: ConfigOverrides,
}

impl ConfigResolver {
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self { overrides }
    }

    /// Resolve the effective configuration
    ///
    /// Never fails: unusable sources are reported through
    /// [`ResolvedConfig::warnings`] and skipped.
    pub fn resolve(&self) -> ResolvedConfig {
        let mut warnings = Vec::new();

        let explicit_path = self
            .overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from));

        let (mut config, source) = match explicit_path {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => (config, ConfigSource::File(path)),
                Err(e) => {
                    warnings.push(format!("{} (using defaults)", e));
                    (ShelfConfig::default(), ConfigSource::Defaults)
                }
            },
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => match load_toml_config(&path) {
                    Ok(config) => (config, ConfigSource::File(path)),
                    Err(e) => {
                        warnings.push(format!("{} (using defaults)", e));
                        (ShelfConfig::default(), ConfigSource::Defaults)
                    }
                },
                None => (ShelfConfig::default(), ConfigSource::Defaults),
            },
        };

        apply_env(&mut config, &mut warnings);
        self.apply_overrides(&mut config);

        ResolvedConfig {
            config,
            source,
            warnings,
        }
    }

    fn apply_overrides(&self, config: &mut ShelfConfig) {
        if let Some(bind) = &self.overrides.bind_address {
            config.bind_address = bind.clone();
        }
        if let Some(port) = self.overrides.port {
            config.port = port;
        }
        if let Some(level) = &self.overrides.log_level {
            config.log_level = level.clone();
        }
        if let Some(workers) = self.overrides.fetch_workers {
            config.fetch_workers = workers;
        }
    }
}

/// Apply `SHELF_*` environment variables on top of `config`
fn apply_env(config: &mut ShelfConfig, warnings: &mut Vec<String>) {
    if let Ok(bind) = std::env::var(ENV_BIND_ADDRESS) {
        config.bind_address = bind;
    }
    if let Ok(port) = std::env::var(ENV_PORT) {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => warnings.push(format!("Ignoring invalid {}: {}", ENV_PORT, port)),
        }
    }
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
        config.log_level = level;
    }
    if let Ok(workers) = std::env::var(ENV_FETCH_WORKERS) {
        match workers.parse() {
            Ok(workers) => config.fetch_workers = workers,
            Err(_) => warnings.push(format!(
                "Ignoring invalid {}: {}",
                ENV_FETCH_WORKERS, workers
            )),
        }
    }
    if let Ok(key) = std::env::var(ENV_GOOGLE_BOOKS_API_KEY) {
        if !key.trim().is_empty() {
            config.google_books_api_key = Some(key);
        }
    }
}

/// Load a TOML config file
///
/// Fields absent from the file take their default values.
pub fn load_toml_config(path: &Path) -> Result<ShelfConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Platform config file location: `<config_dir>/shelfscope/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("shelfscope").join("config.toml"))
}
