//! Configuration resolution and graceful degradation tests
//!
//! Covers:
//! - Missing or broken TOML files never abort resolution
//! - Priority order: CLI > environment > TOML > defaults
//!
//! Tests that manipulate SHELF_* variables are marked #[serial] so they do
//! not race each other.

use serial_test::serial;
use shelf_common::config::{
    load_toml_config, ConfigOverrides, ConfigResolver, ConfigSource, ShelfConfig,
    ENV_CONFIG_PATH, ENV_FETCH_WORKERS, ENV_GOOGLE_BOOKS_API_KEY, ENV_PORT,
};
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn clear_env() {
    for name in [
        ENV_CONFIG_PATH,
        "SHELF_BIND_ADDRESS",
        ENV_PORT,
        "SHELF_LOG_LEVEL",
        ENV_FETCH_WORKERS,
        ENV_GOOGLE_BOOKS_API_KEY,
    ] {
        env::remove_var(name);
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_missing_explicit_file_falls_back_to_defaults() {
    clear_env();

    let resolver = ConfigResolver::new(ConfigOverrides {
        config_path: Some(PathBuf::from("/nonexistent/shelfscope/config.toml")),
        ..Default::default()
    });
    let resolved = resolver.resolve();

    assert_eq!(resolved.source, ConfigSource::Defaults);
    assert_eq!(resolved.config, ShelfConfig::default());
    assert_eq!(resolved.warnings.len(), 1);
}

#[test]
#[serial]
fn test_file_values_are_loaded() {
    clear_env();
    let file = write_config("port = 6001\nrequests_per_second = 2\n");

    let resolver = ConfigResolver::new(ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..Default::default()
    });
    let resolved = resolver.resolve();

    assert_eq!(resolved.source, ConfigSource::File(file.path().to_path_buf()));
    assert_eq!(resolved.config.port, 6001);
    assert_eq!(resolved.config.requests_per_second, 2);
    assert!(resolved.warnings.is_empty());
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = write_config("port = 6001\nfetch_workers = 2\n");
    env::set_var(ENV_PORT, "6002");
    env::set_var(ENV_GOOGLE_BOOKS_API_KEY, "abc123");

    let resolver = ConfigResolver::new(ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..Default::default()
    });
    let resolved = resolver.resolve();

    assert_eq!(resolved.config.port, 6002);
    assert_eq!(resolved.config.fetch_workers, 2);
    assert_eq!(resolved.config.google_books_api_key.as_deref(), Some("abc123"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(ENV_FETCH_WORKERS, "3");

    let resolver = ConfigResolver::new(ConfigOverrides {
        config_path: Some(PathBuf::from("/nonexistent/config.toml")),
        fetch_workers: Some(12),
        port: Some(7000),
        ..Default::default()
    });
    let resolved = resolver.resolve();

    assert_eq!(resolved.config.fetch_workers, 12);
    assert_eq!(resolved.config.port, 7000);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_value_is_reported_not_applied() {
    clear_env();
    env::set_var(ENV_PORT, "not-a-port");

    let resolver = ConfigResolver::new(ConfigOverrides {
        config_path: Some(PathBuf::from("/nonexistent/config.toml")),
        ..Default::default()
    });
    let resolved = resolver.resolve();

    assert_eq!(resolved.config.port, ShelfConfig::default().port);
    assert!(resolved.warnings.iter().any(|w| w.contains(ENV_PORT)));

    clear_env();
}

#[test]
#[serial]
fn test_env_config_path_is_used() {
    clear_env();
    let file = write_config("bind_address = \"0.0.0.0\"\n");
    env::set_var(ENV_CONFIG_PATH, file.path());

    let resolved = ConfigResolver::new(ConfigOverrides::default()).resolve();

    assert_eq!(resolved.config.bind_address, "0.0.0.0");

    clear_env();
}

#[test]
fn test_malformed_toml_is_config_error() {
    let file = write_config("port = [not valid");
    let result = load_toml_config(file.path());
    assert!(matches!(result, Err(shelf_common::Error::Config(_))));
}
