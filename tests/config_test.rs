//! Configuration loading tests
//!
//! Environment tests mutate process-wide state and run serially.

use partscout::config::{CacheBackend, Config};
use partscout::models::Provider;
use serial_test::serial;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const MANAGED_VARS: &[&str] = &[
    "PARTSCOUT_PROVIDERS",
    "PARTSCOUT_PRIMARY_PROVIDER",
    "PARTSCOUT_ADAPTER_TIMEOUT",
    "PARTSCOUT_FALLBACK_ENABLED",
    "PARTSCOUT_CACHE_BACKEND",
    "PARTSCOUT_CACHE_TTL",
    "ROSSKO_API_KEY1",
    "ROSSKO_API_KEY2",
    "BERG_API_KEY",
    "REDIS_URL",
];

fn clear_env() {
    for var in MANAGED_VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = Config::from_env().unwrap();

    assert_eq!(config.search.providers, Provider::all());
    assert_eq!(config.search.primary_provider, Provider::Autotrade);
    assert!(config.rossko.key1.is_empty());
    assert!(config.berg.api_key.is_none());
    assert_eq!(config.guards.cache_backend, CacheBackend::None);
}

#[test]
#[serial]
fn test_from_env_reads_credentials_and_search() {
    clear_env();
    std::env::set_var("ROSSKO_API_KEY1", "k1");
    std::env::set_var("ROSSKO_API_KEY2", "k2");
    std::env::set_var("BERG_API_KEY", "berg-key");
    std::env::set_var("PARTSCOUT_PROVIDERS", "berg, Rossko");
    std::env::set_var("PARTSCOUT_PRIMARY_PROVIDER", "berg");
    std::env::set_var("PARTSCOUT_ADAPTER_TIMEOUT", "7");
    std::env::set_var("PARTSCOUT_FALLBACK_ENABLED", "off");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.rossko.key1, "k1");
    assert_eq!(config.rossko.key2, "k2");
    assert_eq!(config.berg.api_key.as_deref(), Some("berg-key"));
    assert_eq!(config.search.providers, vec![Provider::Berg, Provider::Rossko]);
    assert_eq!(config.search.primary_provider, Provider::Berg);
    assert_eq!(config.search.adapter_timeout_secs, 7);
    assert!(!config.search.fallback_enabled);
}

#[test]
#[serial]
fn test_from_env_rejects_unknown_provider() {
    clear_env();
    std::env::set_var("PARTSCOUT_PROVIDERS", "berg,exist");
    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_from_env_rejects_unknown_cache_backend() {
    clear_env();
    std::env::set_var("PARTSCOUT_CACHE_BACKEND", "memcached");
    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_load_validates_env_config() {
    clear_env();
    std::env::set_var("PARTSCOUT_CACHE_BACKEND", "redis");
    let without_url = Config::load(None);
    std::env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
    let with_url = Config::load(None);
    clear_env();

    assert!(without_url.is_err());
    assert_eq!(with_url.unwrap().guards.cache_backend, CacheBackend::Redis);
}

#[test]
fn test_example_config_parses_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");
    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.search.primary_provider, Provider::Autotrade);
    assert_eq!(config.search.fallback_max_candidates, 3);
    assert_eq!(config.search.home_region_marker, "тюмень");
    assert_eq!(config.server.bind, "0.0.0.0:8001");
}

#[test]
fn test_from_file_partial_overrides() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[search]
providers = ["berg", "autostels"]
adapter_timeout_secs = 5

[guards]
cache_backend = "file"
cache_ttl_secs = 600
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.search.providers, vec![Provider::Berg, Provider::Autostels]);
    assert_eq!(config.search.adapter_timeout_secs, 5);
    assert_eq!(config.guards.cache_backend, CacheBackend::File);
    assert_eq!(config.guards.cache_ttl_secs, 600);
    assert_eq!(config.rossko.timeout_secs, 10);
}

#[test]
fn test_from_file_errors() {
    assert!(Config::from_file(Path::new("/nonexistent/partscout.toml")).is_err());

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[search\nadapter_timeout_secs = ").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_load_rejects_rossko_timeout_past_adapter_deadline() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[search]\nadapter_timeout_secs = 8\n\n[rossko]\ntimeout_secs = 12").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("rossko.timeout_secs"));
}

#[test]
fn test_load_rejects_unbounded_brand_requeries() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[berg]\nmax_brand_requeries = 40").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("berg.max_brand_requeries"));
}

#[test]
fn test_load_rejects_invalid_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[search]\nadapter_timeout_secs = 0").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("adapter_timeout_secs"));
}
