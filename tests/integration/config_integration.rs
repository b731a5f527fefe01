//! Integration tests for layered configuration loading

use genrelay::config::{ConfigLoader, GenrelayConfig, StoreBackend};
use genrelay::service::GenerationService;
use genrelay::types::GenerationRequest;
use std::path::Path;
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> config::Map<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("genrelay.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_env_overrides_file_which_overrides_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        temp_dir.path(),
        r#"
[jobs]
workers = 3
cache_ttl_secs = 60

[logging]
level = "debug"
"#,
    );

    let config = ConfigLoader::load_with_env(
        Some(&path),
        env(&[
            ("GENRELAY__JOBS__WORKERS", "6"),
            ("GENRELAY__FALLBACK__ALLOW_STUB_FALLBACK", "false"),
        ]),
    )
    .unwrap();

    assert_eq!(config.jobs.workers, 6);
    assert_eq!(config.jobs.cache_ttl_secs, 60);
    assert_eq!(config.jobs.retry_after_secs, 5);
    assert_eq!(config.logging.level, "debug");
    assert!(!config.fallback.allow_stub_fallback);
    assert_eq!(config.jobs.store, StoreBackend::Memory);
}

#[test]
fn test_file_api_key_wins_over_conventional_env_key() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        temp_dir.path(),
        r#"
[providers.openai]
enabled = true
api_key = "sk-file"
"#,
    );

    let config =
        ConfigLoader::load_with_env(Some(&path), env(&[("OPENAI_API_KEY", "sk-env")])).unwrap();
    assert_eq!(config.providers.openai.api_key, "sk-file");
}

#[test]
fn test_invalid_values_are_rejected_by_service_construction() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        temp_dir.path(),
        r#"
[providers.external]
endpoint = "ftp://example.com/research"

[jobs]
workers = 0
"#,
    );

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(GenerationService::from_config(&config).is_err());
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(temp_dir.path(), "[jobs\nworkers = ");
    assert!(ConfigLoader::load_from_file(&path).is_err());
}

#[tokio::test]
async fn test_default_config_serves_degraded_stub_result() {
    let config = ConfigLoader::load_with_env(None, env(&[])).unwrap();
    assert_eq!(config, GenrelayConfig::default());

    let service = GenerationService::from_config(&config).unwrap();
    let response = service
        .run(GenerationRequest::new("AI"), None)
        .await
        .unwrap();
    assert_eq!(response.provider, "stub");
    assert_eq!(response.items.len(), 1);
    assert!(!response.trace_id.is_empty());
}
