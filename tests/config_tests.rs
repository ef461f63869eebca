//! Config loading, TOML parsing, and env var override tests.
//!
//! Tests that mutate the process environment are `#[ignore]` (they conflict in parallel).
//! Run them with: `cargo test --test config_tests -- --ignored --test-threads=1`

use docchat::config::{ConfigError, DeploymentMode, EmbeddingProvider};
use docchat::Config;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

// Default Configuration Tests
#[test]
fn test_config_default_caps() {
    let config = Config::default();
    assert_eq!(config.session.max_sessions, 5);
    assert_eq!(config.session.max_files_per_session, 3);
}

#[test]
fn test_config_default_paths() {
    let config = Config::default();
    assert_eq!(config.ingestion.upload_dir, PathBuf::from("./data"));
    assert_eq!(
        config.vector_store.persist_dir,
        PathBuf::from("./data/chroma_db")
    );
}

#[test]
fn test_config_default_remote_endpoints() {
    let config = Config::default();
    assert_eq!(config.redis.host, "redis");
    assert_eq!(config.redis.port, 6379);
    assert_eq!(config.vector_store.host, "chromadb");
    assert_eq!(config.vector_store.port, 8000);
    assert_eq!(config.redis_url(), "redis://redis:6379/0");
}

#[test]
fn test_config_default_http() {
    let config = Config::default();
    assert_eq!(config.http.host, "127.0.0.1");
    assert_eq!(config.http.port, 8080);
    assert!(config.http.cors_origins.is_empty());
    assert!(!config.http.cors_allow_all);
}

// File Loading Tests
#[test]
fn test_from_file_partial_sections_keep_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
max_sessions = 2
max_files_per_session = 4

[ingestion]
chunk_size = 400
chunk_overlap = 40
"#,
    );

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.session.max_sessions, 2);
    assert_eq!(config.session.max_files_per_session, 4);
    assert_eq!(config.ingestion.chunk_size, 400);
    assert_eq!(config.ingestion.chunk_overlap, 40);
    // untouched sections keep their defaults
    assert_eq!(config.models.search_k, 3);
    assert_eq!(config.vector_store.hnsw.m, 16);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file_nested_hnsw_and_provider() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[vector_store.hnsw]
m = 8
ef_search = 32

[models]
embedding_provider = "hashing"
hashing_dimension = 64
"#,
    );

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.vector_store.hnsw.m, 8);
    assert_eq!(config.vector_store.hnsw.ef_search, 32);
    assert_eq!(config.vector_store.hnsw.ef_construction, 200);
    assert_eq!(config.models.embedding_provider, EmbeddingProvider::Hashing);
    assert_eq!(config.models.hashing_dimension, 64);
}

#[test]
fn test_from_file_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let config = Config::from_file(&path.to_string_lossy()).unwrap();
    assert_eq!(config.session.max_sessions, 5);
}

#[test]
fn test_from_file_rejects_wrong_types() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
max_sessions = "many"
"#,
    );
    assert!(Config::from_file(&path).is_err());
}

// Validation Tests
#[test]
fn test_validate_loaded_zero_cap() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
max_files_per_session = 0
"#,
    );
    let config = Config::from_file(&path).unwrap();
    assert_eq!(
        config.validate(),
        Err(ConfigError::Zero {
            field: "session.max_files_per_session"
        })
    );
}

#[test]
fn test_validate_accepts_sk_key() {
    let mut config = Config::default();
    config.models.api_key = Some("sk-test".to_string());
    assert!(config.validate().is_ok());
}

// Environment Override Tests
#[test]
#[ignore = "mutates process environment"]
fn test_legacy_env_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    env::set_var("APP_ENV", "production");
    env::set_var("REDIS_HOST", "cache.internal");
    env::set_var("REDIS_PORT", "6380");
    env::set_var("CHROMADB_PORT", "9000");
    env::set_var("LLM_MODEL", "gpt-4o");

    let config = Config::from_file(&path);

    env::remove_var("APP_ENV");
    env::remove_var("REDIS_HOST");
    env::remove_var("REDIS_PORT");
    env::remove_var("CHROMADB_PORT");
    env::remove_var("LLM_MODEL");

    let config = config.unwrap();
    assert_eq!(config.deployment.mode, DeploymentMode::Production);
    assert_eq!(config.redis.host, "cache.internal");
    assert_eq!(config.redis.port, 6380);
    assert_eq!(config.vector_store.port, 9000);
    assert_eq!(config.models.llm_model, "gpt-4o");
}

#[test]
#[ignore = "mutates process environment"]
fn test_prefixed_env_overrides_nested_keys() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
max_sessions = 2
"#,
    );

    env::set_var("DOCCHAT_SESSION__MAX_SESSIONS", "9");
    let config = Config::from_file(&path);
    env::remove_var("DOCCHAT_SESSION__MAX_SESSIONS");

    assert_eq!(config.unwrap().session.max_sessions, 9);
}

#[test]
#[ignore = "mutates process environment"]
fn test_unknown_app_env_is_development() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    env::set_var("APP_ENV", "staging");
    let config = Config::from_file(&path);
    env::remove_var("APP_ENV");

    assert_eq!(config.unwrap().deployment.mode, DeploymentMode::Development);
}
