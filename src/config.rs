//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (DOCCHAT_* prefix, `__` separates sections)
//! - Deployment variables kept for compatibility (`APP_ENV`, `OPENAI_API_KEY`,
//!   `REDIS_HOST`, `CHROMADB_HOST`, ...)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [deployment]
//! mode = "production"
//!
//! [session]
//! max_sessions = 5
//! max_files_per_session = 3
//!
//! [redis]
//! host = "redis"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! DOCCHAT_SESSION__MAX_SESSIONS=50
//! APP_ENV=production
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Which set of backends to wire up at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum DeploymentMode {
    /// Local JSON session file + embedded vector index
    #[default]
    Development,
    /// Shared Redis session store + remote vector index
    Production,
}

impl DeploymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::Development => "development",
            DeploymentMode::Production => "production",
        }
    }
}

// Anything other than "production" (any case) selects the local backends.
impl From<String> for DeploymentMode {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            DeploymentMode::Production
        } else {
            DeploymentMode::Development
        }
    }
}

impl From<DeploymentMode> for String {
    fn from(mode: DeploymentMode) -> Self {
        mode.as_str().to_string()
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub mode: DeploymentMode,
}

/// Session admission limits and local store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of live sessions before the oldest is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Maximum number of distinct files per session
    #[serde(default = "default_max_files_per_session")]
    pub max_files_per_session: usize,

    /// JSON document used by the local session store
    #[serde(default = "default_sessions_file")]
    pub sessions_file: PathBuf,
}

/// Shared session store connection (production mode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,

    #[serde(default = "default_redis_port")]
    pub port: u16,

    #[serde(default)]
    pub db: i64,

    /// Upper bound for every store round trip, in milliseconds
    #[serde(default = "default_network_timeout_ms")]
    pub timeout_ms: u64,
}

/// Vector store settings for both the embedded and the remote index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Directory holding the embedded index (development mode)
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,

    /// Remote index host (production mode)
    #[serde(default = "default_chroma_host")]
    pub host: String,

    /// Remote index port (production mode)
    #[serde(default = "default_chroma_port")]
    pub port: u16,

    /// Logical collection name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Upper bound for every remote index call, in milliseconds
    #[serde(default = "default_network_timeout_ms")]
    pub timeout_ms: u64,

    /// HNSW parameters for the embedded index
    #[serde(default)]
    pub hnsw: HnswConfig,
}

/// HNSW graph parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max connections per node
    #[serde(default = "default_hnsw_m")]
    pub m: usize,

    /// Candidate list size while building
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Candidate list size while searching
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
}

/// Upload handling and chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Where uploads are staged before being converted and chunked
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

/// Embedding provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    OpenAi,
    /// Deterministic feature hashing, no network (offline runs and tests)
    Hashing,
}

/// Embedding and completion model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key (usually supplied through OPENAI_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub embedding_provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Dimension used by the hashing embedder
    #[serde(default = "default_hashing_dimension")]
    pub hashing_dimension: usize,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Number of chunks retrieved per question
    #[serde(default = "default_search_k")]
    pub search_k: usize,

    /// Upper bound for every model API call, in milliseconds
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional log file; stderr when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP server bind address
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = same-origin only, unless cors_allow_all is true)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Explicitly allow all CORS origins (dev mode opt-in)
    #[serde(default)]
    pub cors_allow_all: bool,

    /// Maximum accepted upload body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// How often pending purges are retried, in seconds. 0 = startup only.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

/// Configuration that parsed but cannot be used
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    #[error("Invalid API key format. API key should start with 'sk-'")]
    InvalidApiKey,
}

// Default value functions
fn default_max_sessions() -> usize {
    5
}
fn default_max_files_per_session() -> usize {
    3
}
fn default_sessions_file() -> PathBuf {
    PathBuf::from("./data/sessions.json")
}
fn default_redis_host() -> String {
    "redis".to_string()
}
fn default_redis_port() -> u16 {
    6379
}
fn default_network_timeout_ms() -> u64 {
    5_000
}
fn default_persist_dir() -> PathBuf {
    PathBuf::from("./data/chroma_db")
}
fn default_chroma_host() -> String {
    "chromadb".to_string()
}
fn default_chroma_port() -> u16 {
    8000
}
fn default_collection() -> String {
    "documents".to_string()
}
fn default_hnsw_m() -> usize {
    16
}
fn default_ef_construction() -> usize {
    200
}
fn default_ef_search() -> usize {
    64
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    80
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_hashing_dimension() -> usize {
    256
}
fn default_llm_model() -> String {
    "gpt-4-turbo".to_string()
}
fn default_search_k() -> usize {
    3
}
fn default_model_timeout_ms() -> u64 {
    60_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_http_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    crate::protocol::DEFAULT_PORT
}
fn default_max_upload_bytes() -> usize {
    crate::protocol::MAX_UPLOAD_SIZE
}
fn default_reconcile_interval_secs() -> u64 {
    60
}

/// Flat deployment variables and the nested keys they override
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("APP_ENV", "deployment.mode"),
    ("OPENAI_API_KEY", "models.api_key"),
    ("EMBEDDING_MODEL", "models.embedding_model"),
    ("LLM_MODEL", "models.llm_model"),
    ("REDIS_HOST", "redis.host"),
    ("REDIS_PORT", "redis.port"),
    ("REDIS_DB", "redis.db"),
    ("CHROMADB_HOST", "vector_store.host"),
    ("CHROMADB_PORT", "vector_store.port"),
];

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map_or_else(|| key.as_str().to_string(), |(_, path)| (*path).to_string())
            .into()
    })
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Deployment variables (APP_ENV, OPENAI_API_KEY, ...)
    /// 4. Environment variables (DOCCHAT_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(legacy_env())
            .merge(Env::prefixed("DOCCHAT_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(legacy_env())
            .merge(Env::prefixed("DOCCHAT_").split("__"))
            .extract()
    }

    /// Create default configuration
    pub fn default() -> Self {
        Config {
            deployment: DeploymentConfig::default(),
            session: SessionConfig::default(),
            redis: RedisConfig::default(),
            vector_store: VectorStoreConfig::default(),
            ingestion: IngestionConfig::default(),
            models: ModelConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
        }
    }

    /// Reject values that would make the lifecycle policies meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.max_sessions == 0 {
            return Err(ConfigError::Zero {
                field: "session.max_sessions",
            });
        }
        if self.session.max_files_per_session == 0 {
            return Err(ConfigError::Zero {
                field: "session.max_files_per_session",
            });
        }
        if self.ingestion.chunk_size == 0 {
            return Err(ConfigError::Zero {
                field: "ingestion.chunk_size",
            });
        }
        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.ingestion.chunk_overlap,
                size: self.ingestion.chunk_size,
            });
        }
        if self.models.search_k == 0 {
            return Err(ConfigError::Zero {
                field: "models.search_k",
            });
        }
        if let Some(key) = &self.models.api_key {
            if !key.is_empty() && !key.starts_with("sk-") {
                return Err(ConfigError::InvalidApiKey);
            }
        }
        Ok(())
    }

    /// Redis connection URL built from the `[redis]` section
    pub fn redis_url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.redis.host, self.redis.port, self.redis.db
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_sessions: default_max_sessions(),
            max_files_per_session: default_max_files_per_session(),
            sessions_file: default_sessions_file(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            timeout_ms: default_network_timeout_ms(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        VectorStoreConfig {
            persist_dir: default_persist_dir(),
            host: default_chroma_host(),
            port: default_chroma_port(),
            collection: default_collection(),
            timeout_ms: default_network_timeout_ms(),
            hnsw: HnswConfig::default(),
        }
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        HnswConfig {
            m: default_hnsw_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        IngestionConfig {
            upload_dir: default_upload_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            api_base: default_api_base(),
            api_key: None,
            embedding_provider: EmbeddingProvider::OpenAi,
            embedding_model: default_embedding_model(),
            hashing_dimension: default_hashing_dimension(),
            llm_model: default_llm_model(),
            search_k: default_search_k(),
            timeout_ms: default_model_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: default_http_host(),
            port: default_http_port(),
            cors_origins: Vec::new(),
            cors_allow_all: false,
            max_upload_bytes: default_max_upload_bytes(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }
}
