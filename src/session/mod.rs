//! Session Store
//!
//! Durable record of which sessions are alive and which files each one owns.
//!
//! ## Architecture
//!
//! ```text
//! SessionLifecycleManager
//! └── Arc<dyn SessionStore>
//!     ├── LocalSessionStore  (JSON document, development)
//!     └── RedisSessionStore  (shared lists + Lua scripts, production)
//! ```
//!
//! Both backends keep the same three things:
//! - the session queue, oldest first, capped at `max_sessions`
//! - per session, the ordered file names, capped at `max_files_per_session`
//! - the purge ledger: sessions or files whose vectors still have to go
//!
//! Eviction writes the purge intent in the same atomic step that drops the
//! session, so a crash between eviction and vector cleanup is recovered by
//! [`SessionLifecycleManager::reconcile_pending_purges`].

mod error;
mod lifecycle;
mod local;
mod redis_store;

pub use error::{StoreError, StoreResult};
pub use lifecycle::{SessionInit, SessionLifecycleManager};
pub use local::{LocalSessionStore, SessionDocument};
pub use redis_store::RedisSessionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, DeploymentMode};

/// Unique session identifier (random UUIDv4 string)
pub type SessionId = String;

/// Vectors that must be deleted before the ledger entry can be dropped.
///
/// `file_name == None` means every chunk of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeIntent {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PurgeIntent {
    /// Intent to drop every chunk of a session
    pub fn session(session_id: impl Into<SessionId>) -> Self {
        PurgeIntent {
            session_id: session_id.into(),
            file_name: None,
            recorded_at: Utc::now(),
        }
    }

    /// Intent to drop the chunks of one file within a session
    pub fn file(session_id: impl Into<SessionId>, file_name: impl Into<String>) -> Self {
        PurgeIntent {
            session_id: session_id.into(),
            file_name: Some(file_name.into()),
            recorded_at: Utc::now(),
        }
    }

    /// Same target, ignoring when it was recorded
    pub fn same_target(&self, other: &PurgeIntent) -> bool {
        self.session_id == other.session_id && self.file_name == other.file_name
    }
}

/// Capabilities shared by every session store backend
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Configured session cap
    fn max_sessions(&self) -> usize;

    /// Configured per-session file cap
    fn max_files_per_session(&self) -> usize;

    /// Fresh random session id. Not registered until [`create`](Self::create).
    fn generate_session_id(&self) -> SessionId {
        uuid::Uuid::new_v4().to_string()
    }

    /// True iff the session has a file-list entry
    async fn is_valid(&self, session_id: &str) -> StoreResult<bool>;

    /// Register `session_id` with an empty file list.
    ///
    /// When the queue is full the oldest session is dropped first, a purge
    /// intent is recorded for it, and its id is returned.
    async fn create(&self, session_id: &str) -> StoreResult<Option<SessionId>>;

    /// Append `file_name` if the session exists and is under its cap.
    async fn add_file(&self, session_id: &str, file_name: &str) -> StoreResult<bool>;

    async fn remove_file(&self, session_id: &str, file_name: &str) -> StoreResult<()>;

    /// Files in insertion order; empty for unknown sessions
    async fn list_files(&self, session_id: &str) -> StoreResult<Vec<String>>;

    async fn can_add_file(&self, session_id: &str) -> StoreResult<bool> {
        Ok(self.list_files(session_id).await?.len() < self.max_files_per_session())
    }

    /// Remove the session from the queue and drop its file list
    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;

    /// Current queue, oldest first
    async fn queue(&self) -> StoreResult<Vec<SessionId>>;

    async fn record_purge(&self, intent: PurgeIntent) -> StoreResult<()>;

    async fn pending_purges(&self) -> StoreResult<Vec<PurgeIntent>>;

    /// Drop every ledger entry with the same target as `intent`
    async fn ack_purge(&self, intent: &PurgeIntent) -> StoreResult<()>;
}

/// Open the session store matching the deployment mode
pub async fn open_session_store(config: &Config) -> StoreResult<Arc<dyn SessionStore>> {
    let max_sessions = config.session.max_sessions;
    let max_files = config.session.max_files_per_session;

    match config.deployment.mode {
        DeploymentMode::Development => {
            let store =
                LocalSessionStore::open(&config.session.sessions_file, max_sessions, max_files)?;
            tracing::info!(
                path = %config.session.sessions_file.display(),
                max_sessions,
                max_files,
                "using local session store"
            );
            Ok(Arc::new(store))
        }
        DeploymentMode::Production => {
            let url = config.redis_url();
            let store = RedisSessionStore::connect(
                &url,
                max_sessions,
                max_files,
                Duration::from_millis(config.redis.timeout_ms),
            )
            .await?;
            tracing::info!(
                host = %config.redis.host,
                port = config.redis.port,
                db = config.redis.db,
                max_sessions,
                max_files,
                "using redis session store"
            );
            Ok(Arc::new(store))
        }
    }
}
