//! Session Lifecycle Manager
//!
//! Owns admission policy on top of a [`SessionStore`]: session creation with
//! FIFO eviction, the per-session file cap, and the vector cleanup that must
//! follow every eviction or removal.
//!
//! ## Purge protocol
//!
//! 1. A purge intent is recorded (atomically with eviction, or just before an
//!    explicit removal)
//! 2. The session store entry is dropped
//! 3. The coordinator deletes the matching chunks
//! 4. The intent is acknowledged only if step 3 succeeded
//!
//! Anything left pending is retried by [`SessionLifecycleManager::reconcile_pending_purges`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{PurgeIntent, SessionId, SessionStore, StoreResult};
use crate::coordinator::DocumentCoordinator;

/// Outcome of [`SessionLifecycleManager::initialize_session`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInit {
    pub session_id: SessionId,
    /// The caller's stored id was still valid
    pub reused: bool,
    /// Session dropped to make room, if any
    pub evicted: Option<SessionId>,
}

pub struct SessionLifecycleManager {
    store: Arc<dyn SessionStore>,
    coordinator: Arc<DocumentCoordinator>,
}

impl SessionLifecycleManager {
    pub fn new(store: Arc<dyn SessionStore>, coordinator: Arc<DocumentCoordinator>) -> Self {
        SessionLifecycleManager { store, coordinator }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<DocumentCoordinator> {
        &self.coordinator
    }

    pub fn max_files_per_session(&self) -> usize {
        self.store.max_files_per_session()
    }

    /// Reuse `stored_id_hint` if it is still valid, otherwise register a new
    /// session (evicting the oldest one when the queue is full).
    pub async fn initialize_session(&self, stored_id_hint: Option<&str>) -> StoreResult<SessionInit> {
        if let Some(hint) = stored_id_hint.filter(|h| !h.is_empty()) {
            if self.store.is_valid(hint).await? {
                tracing::debug!(session_id = hint, "reusing session");
                return Ok(SessionInit {
                    session_id: hint.to_string(),
                    reused: true,
                    evicted: None,
                });
            }
        }

        let session_id = self.store.generate_session_id();
        let evicted = self.store.create(&session_id).await?;
        tracing::info!(session_id = %session_id, "session created");

        if let Some(old) = &evicted {
            tracing::info!(session_id = %old, "session evicted");
            for intent in self.evicted_purges(old).await {
                self.complete_purge(&intent).await;
            }
        }

        Ok(SessionInit {
            session_id,
            reused: false,
            evicted,
        })
    }

    /// Session purges left by an eviction. A lowered cap can drain several
    /// sessions in one `create`, so every pending purge of a session that is
    /// gone is settled, not only the one `create` reported.
    async fn evicted_purges(&self, reported: &str) -> Vec<PurgeIntent> {
        let pending = match self.store.pending_purges().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "could not list pending purges");
                return vec![PurgeIntent::session(reported)];
            }
        };

        let mut drained = Vec::new();
        for intent in pending.into_iter().filter(|p| p.file_name.is_none()) {
            if matches!(self.store.is_valid(&intent.session_id).await, Ok(false)) {
                drained.push(intent);
            }
        }
        drained
    }

    pub async fn can_add_file(&self, session_id: &str) -> StoreResult<bool> {
        self.store.can_add_file(session_id).await
    }

    pub async fn add_file_to_session(&self, session_id: &str, file_name: &str) -> StoreResult<bool> {
        self.store.add_file(session_id, file_name).await
    }

    pub async fn get_session_files(&self, session_id: &str) -> StoreResult<Vec<String>> {
        self.store.list_files(session_id).await
    }

    /// Forget `file_name` and delete its chunks
    pub async fn remove_file_from_session(
        &self,
        session_id: &str,
        file_name: &str,
    ) -> StoreResult<()> {
        let intent = PurgeIntent::file(session_id, file_name);
        self.store.record_purge(intent.clone()).await?;
        self.store.remove_file(session_id, file_name).await?;
        self.complete_purge(&intent).await;
        Ok(())
    }

    /// Drop a whole session and every chunk it owns
    pub async fn remove_session(&self, session_id: &str) -> StoreResult<()> {
        let intent = PurgeIntent::session(session_id);
        self.store.record_purge(intent.clone()).await?;
        self.store.delete_session(session_id).await?;
        tracing::info!(session_id, "session removed");
        self.complete_purge(&intent).await;
        Ok(())
    }

    /// Run the vector cleanup for `intent`; acknowledge it on success.
    /// Returns whether the intent is now settled.
    async fn complete_purge(&self, intent: &PurgeIntent) -> bool {
        let result = match &intent.file_name {
            None => {
                self.coordinator
                    .try_remove_documents_by_session(&intent.session_id)
                    .await
            }
            Some(file_name) => {
                self.coordinator
                    .try_remove_documents_by_session_and_file(&intent.session_id, file_name)
                    .await
            }
        };

        if let Err(e) = result {
            tracing::warn!(
                session_id = %intent.session_id,
                file_name = ?intent.file_name,
                error = %e,
                "vector cleanup failed, purge left pending"
            );
            return false;
        }

        match self.store.ack_purge(intent).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    session_id = %intent.session_id,
                    file_name = ?intent.file_name,
                    error = %e,
                    "could not acknowledge purge"
                );
                false
            }
        }
    }

    /// Retry every pending purge; returns how many were settled
    pub async fn reconcile_pending_purges(&self) -> StoreResult<usize> {
        let pending = self.store.pending_purges().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut settled = 0;
        for intent in &pending {
            // A file purge for a file that was uploaded again must not wipe the new chunks.
            if let Some(file_name) = &intent.file_name {
                let files = self.store.list_files(&intent.session_id).await?;
                if files.iter().any(|f| f == file_name) {
                    self.store.ack_purge(intent).await?;
                    settled += 1;
                    continue;
                }
            }
            if self.complete_purge(intent).await {
                settled += 1;
            }
        }

        tracing::info!(
            pending = pending.len(),
            settled,
            "reconciled pending purges"
        );
        Ok(settled)
    }
}
