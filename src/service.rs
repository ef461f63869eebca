//! Chat Service
//!
//! The user-facing flows, each taking the session id explicitly:
//!
//! - upload: admit files under the session cap, stage them, index only the
//!   ones not yet indexed for the session, drop the staged copies
//! - delete: forget a file (or a whole session) and its chunks
//! - chat: answer a question from the session's documents

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::chatbot::ChatBot;
use crate::config::Config;
use crate::coordinator::DocumentCoordinator;
use crate::error::{DocChatError, DocChatResult};
use crate::ingest::{sanitize_file_name, DocumentProcessor};
use crate::llm::{build_completion_model, build_embedder, ChatMessage, CompletionModel};
use crate::session::{open_session_store, SessionInit, SessionLifecycleManager};
use crate::vector::open_vector_index;

/// One uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Upload {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Outcome of an upload batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// Files now registered in the session
    pub accepted: Vec<String>,
    /// Files turned away: cap reached, unusable name, or no indexable text
    pub rejected: Vec<String>,
    /// Accepted files that were newly chunked and indexed
    pub processed: Vec<String>,
    /// Human-readable status lines
    pub messages: Vec<String>,
}

/// Files of a session and whether more can be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFiles {
    pub session_id: String,
    pub files: Vec<String>,
    pub count: usize,
    pub max_files: usize,
    pub can_upload: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct ChatService {
    lifecycle: Arc<SessionLifecycleManager>,
    processor: Arc<DocumentProcessor>,
    chatbot: ChatBot,
}

impl ChatService {
    pub fn new(
        lifecycle: Arc<SessionLifecycleManager>,
        processor: Arc<DocumentProcessor>,
        chatbot: ChatBot,
    ) -> Self {
        ChatService {
            lifecycle,
            processor,
            chatbot,
        }
    }

    /// Wire every backend selected by `config`
    pub async fn from_config(config: &Config) -> DocChatResult<Self> {
        let model = build_completion_model(&config.models)?;
        Self::with_model(config, model).await
    }

    /// Same as [`ChatService::from_config`] with a caller-supplied completion model
    pub async fn with_model(config: &Config, model: Arc<dyn CompletionModel>) -> DocChatResult<Self> {
        let store = open_session_store(config).await?;
        let embedder = build_embedder(&config.models)?;
        let index =
            open_vector_index(config.deployment.mode, &config.vector_store, embedder).await?;
        let coordinator = Arc::new(DocumentCoordinator::new(Arc::clone(&index)));
        let lifecycle = Arc::new(SessionLifecycleManager::new(store, coordinator));
        let processor = Arc::new(DocumentProcessor::from_config(&config.ingestion)?);
        let chatbot = ChatBot::new(index, model, config.models.search_k);
        Ok(Self::new(lifecycle, processor, chatbot))
    }

    pub fn lifecycle(&self) -> &Arc<SessionLifecycleManager> {
        &self.lifecycle
    }

    /// Retry vector cleanups left pending by earlier failures
    pub async fn reconcile(&self) -> DocChatResult<usize> {
        Ok(self.lifecycle.reconcile_pending_purges().await?)
    }

    pub async fn initialize_session(&self, hint: Option<&str>) -> DocChatResult<SessionInit> {
        Ok(self.lifecycle.initialize_session(hint).await?)
    }

    async fn require_session(&self, session_id: &str) -> DocChatResult<()> {
        if self.lifecycle.store().is_valid(session_id).await? {
            Ok(())
        } else {
            Err(DocChatError::SessionNotFound {
                session_id: session_id.to_string(),
            })
        }
    }

    pub async fn session_files(&self, session_id: &str) -> DocChatResult<SessionFiles> {
        self.require_session(session_id).await?;
        let files = self.lifecycle.get_session_files(session_id).await?;
        let can_upload = self.lifecycle.can_add_file(session_id).await?;
        let max_files = self.lifecycle.max_files_per_session();
        let warning = (!can_upload).then(|| {
            format!("Maximum {max_files} files per session reached. Delete a file to upload new ones.")
        });

        Ok(SessionFiles {
            session_id: session_id.to_string(),
            count: files.len(),
            files,
            max_files,
            can_upload,
            warning,
        })
    }

    /// Admit, stage and index a batch of uploads.
    ///
    /// A file that cannot be staged, read or indexed is rolled back out of the
    /// session (when this batch registered it) and reported in `rejected`.
    pub async fn upload_files(
        &self,
        session_id: &str,
        uploads: Vec<Upload>,
    ) -> DocChatResult<UploadReport> {
        self.require_session(session_id).await?;
        let mut report = UploadReport::default();
        let mut added: BTreeSet<String> = BTreeSet::new();

        for upload in uploads {
            let name = match sanitize_file_name(&upload.name) {
                Ok(name) => name,
                Err(e) => {
                    report.messages.push(format!("Cannot upload {}: {e}", upload.name));
                    report.rejected.push(upload.name);
                    continue;
                }
            };

            let registered = self.lifecycle.get_session_files(session_id).await?;
            if !self.lifecycle.can_add_file(session_id).await?
                || !self.lifecycle.add_file_to_session(session_id, &name).await?
            {
                report
                    .messages
                    .push(format!("Cannot upload {name}: maximum files limit reached"));
                report.rejected.push(name);
                continue;
            }
            if !registered.contains(&name) {
                added.insert(name.clone());
            }

            let processor = Arc::clone(&self.processor);
            let sid = session_id.to_string();
            let staged_name = name.clone();
            let saved = tokio::task::spawn_blocking(move || {
                processor.save_upload(&sid, &staged_name, &upload.bytes)
            })
            .await?;
            if let Err(e) = saved {
                tracing::warn!(session_id, file_name = %name, error = %e, "could not stage upload");
                if added.remove(&name) {
                    self.lifecycle.remove_file_from_session(session_id, &name).await?;
                }
                report.messages.push(format!("Cannot upload {name}: {e}"));
                report.rejected.push(name);
                continue;
            }
            if !report.accepted.contains(&name) {
                report.accepted.push(name);
            }
        }

        if report.accepted.is_empty() {
            return Ok(report);
        }
        let staged = report.accepted.clone();

        let already: BTreeSet<String> = self
            .lifecycle
            .coordinator()
            .get_processed_files_for_session(session_id)
            .await;
        let new_files: Vec<String> = report
            .accepted
            .iter()
            .filter(|f| !already.contains(*f))
            .cloned()
            .collect();

        if new_files.is_empty() {
            report
                .messages
                .push("All documents are already processed.".to_string());
        } else {
            let processor = Arc::clone(&self.processor);
            let sid = session_id.to_string();
            let to_process = new_files;
            let processed = tokio::task::spawn_blocking(move || {
                processor.process_new_files(&to_process, &sid)
            })
            .await?;

            let mut failed: Vec<(String, String)> = processed
                .failures
                .into_iter()
                .map(|(name, e)| (name, e.to_string()))
                .collect();
            for (name, chunks) in processed.documents {
                match self.lifecycle.coordinator().try_add_chunks(chunks).await {
                    Ok(_) => report.processed.push(name),
                    Err(e) => {
                        tracing::warn!(session_id, file_name = %name, error = %e, "failed to index document");
                        failed.push((name, e.to_string()));
                    }
                }
            }

            for (name, reason) in failed {
                // Nothing of this file is searchable, so it must not count against the cap
                self.lifecycle.remove_file_from_session(session_id, &name).await?;
                report.accepted.retain(|f| *f != name);
                report.messages.push(format!("Cannot process {name}: {reason}"));
                report.rejected.push(name);
            }

            if !report.processed.is_empty() {
                report.messages.push(format!(
                    "Successfully processed {} new document(s).",
                    report.processed.len()
                ));
            }
        }

        let processor = Arc::clone(&self.processor);
        let sid = session_id.to_string();
        tokio::task::spawn_blocking(move || processor.delete_processed_files(&staged, &sid))
            .await?;

        tracing::info!(
            session_id,
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            processed = report.processed.len(),
            "upload batch handled"
        );
        Ok(report)
    }

    /// Remove one file and its chunks
    pub async fn delete_file(&self, session_id: &str, file_name: &str) -> DocChatResult<()> {
        self.require_session(session_id).await?;
        let files = self.lifecycle.get_session_files(session_id).await?;
        if !files.iter().any(|f| f == file_name) {
            return Err(DocChatError::FileNotFound {
                session_id: session_id.to_string(),
                file_name: file_name.to_string(),
            });
        }
        self.lifecycle
            .remove_file_from_session(session_id, file_name)
            .await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> DocChatResult<()> {
        self.require_session(session_id).await?;
        self.lifecycle.remove_session(session_id).await?;
        Ok(())
    }

    /// Answer `query` from the session's documents
    pub async fn chat(
        &self,
        session_id: &str,
        query: &str,
        history: &[ChatMessage],
    ) -> DocChatResult<String> {
        if query.trim().is_empty() {
            return Err(DocChatError::InvalidRequest {
                message: "query must not be empty".to_string(),
            });
        }
        self.require_session(session_id).await?;
        if self.lifecycle.get_session_files(session_id).await?.is_empty() {
            return Err(DocChatError::NoDocuments);
        }
        Ok(self.chatbot.chat(session_id, query, history).await?)
    }
}
