//! Handler for docchat
//!
//! Shared state behind the REST API: the chat service plus lock-free request
//! counters (`AtomicU64`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::DocChatResult;
use crate::llm::CompletionModel;
use crate::service::ChatService;
use crate::Config;

pub struct Handler {
    service: ChatService,
    start_time: Instant,
    chat_count: AtomicU64,
    upload_count: AtomicU64,
}

impl Handler {
    pub fn new(service: ChatService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            chat_count: AtomicU64::new(0),
            upload_count: AtomicU64::new(0),
        }
    }

    /// Create a handler with every backend selected by `config`.
    pub async fn from_config(config: &Config) -> DocChatResult<Self> {
        Ok(Self::new(ChatService::from_config(config).await?))
    }

    /// Create a handler around a caller-supplied completion model.
    pub async fn with_model(
        config: &Config,
        model: Arc<dyn CompletionModel>,
    ) -> DocChatResult<Self> {
        Ok(Self::new(ChatService::with_model(config, model).await?))
    }

    pub fn service(&self) -> &ChatService {
        &self.service
    }

    /// Get uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get total chat requests served.
    pub fn total_chats(&self) -> u64 {
        self.chat_count.load(Ordering::Relaxed)
    }

    /// Get total files uploaded.
    pub fn total_uploads(&self) -> u64 {
        self.upload_count.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_chat_count(&self) {
        self.chat_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_upload_count(&self, files: usize) {
        self.upload_count.fetch_add(files as u64, Ordering::Relaxed);
    }

    /// Retry pending vector cleanups; failures are logged, not returned.
    pub async fn reconcile(&self) -> usize {
        match self.service.reconcile().await {
            Ok(settled) => settled,
            Err(e) => {
                tracing::warn!(error = %e, "purge reconciliation failed");
                0
            }
        }
    }
}
