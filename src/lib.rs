//! # docchat
//!
//! Session-scoped document question answering: users upload documents into a
//! short-lived session, the documents are chunked and embedded into a vector
//! index, and questions are answered by a language model from the session's
//! closest chunks.
//!
//! ## Architecture
//!
//! ```text
//! REST API (protocol::rest)
//!     ↓
//! ChatService
//!     ├── SessionLifecycleManager ── SessionStore (local JSON | Redis)
//!     │         └── DocumentCoordinator ── VectorIndex (embedded HNSW | remote)
//!     ├── DocumentProcessor (stage → extract → split)
//!     └── ChatBot (retrieve → augment → CompletionModel)
//! ```
//!
//! Sessions live in a FIFO queue capped at `max_sessions`; registering a new
//! session when the queue is full evicts the oldest one, and every eviction
//! or file removal is followed by deleting the matching chunks from the
//! vector index. Cleanups that fail stay in a purge ledger until
//! [`SessionLifecycleManager::reconcile_pending_purges`] settles them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docchat::{ChatService, Config, Upload};
//!
//! let config = Config::load()?;
//! let service = ChatService::from_config(&config).await?;
//!
//! let session = service.initialize_session(None).await?.session_id;
//! service
//!     .upload_files(&session, vec![Upload::new("guide.pdf", bytes)])
//!     .await?;
//! let answer = service.chat(&session, "What is covered?", &[]).await?;
//! ```

// Configuration and errors
pub mod config;
pub mod error;
pub mod timeout;

// Stores
pub mod coordinator;
pub mod session;
pub mod vector;

// Documents and models
pub mod chatbot;
pub mod ingest;
pub mod llm;
pub mod prompts;

// Service and transport
pub mod protocol;
pub mod service;

pub use chatbot::ChatBot;
pub use config::Config;
pub use coordinator::DocumentCoordinator;
pub use error::{DocChatError, DocChatResult};
pub use ingest::DocumentProcessor;
pub use service::{ChatService, SessionFiles, Upload, UploadReport};
pub use session::{
    open_session_store, LocalSessionStore, PurgeIntent, RedisSessionStore, SessionInit,
    SessionLifecycleManager, SessionStore,
};
pub use vector::{open_vector_index, Chunk, LocalVectorIndex, RemoteVectorIndex, VectorIndex};
