//! Model Clients
//!
//! Two narrow seams to the language-model provider:
//! - [`Embedder`]: text → vector, used by both vector index backends
//! - [`CompletionModel`]: system prompt + conversation → answer
//!
//! The OpenAI-compatible clients live in [`openai`]; [`HashingEmbedder`] is a
//! deterministic offline embedder for air-gapped runs and tests.

mod error;
mod hashing;
mod openai;

pub use error::{ModelError, ModelResult};
pub use hashing::HashingEmbedder;
pub use openai::{OpenAiChatModel, OpenAiEmbedder};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{EmbeddingProvider, ModelConfig};

/// Turns texts into fixed-size vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs
    fn model_name(&self) -> &str;

    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> ModelResult<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyResponse)
    }
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Produces one answer for a system prompt and a conversation
#[async_trait]
pub trait CompletionModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn run(&self, system: &str, messages: &[ChatMessage]) -> ModelResult<String>;
}

/// Build the embedder selected by `models.embedding_provider`
pub fn build_embedder(config: &ModelConfig) -> ModelResult<Arc<dyn Embedder>> {
    match config.embedding_provider {
        EmbeddingProvider::OpenAi => Ok(Arc::new(OpenAiEmbedder::from_config(config)?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.hashing_dimension))),
    }
}

/// Build the chat completion client
pub fn build_completion_model(config: &ModelConfig) -> ModelResult<Arc<dyn CompletionModel>> {
    Ok(Arc::new(OpenAiChatModel::from_config(config)?))
}
