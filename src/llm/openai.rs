//! OpenAI-compatible HTTP clients for `/embeddings` and `/chat/completions`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatMessage, CompletionModel, Embedder, ModelError, ModelResult};
use crate::config::ModelConfig;

const PROVIDER: &str = "openai";

fn http_client(timeout_ms: u64) -> ModelResult<Client> {
    let mut builder = Client::builder();
    if timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    Ok(builder.build()?)
}

fn require_key(config: &ModelConfig) -> ModelResult<String> {
    match &config.api_key {
        Some(key) if !key.is_empty() => Ok(key.clone()),
        _ => Err(ModelError::MissingApiKey { provider: PROVIDER }),
    }
}

async fn check_status(response: reqwest::Response) -> ModelResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ModelError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Embedding client (`text-embedding-ada-002` by default)
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_ms: u64,
    ) -> ModelResult<Self> {
        Ok(Self {
            client: http_client(timeout_ms)?,
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &ModelConfig) -> ModelResult<Self> {
        Self::new(
            config.api_base.clone(),
            require_key(config)?,
            config.embedding_model.clone(),
            config.timeout_ms,
        )
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;
        let mut body: EmbeddingResponse = check_status(response).await?.json().await?;

        if body.data.len() != texts.len() {
            tracing::warn!(
                expected = texts.len(),
                got = body.data.len(),
                model = %self.model,
                "embedding count mismatch"
            );
            return Err(ModelError::EmptyResponse);
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion client (`gpt-4-turbo` by default)
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_ms: u64,
    ) -> ModelResult<Self> {
        Ok(Self {
            client: http_client(timeout_ms)?,
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &ModelConfig) -> ModelResult<Self> {
        Self::new(
            config.api_base.clone(),
            require_key(config)?,
            config.llm_model.clone(),
            config.timeout_ms,
        )
    }
}

#[async_trait]
impl CompletionModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn run(&self, system: &str, messages: &[ChatMessage]) -> ModelResult<String> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::system(system));
        all.extend_from_slice(messages);

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: all,
            })
            .send()
            .await?;
        let body: ChatResponse = check_status(response).await?.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_key() {
        let config = ModelConfig::default();
        let err = OpenAiEmbedder::from_config(&config).unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey { provider: "openai" }));
        assert!(OpenAiChatModel::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_uses_models() {
        let config = ModelConfig {
            api_key: Some("sk-test".into()),
            ..ModelConfig::default()
        };
        let embedder = OpenAiEmbedder::from_config(&config).unwrap();
        let chat = OpenAiChatModel::from_config(&config).unwrap();
        assert_eq!(embedder.model_name(), "text-embedding-ada-002");
        assert_eq!(chat.model_name(), "gpt-4-turbo");
    }

    #[test]
    fn test_debug_hides_key() {
        let chat = OpenAiChatModel::new("http://localhost", "sk-secret", "m", 0).unwrap();
        assert!(!format!("{chat:?}").contains("sk-secret"));
    }

    #[test]
    fn test_embedding_response_parsing() {
        let raw = r#"{"data":[{"embedding":[0.5,0.5],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#;
        let mut body: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        body.data.sort_by_key(|d| d.index);
        assert_eq!(body.data[0].embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_chat_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"42"}}]}"#;
        let body: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some("42"));
    }
}
