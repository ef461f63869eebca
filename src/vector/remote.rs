//! Remote Vector Index
//!
//! Talks to a Chroma-compatible server over its v1 REST API:
//!
//! ```text
//! POST /api/v1/collections                 get-or-create, returns the collection id
//! POST /api/v1/collections/{id}/add        ids, embeddings, metadatas, documents
//! POST /api/v1/collections/{id}/query      query_embeddings, n_results, where
//! POST /api/v1/collections/{id}/get        ids + metadatas of every record
//! POST /api/v1/collections/{id}/delete     ids
//! ```
//!
//! Embeddings are computed client-side so both backends share one embedder.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{Metadata, MetadataFilter, ScoredChunk, VectorIndex, VectorResult, VectorStoreError};
use crate::config::VectorStoreConfig;
use crate::llm::Embedder;

/// Chroma collection accessed over HTTP
pub struct RemoteVectorIndex {
    client: Client,
    base_url: String,
    collection_id: String,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: &'a [String],
    embeddings: Vec<Vec<f32>>,
    metadatas: &'a [Metadata],
    documents: &'a [String],
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

#[derive(Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    metadatas: Option<Vec<Option<serde_json::Map<String, Value>>>>,
}

/// Chroma `where` clause for an equality conjunction
fn where_clause(filter: &MetadataFilter) -> Option<Value> {
    let mut terms: Vec<Value> = filter.iter().map(|(k, v)| json!({ k: v })).collect();
    match terms.len() {
        0 => None,
        1 => terms.pop(),
        _ => Some(json!({ "$and": terms })),
    }
}

/// Remote metadata values may be numbers or booleans; keep them as strings
fn to_metadata(raw: Option<serde_json::Map<String, Value>>) -> Metadata {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

async fn check_status(response: reqwest::Response) -> VectorResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(VectorStoreError::Remote {
        status: status.as_u16(),
        message,
    })
}

impl RemoteVectorIndex {
    /// Resolve (creating if needed) the configured collection
    pub async fn connect(
        config: &VectorStoreConfig,
        embedder: Arc<dyn Embedder>,
    ) -> VectorResult<Self> {
        let mut builder = Client::builder();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }
        let client = builder.build()?;
        let base_url = format!("http://{}:{}", config.host, config.port);

        let response = client
            .post(format!("{base_url}/api/v1/collections"))
            .json(&json!({
                "name": config.collection,
                "get_or_create": true,
                "metadata": { "hnsw:space": "cosine" },
            }))
            .send()
            .await?;
        let info: CollectionInfo = check_status(response).await?.json().await?;

        Ok(RemoteVectorIndex {
            client,
            base_url,
            collection_id: info.id,
            collection: config.collection.clone(),
            embedder,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{action}",
            self.base_url, self.collection_id
        )
    }

    async fn post(&self, action: &str, body: &impl Serialize) -> VectorResult<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint(action))
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorIndex for RemoteVectorIndex {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn add_texts(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> VectorResult<Vec<String>> {
        if texts.len() != metadatas.len() {
            return Err(VectorStoreError::LengthMismatch {
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(&texts).await?;
        let ids: Vec<String> = texts
            .iter()
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();

        self.post(
            "add",
            &AddRequest {
                ids: &ids,
                embeddings,
                metadatas: &metadatas,
                documents: &texts,
            },
        )
        .await?;

        tracing::debug!(added = ids.len(), collection = %self.collection, "chunks indexed");
        Ok(ids)
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> VectorResult<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;

        let mut body = json!({
            "query_embeddings": [query_vec],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(clause) = filter.and_then(where_clause) {
            body["where"] = clause;
        }

        let response: QueryResponse = self.post("query", &body).await?.json().await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let mut documents = response
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default()
            .into_iter();
        let mut metadatas = response
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default()
            .into_iter();
        let mut distances = response
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default()
            .into_iter();

        Ok(ids
            .into_iter()
            .map(|id| ScoredChunk {
                id,
                content: documents.next().flatten().unwrap_or_default(),
                metadata: to_metadata(metadatas.next().flatten()),
                distance: distances.next().unwrap_or(f32::INFINITY),
            })
            .collect())
    }

    async fn get(&self) -> VectorResult<Vec<(String, Metadata)>> {
        let response: GetResponse = self
            .post("get", &json!({ "include": ["metadatas"] }))
            .await?
            .json()
            .await?;

        let mut metadatas = response.metadatas.unwrap_or_default().into_iter();
        Ok(response
            .ids
            .into_iter()
            .map(|id| (id, to_metadata(metadatas.next().flatten())))
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> VectorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post("delete", &json!({ "ids": ids })).await?;
        tracing::debug!(deleted = ids.len(), collection = %self.collection, "chunks deleted");
        Ok(())
    }
}
