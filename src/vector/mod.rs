//! Vector Store Gateway
//!
//! One logical collection of chunks, backed by either:
//! - [`LocalVectorIndex`]: records persisted as JSON under `persist_dir`,
//!   searched through an in-memory HNSW graph (development)
//! - [`RemoteVectorIndex`]: a Chroma-compatible HTTP server (production)
//!
//! Every chunk carries string metadata; the keys this crate relies on are
//! [`SOURCE_KEY`], [`SESSION_ID_KEY`] and [`FILE_NAME_KEY`].

mod error;
pub mod hnsw_index;
mod local;
pub mod ops;
mod remote;

pub use error::{VectorResult, VectorStoreError};
pub use local::LocalVectorIndex;
pub use remote::RemoteVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{DeploymentMode, VectorStoreConfig};
use crate::llm::Embedder;

pub const SOURCE_KEY: &str = "source";
pub const SESSION_ID_KEY: &str = "session_id";
pub const FILE_NAME_KEY: &str = "file_name";

/// Chunk metadata
pub type Metadata = BTreeMap<String, String>;

/// Equality constraints that must all hold
pub type MetadataFilter = BTreeMap<String, String>;

/// Does `metadata` satisfy every constraint in `filter`?
pub fn matches_filter(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}

/// Filter on a single session
pub fn session_filter(session_id: &str) -> MetadataFilter {
    MetadataFilter::from([(SESSION_ID_KEY.to_string(), session_id.to_string())])
}

/// A piece of a document ready to be embedded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: Metadata,
}

impl Chunk {
    /// Chunk tagged with its session and file provenance
    pub fn new(
        content: impl Into<String>,
        source: impl Into<String>,
        session_id: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let metadata = Metadata::from([
            (SOURCE_KEY.to_string(), source.into()),
            (SESSION_ID_KEY.to_string(), session_id.into()),
            (FILE_NAME_KEY.to_string(), file_name.into()),
        ]);
        Chunk {
            content: content.into(),
            metadata,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get(SESSION_ID_KEY).map(String::as_str)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(FILE_NAME_KEY).map(String::as_str)
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// Cosine distance to the query (lower is closer)
    pub distance: f32,
}

/// Operations every vector index backend supports
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Embed and store `texts`; returns the assigned ids in input order
    async fn add_texts(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> VectorResult<Vec<String>>;

    /// The `k` closest chunks whose metadata satisfies `filter`
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> VectorResult<Vec<ScoredChunk>>;

    /// Every stored id with its metadata
    async fn get(&self) -> VectorResult<Vec<(String, Metadata)>>;

    /// Delete by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> VectorResult<()>;

    async fn count(&self) -> VectorResult<usize> {
        Ok(self.get().await?.len())
    }
}

/// Open the vector index matching the deployment mode
pub async fn open_vector_index(
    mode: DeploymentMode,
    config: &VectorStoreConfig,
    embedder: Arc<dyn Embedder>,
) -> VectorResult<Arc<dyn VectorIndex>> {
    match mode {
        DeploymentMode::Development => {
            let index = LocalVectorIndex::open(&config.persist_dir, config.hnsw, embedder)?;
            tracing::info!(
                path = %config.persist_dir.display(),
                chunks = index.len(),
                "using embedded vector index"
            );
            Ok(Arc::new(index))
        }
        DeploymentMode::Production => {
            let index = RemoteVectorIndex::connect(config, embedder).await?;
            tracing::info!(
                host = %config.host,
                port = config.port,
                collection = %config.collection,
                "using remote vector index"
            );
            Ok(Arc::new(index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_metadata_tags() {
        let chunk = Chunk::new("text", "data/a.md", "s1", "a.pdf");
        assert_eq!(chunk.session_id(), Some("s1"));
        assert_eq!(chunk.file_name(), Some("a.pdf"));
        assert_eq!(chunk.metadata[SOURCE_KEY], "data/a.md");
    }

    #[test]
    fn test_matches_filter() {
        let chunk = Chunk::new("text", "src", "s1", "a.pdf");
        assert!(matches_filter(&chunk.metadata, &session_filter("s1")));
        assert!(!matches_filter(&chunk.metadata, &session_filter("s2")));
        assert!(matches_filter(&chunk.metadata, &MetadataFilter::new()));

        let mut both = session_filter("s1");
        both.insert(FILE_NAME_KEY.to_string(), "b.pdf".to_string());
        assert!(!matches_filter(&chunk.metadata, &both));
    }
}
