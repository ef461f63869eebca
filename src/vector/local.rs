//! Embedded Vector Index
//!
//! Records (id, content, metadata, embedding) live in memory and are
//! persisted to `<persist_dir>/index.json` after every mutation. Unfiltered
//! queries go through the HNSW graph; filtered queries scan the matching
//! records exactly, since a per-session subset is small and the graph cannot
//! restrict its candidates.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::hnsw_index::{HnswIndex, Slot};
use super::ops::cosine_distance;
use super::{
    matches_filter, Metadata, MetadataFilter, ScoredChunk, VectorIndex, VectorResult,
    VectorStoreError,
};
use crate::config::HnswConfig;
use crate::llm::Embedder;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    content: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    records: Vec<StoredRecord>,
}

#[derive(Default)]
struct IndexState {
    records: BTreeMap<Slot, StoredRecord>,
    slots_by_id: HashMap<String, Slot>,
    next_slot: Slot,
}

impl IndexState {
    fn push(&mut self, record: StoredRecord) -> Slot {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots_by_id.insert(record.id.clone(), slot);
        self.records.insert(slot, record);
        slot
    }

    fn to_file(&self) -> IndexFile {
        IndexFile {
            records: self.records.values().cloned().collect(),
        }
    }
}

/// In-process vector index persisted on local disk
///
/// Mutations are serialized by `writer`; each one writes the next record set
/// to disk first and only then swaps it into memory and the graph, so the
/// in-memory view never runs ahead of `index.json`.
pub struct LocalVectorIndex {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    state: RwLock<IndexState>,
    hnsw: HnswIndex,
    writer: tokio::sync::Mutex<()>,
}

impl LocalVectorIndex {
    /// Open (or create) the index stored under `persist_dir`
    pub fn open(
        persist_dir: impl AsRef<Path>,
        hnsw_config: HnswConfig,
        embedder: Arc<dyn Embedder>,
    ) -> VectorResult<Self> {
        let dir = persist_dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(INDEX_FILE);

        let file = load_index_file(&path);
        let mut state = IndexState::default();
        for record in file.records {
            state.push(record);
        }

        let hnsw = HnswIndex::new(hnsw_config);
        let vectors: Vec<(Slot, Vec<f32>)> = state
            .records
            .iter()
            .map(|(slot, r)| (*slot, r.embedding.clone()))
            .collect();
        hnsw.rebuild(&vectors)?;

        Ok(LocalVectorIndex {
            path,
            embedder,
            state: RwLock::new(state),
            hnsw,
            writer: tokio::sync::Mutex::new(()),
        })
    }

    /// Number of stored chunks
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn persist(&self, file: IndexFile) -> VectorResult<()> {
        let path = self.path.clone();
        let chunks = file.records.len();
        tokio::task::spawn_blocking(move || write_index_file(&path, &file))
            .await
            .map_err(io::Error::other)??;
        tracing::debug!(path = %self.path.display(), chunks, "vector index written");
        Ok(())
    }
}

fn write_index_file(path: &Path, file: &IndexFile) -> VectorResult<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let out = File::create(&tmp)?;
        serde_json::to_writer(&out, file)?;
        out.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load_index_file(path: &Path) -> IndexFile {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return IndexFile::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable vector index, starting empty");
            return IndexFile::default();
        }
    };
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "malformed vector index, starting empty");
        IndexFile::default()
    })
}

fn embeddings_of(records: &[StoredRecord]) -> Vec<Vec<f32>> {
    records.iter().map(|r| r.embedding.clone()).collect()
}

fn to_scored(record: &StoredRecord, distance: f32) -> ScoredChunk {
    ScoredChunk {
        id: record.id.clone(),
        content: record.content.clone(),
        metadata: record.metadata.clone(),
        distance,
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    fn backend_name(&self) -> &'static str {
        "local"
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

        let staged: Vec<StoredRecord> = texts
            .into_iter()
            .zip(metadatas)
            .zip(embeddings)
            .map(|((content, metadata), embedding)| StoredRecord {
                id: uuid::Uuid::new_v4().to_string(),
                content,
                metadata,
                embedding,
            })
            .collect();
        let ids: Vec<String> = staged.iter().map(|r| r.id.clone()).collect();

        let _writer = self.writer.lock().await;
        self.hnsw.check_batch(&embeddings_of(&staged))?;
        let mut next = self.state.read().to_file();
        next.records.extend(staged.iter().cloned());
        self.persist(next).await?;

        let mut state = self.state.write();
        let mut batch = Vec::with_capacity(staged.len());
        for record in staged {
            batch.push((state.next_slot, record.embedding.clone()));
            state.push(record);
        }
        self.hnsw.insert_batch(&batch)?;

        tracing::debug!(added = ids.len(), total = state.records.len(), "chunks indexed");
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

        let state = self.state.read();
        let dimension = self.hnsw.dimension();
        if dimension != 0 && dimension != query_vec.len() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                got: query_vec.len(),
            });
        }

        match filter.filter(|f| !f.is_empty()) {
            None => Ok(self
                .hnsw
                .search(&query_vec, k)
                .into_iter()
                .filter_map(|(slot, distance)| {
                    state.records.get(&slot).map(|r| to_scored(r, distance))
                })
                .collect()),
            Some(filter) => {
                let mut hits: Vec<ScoredChunk> = state
                    .records
                    .values()
                    .filter(|r| matches_filter(&r.metadata, filter))
                    .map(|r| to_scored(r, cosine_distance(&query_vec, &r.embedding)))
                    .collect();
                hits.sort_by(|a, b| {
                    a.distance
                        .partial_cmp(&b.distance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                hits.truncate(k);
                Ok(hits)
            }
        }
    }

    async fn get(&self) -> VectorResult<Vec<(String, Metadata)>> {
        Ok(self
            .state
            .read()
            .records
            .values()
            .map(|r| (r.id.clone(), r.metadata.clone()))
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> VectorResult<()> {
        let _writer = self.writer.lock().await;
        let doomed: HashSet<Slot> = {
            let state = self.state.read();
            ids.iter()
                .filter_map(|id| state.slots_by_id.get(id).copied())
                .collect()
        };
        if doomed.is_empty() {
            return Ok(());
        }

        let next = {
            let state = self.state.read();
            IndexFile {
                records: state
                    .records
                    .iter()
                    .filter(|(slot, _)| !doomed.contains(slot))
                    .map(|(_, r)| r.clone())
                    .collect(),
            }
        };
        self.persist(next).await?;

        let mut state = self.state.write();
        for slot in &doomed {
            if let Some(record) = state.records.remove(slot) {
                state.slots_by_id.remove(&record.id);
            }
        }
        self.hnsw.remove(&doomed);
        tracing::debug!(deleted = doomed.len(), total = state.records.len(), "chunks deleted");
        Ok(())
    }

    async fn count(&self) -> VectorResult<usize> {
        Ok(self.len())
    }
}
