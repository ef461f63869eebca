//! Document/Vector Consistency Coordinator
//!
//! Keeps the vector index in step with the session store: removes the chunks
//! of evicted sessions and removed files, and reports which files a session
//! already has indexed so uploads are not embedded twice.
//!
//! The plain methods never fail; index errors are logged at `warn` and
//! treated as "nothing found". The `try_*` forms return the error so the
//! lifecycle manager can leave a purge intent pending.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::vector::{
    Chunk, Metadata, MetadataFilter, VectorIndex, VectorResult, FILE_NAME_KEY, SESSION_ID_KEY,
};

pub struct DocumentCoordinator {
    index: Arc<dyn VectorIndex>,
}

impl DocumentCoordinator {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        DocumentCoordinator { index }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Ids of every stored chunk whose metadata matches `filter`
    async fn matching_ids(&self, filter: &MetadataFilter) -> VectorResult<Vec<String>> {
        Ok(self
            .index
            .get()
            .await?
            .into_iter()
            .filter(|(_, metadata)| crate::vector::matches_filter(metadata, filter))
            .map(|(id, _)| id)
            .collect())
    }

    async fn delete_matching(&self, filter: &MetadataFilter) -> VectorResult<usize> {
        let ids = self.matching_ids(filter).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.index.delete(&ids).await?;
        Ok(ids.len())
    }

    /// Delete every chunk tagged with `session_id`; returns how many went
    pub async fn try_remove_documents_by_session(&self, session_id: &str) -> VectorResult<usize> {
        let filter = MetadataFilter::from([(SESSION_ID_KEY.to_string(), session_id.to_string())]);
        let deleted = self.delete_matching(&filter).await?;
        if deleted > 0 {
            tracing::info!(session_id, deleted, "removed session documents");
        }
        Ok(deleted)
    }

    pub async fn remove_documents_by_session(&self, session_id: &str) {
        if let Err(e) = self.try_remove_documents_by_session(session_id).await {
            tracing::warn!(session_id, error = %e, "failed to remove session documents");
        }
    }

    /// Delete the chunks of one file within a session
    pub async fn try_remove_documents_by_session_and_file(
        &self,
        session_id: &str,
        file_name: &str,
    ) -> VectorResult<usize> {
        let filter = MetadataFilter::from([
            (SESSION_ID_KEY.to_string(), session_id.to_string()),
            (FILE_NAME_KEY.to_string(), file_name.to_string()),
        ]);
        let deleted = self.delete_matching(&filter).await?;
        if deleted > 0 {
            tracing::info!(session_id, file_name, deleted, "removed file documents");
        }
        Ok(deleted)
    }

    pub async fn remove_documents_by_session_and_file(&self, session_id: &str, file_name: &str) {
        if let Err(e) = self
            .try_remove_documents_by_session_and_file(session_id, file_name)
            .await
        {
            tracing::warn!(session_id, file_name, error = %e, "failed to remove file documents");
        }
    }

    /// Distinct file names already indexed for `session_id`
    pub async fn get_processed_files_for_session(&self, session_id: &str) -> BTreeSet<String> {
        match self.index.get().await {
            Ok(records) => records
                .into_iter()
                .filter(|(_, metadata)| {
                    metadata.get(SESSION_ID_KEY).map(String::as_str) == Some(session_id)
                })
                .filter_map(|(_, mut metadata)| metadata.remove(FILE_NAME_KEY))
                .collect(),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "could not scan processed files");
                BTreeSet::new()
            }
        }
    }

    /// Forward chunks (content + full metadata) to the index
    pub async fn try_add_chunks(&self, chunks: Vec<Chunk>) -> VectorResult<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let (texts, metadatas): (Vec<String>, Vec<Metadata>) =
            chunks.into_iter().map(|c| (c.content, c.metadata)).unzip();
        self.index.add_texts(texts, metadatas).await
    }

    pub async fn add_chunks(&self, chunks: Vec<Chunk>) -> Vec<String> {
        let count = chunks.len();
        match self.try_add_chunks(chunks).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(chunks = count, error = %e, "failed to index chunks");
                Vec::new()
            }
        }
    }
}
