//! Markdown-aware chunking.

use text_splitter::{Characters, ChunkConfig, MarkdownSplitter};

use super::IngestResult;

/// Splits extracted text into overlapping chunks of at most `chunk_size` characters
pub struct ChunkSplitter {
    splitter: MarkdownSplitter<Characters>,
}

impl ChunkSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> IngestResult<Self> {
        let config = ChunkConfig::new(chunk_size).with_overlap(chunk_overlap)?;
        Ok(ChunkSplitter {
            splitter: MarkdownSplitter::new(config),
        })
    }

    /// Non-blank chunks in document order
    pub fn split(&self, text: &str) -> Vec<String> {
        self.splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}
