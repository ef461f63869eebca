//! Document Ingestion Pipeline
//!
//! upload bytes → staged file → text → chunks tagged with
//! `{source, session_id, file_name}`.
//!
//! Uploads are staged per session under `<upload_dir>/<session_id>/`, so two
//! sessions uploading the same file name never touch each other's copy.

mod splitter;

pub use splitter::ChunkSplitter;

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::IngestionConfig;
use crate::vector::Chunk;

/// Ingestion errors
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Invalid chunking parameters: {0}")]
    ChunkConfig(#[from] text_splitter::ChunkConfigError),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("{0} is not valid UTF-8 text")]
    NotText(String),

    #[error("{0} contains no extractable text")]
    Empty(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Reduce an uploaded name to a single safe path component
pub fn sanitize_file_name(name: &str) -> IngestResult<String> {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return Err(IngestError::InvalidFileName(name.to_string()));
    }
    Ok(last.to_string())
}

/// Pulls plain text out of a stored file
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> IngestResult<String>;
}

/// PDF text via `lopdf`, pages separated by blank lines
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> IngestResult<String> {
        let doc = lopdf::Document::load(path)?;
        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::warn!(path = %path.display(), page = page_number, error = %e, "skipping unreadable page");
                }
            }
        }
        Ok(pages.join("\n\n"))
    }
}

/// Text and markdown files are used verbatim
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> IngestResult<String> {
        let bytes = fs::read(path)?;
        String::from_utf8(bytes).map_err(|_| IngestError::NotText(path.display().to_string()))
    }
}

/// Extractor chosen by file extension
pub fn extractor_for(path: &Path) -> &'static dyn TextExtractor {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        &PdfExtractor
    } else {
        &PlainTextExtractor
    }
}

/// Result of [`DocumentProcessor::process_new_files`]
#[derive(Debug, Default)]
pub struct ProcessedFiles {
    /// Chunks of each file that was read successfully
    pub documents: Vec<(String, Vec<Chunk>)>,
    /// Files that could not be read or held no text
    pub failures: Vec<(String, IngestError)>,
}

impl ProcessedFiles {
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|(_, chunks)| chunks.len()).sum()
    }
}

/// Stages uploads and turns them into chunks
pub struct DocumentProcessor {
    upload_dir: PathBuf,
    splitter: ChunkSplitter,
}

impl DocumentProcessor {
    pub fn new(upload_dir: impl Into<PathBuf>, chunk_size: usize, chunk_overlap: usize) -> IngestResult<Self> {
        Ok(DocumentProcessor {
            upload_dir: upload_dir.into(),
            splitter: ChunkSplitter::new(chunk_size, chunk_overlap)?,
        })
    }

    pub fn from_config(config: &IngestionConfig) -> IngestResult<Self> {
        Self::new(
            config.upload_dir.clone(),
            config.chunk_size,
            config.chunk_overlap,
        )
    }

    fn staged_path(&self, session_id: &str, file_name: &str) -> PathBuf {
        self.upload_dir.join(session_id).join(file_name)
    }

    /// Write an upload to the session's staging directory; returns the sanitized name
    pub fn save_upload(&self, session_id: &str, name: &str, bytes: &[u8]) -> IngestResult<String> {
        let file_name = sanitize_file_name(name)?;
        let session_dir = sanitize_file_name(session_id)?;
        let path = self.staged_path(&session_dir, &file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        tracing::debug!(session_id, file_name = %file_name, bytes = bytes.len(), "upload staged");
        Ok(file_name)
    }

    /// Extract and chunk one staged file. A file without any text is an error.
    pub fn process_file(&self, file_name: &str, session_id: &str) -> IngestResult<Vec<Chunk>> {
        let path = self.staged_path(session_id, file_name);
        let text = extractor_for(&path).extract(&path)?;
        let chunks: Vec<Chunk> = self
            .splitter
            .split(&text)
            .into_iter()
            .map(|content| Chunk::new(content, file_name, session_id, file_name))
            .collect();
        if chunks.is_empty() {
            return Err(IngestError::Empty(file_name.to_string()));
        }
        Ok(chunks)
    }

    /// Chunk every file in `file_names`, keeping per-file outcomes
    pub fn process_new_files(&self, file_names: &[String], session_id: &str) -> ProcessedFiles {
        let mut processed = ProcessedFiles::default();
        for file_name in file_names {
            match self.process_file(file_name, session_id) {
                Ok(chunks) => {
                    tracing::info!(session_id, file_name = %file_name, chunks = chunks.len(), "document processed");
                    processed.documents.push((file_name.clone(), chunks));
                }
                Err(e) => {
                    tracing::warn!(session_id, file_name = %file_name, error = %e, "failed to process document");
                    processed.failures.push((file_name.clone(), e));
                }
            }
        }
        processed
    }

    /// Remove staged copies; missing files are ignored
    pub fn delete_processed_files(&self, file_names: &[String], session_id: &str) {
        for file_name in file_names {
            let path = self.staged_path(session_id, file_name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not delete staged upload");
                }
            }
        }
        // Only succeeds once the directory is empty
        let _ = fs::remove_dir(self.upload_dir.join(session_id));
    }
}
