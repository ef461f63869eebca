//! Local Session Store
//!
//! A single JSON document is the source of truth:
//!
//! ```json
//! {
//!   "session_queue": ["<oldest>", "..."],
//!   "session_files": { "<id>": ["a.pdf", "b.pdf"] },
//!   "pending_purges": [ ... ]
//! }
//! ```
//!
//! `pending_purges` is omitted while empty. Every operation re-reads the file
//! under an in-process mutex on the blocking pool, and every mutation replaces the whole document
//! through a temp file + fsync + rename. There is no cross-process locking.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{PurgeIntent, SessionId, SessionStore, StoreError, StoreResult};

/// On-disk layout of the local session document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(default)]
    pub session_queue: Vec<SessionId>,
    #[serde(default)]
    pub session_files: BTreeMap<SessionId, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_purges: Vec<PurgeIntent>,
}

impl SessionDocument {
    /// Load from file. Missing or malformed documents yield an empty one.
    pub fn load(path: &Path) -> Self {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable session document, starting empty");
                return Self::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed session document, starting empty");
                Self::default()
            }
        }
    }

    /// Atomically replace the document at `path`
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = temp_path(path);
        {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, self)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        tracing::debug!(
            path = %path.display(),
            sessions = self.session_queue.len(),
            pending_purges = self.pending_purges.len(),
            "session document written"
        );
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// File-backed session store for single-process deployments
pub struct LocalSessionStore {
    path: PathBuf,
    max_sessions: usize,
    max_files: usize,
    lock: Arc<Mutex<()>>,
}

impl LocalSessionStore {
    /// Open the store at `path`, writing an empty document if none is usable
    pub fn open(
        path: impl AsRef<Path>,
        max_sessions: usize,
        max_files: usize,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = SessionDocument::load(&path);
        doc.save(&path)?;

        Ok(LocalSessionStore {
            path,
            max_sessions,
            max_files,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document as stored on disk
    pub fn snapshot(&self) -> SessionDocument {
        let _guard = self.lock.lock();
        SessionDocument::load(&self.path)
    }

    /// Run `f` against the stored document on the blocking pool
    async fn read<R>(
        &self,
        f: impl FnOnce(&SessionDocument) -> R + Send + 'static,
    ) -> StoreResult<R>
    where
        R: Send + 'static,
    {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock();
            f(&SessionDocument::load(&path))
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))
    }

    /// Read-modify-write cycle on the blocking pool. `f` returns whether the
    /// document changed.
    async fn update<R>(
        &self,
        f: impl FnOnce(&mut SessionDocument) -> (R, bool) + Send + 'static,
    ) -> StoreResult<R>
    where
        R: Send + 'static,
    {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        tokio::task::spawn_blocking(move || -> StoreResult<R> {
            let _guard = lock.lock();
            let mut doc = SessionDocument::load(&path);
            let (result, changed) = f(&mut doc);
            if changed {
                doc.save(&path)?;
            }
            Ok(result)
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }
}

#[async_trait]
impl SessionStore for LocalSessionStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    fn max_files_per_session(&self) -> usize {
        self.max_files
    }

    async fn is_valid(&self, session_id: &str) -> StoreResult<bool> {
        let session_id = session_id.to_string();
        self.read(move |doc| doc.session_files.contains_key(&session_id))
            .await
    }

    async fn create(&self, session_id: &str) -> StoreResult<Option<SessionId>> {
        let max_sessions = self.max_sessions;
        let session_id = session_id.to_string();
        self.update(move |doc| {
            if doc.session_queue.contains(&session_id) {
                let inserted = !doc.session_files.contains_key(&session_id);
                doc.session_files.entry(session_id).or_default();
                return (None, inserted);
            }

            // Drains more than one only if the cap was lowered since the last run.
            let mut evicted = None;
            while !doc.session_queue.is_empty() && doc.session_queue.len() >= max_sessions {
                let oldest = doc.session_queue.remove(0);
                doc.session_files.remove(&oldest);
                doc.pending_purges.push(PurgeIntent::session(oldest.clone()));
                evicted.get_or_insert(oldest);
            }

            doc.session_queue.push(session_id.clone());
            doc.session_files.entry(session_id).or_default();
            (evicted, true)
        })
        .await
    }

    async fn add_file(&self, session_id: &str, file_name: &str) -> StoreResult<bool> {
        let max_files = self.max_files;
        let (session_id, file_name) = (session_id.to_string(), file_name.to_string());
        self.update(move |doc| {
            let Some(files) = doc.session_files.get_mut(&session_id) else {
                return (false, false);
            };
            if files.len() >= max_files {
                return (false, false);
            }
            if files.contains(&file_name) {
                return (true, false);
            }
            files.push(file_name);
            (true, true)
        })
        .await
    }

    async fn remove_file(&self, session_id: &str, file_name: &str) -> StoreResult<()> {
        let (session_id, file_name) = (session_id.to_string(), file_name.to_string());
        self.update(move |doc| match doc.session_files.get_mut(&session_id) {
            Some(files) => {
                let before = files.len();
                files.retain(|f| *f != file_name);
                ((), files.len() != before)
            }
            None => ((), false),
        })
        .await
    }

    async fn list_files(&self, session_id: &str) -> StoreResult<Vec<String>> {
        let session_id = session_id.to_string();
        self.read(move |doc| {
            doc.session_files
                .get(&session_id)
                .cloned()
                .unwrap_or_default()
        })
        .await
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let session_id = session_id.to_string();
        self.update(move |doc| {
            let before = doc.session_queue.len();
            doc.session_queue.retain(|id| *id != session_id);
            let dropped = doc.session_files.remove(&session_id).is_some();
            ((), dropped || doc.session_queue.len() != before)
        })
        .await
    }

    async fn queue(&self) -> StoreResult<Vec<SessionId>> {
        self.read(|doc| doc.session_queue.clone()).await
    }

    async fn record_purge(&self, intent: PurgeIntent) -> StoreResult<()> {
        self.update(move |doc| {
            if doc.pending_purges.iter().any(|p| p.same_target(&intent)) {
                return ((), false);
            }
            doc.pending_purges.push(intent);
            ((), true)
        })
        .await
    }

    async fn pending_purges(&self) -> StoreResult<Vec<PurgeIntent>> {
        self.read(|doc| doc.pending_purges.clone()).await
    }

    async fn ack_purge(&self, intent: &PurgeIntent) -> StoreResult<()> {
        let intent = intent.clone();
        self.update(move |doc| {
            let before = doc.pending_purges.len();
            doc.pending_purges.retain(|p| !p.same_target(&intent));
            ((), doc.pending_purges.len() != before)
        })
        .await
    }
}
