//! Session lifecycle tests: eviction cascades, file removal, and purge
//! reconciliation after vector store failures.

use async_trait::async_trait;
use docchat::config::HnswConfig;
use docchat::llm::{ChatMessage, CompletionModel, HashingEmbedder, ModelResult};
use docchat::session::{LocalSessionStore, SessionLifecycleManager, SessionStore};
use docchat::vector::{
    Chunk, LocalVectorIndex, Metadata, MetadataFilter, ScoredChunk, VectorIndex, VectorResult,
    VectorStoreError,
};
use docchat::{ChatBot, ChatService, DocChatError, DocumentCoordinator, DocumentProcessor, Upload};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Embedded index that can be switched into failing every call
struct FlakyIndex {
    inner: LocalVectorIndex,
    down: AtomicBool,
}

impl FlakyIndex {
    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> VectorResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(VectorStoreError::Remote {
                status: 503,
                message: "index unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn add_texts(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> VectorResult<Vec<String>> {
        self.check()?;
        self.inner.add_texts(texts, metadatas).await
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> VectorResult<Vec<ScoredChunk>> {
        self.check()?;
        self.inner.similarity_search(query, k, filter).await
    }

    async fn get(&self) -> VectorResult<Vec<(String, Metadata)>> {
        self.check()?;
        self.inner.get().await
    }

    async fn delete(&self, ids: &[String]) -> VectorResult<()> {
        self.check()?;
        self.inner.delete(ids).await
    }
}

struct Fixture {
    temp: TempDir,
    index: Arc<FlakyIndex>,
    manager: Arc<SessionLifecycleManager>,
}

impl Fixture {
    fn index_dir(&self) -> std::path::PathBuf {
        self.temp.path().join("index")
    }

    /// A directory where the index writes its temp file makes every write fail
    fn block_index_writes(&self) {
        fs::create_dir(self.index_dir().join("index.json.tmp")).unwrap();
    }

    fn unblock_index_writes(&self) {
        fs::remove_dir(self.index_dir().join("index.json.tmp")).unwrap();
    }
}

fn open_index(dir: &Path) -> LocalVectorIndex {
    LocalVectorIndex::open(dir, HnswConfig::default(), Arc::new(HashingEmbedder::new(64))).unwrap()
}

fn fixture(max_sessions: usize, max_files: usize) -> Fixture {
    let temp = TempDir::new().unwrap();
    let store =
        LocalSessionStore::open(temp.path().join("sessions.json"), max_sessions, max_files)
            .unwrap();
    let index = Arc::new(FlakyIndex {
        inner: open_index(&temp.path().join("index")),
        down: AtomicBool::new(false),
    });
    let coordinator = Arc::new(DocumentCoordinator::new(index.clone()));
    let manager = Arc::new(SessionLifecycleManager::new(Arc::new(store), coordinator));
    Fixture {
        temp,
        index,
        manager,
    }
}

struct QuietModel;

#[async_trait]
impl CompletionModel for QuietModel {
    fn model_name(&self) -> &str {
        "quiet"
    }

    async fn run(&self, _system: &str, _messages: &[ChatMessage]) -> ModelResult<String> {
        Ok("ok".to_string())
    }
}

fn service(fx: &Fixture) -> ChatService {
    let processor = DocumentProcessor::new(fx.temp.path().join("uploads"), 800, 80).unwrap();
    let chatbot = ChatBot::new(fx.index.clone(), Arc::new(QuietModel), 3);
    ChatService::new(Arc::clone(&fx.manager), Arc::new(processor), chatbot)
}

async fn index_file(manager: &SessionLifecycleManager, session_id: &str, file_name: &str) {
    assert!(manager
        .add_file_to_session(session_id, file_name)
        .await
        .unwrap());
    let ids = manager
        .coordinator()
        .add_chunks(vec![
            Chunk::new(format!("{file_name} part one"), file_name, session_id, file_name),
            Chunk::new(format!("{file_name} part two"), file_name, session_id, file_name),
        ])
        .await;
    assert_eq!(ids.len(), 2);
}

async fn chunks_for(manager: &SessionLifecycleManager, session_id: &str) -> usize {
    manager
        .coordinator()
        .index()
        .get()
        .await
        .unwrap()
        .iter()
        .filter(|(_, m)| m.get("session_id").map(String::as_str) == Some(session_id))
        .count()
}

#[tokio::test]
async fn test_eviction_removes_oldest_session_chunks() {
    let fx = fixture(2, 2);
    let a = fx.manager.initialize_session(None).await.unwrap();
    let b = fx.manager.initialize_session(None).await.unwrap();
    assert_eq!(a.evicted, None);
    assert_eq!(b.evicted, None);
    index_file(&fx.manager, &a.session_id, "a.pdf").await;
    index_file(&fx.manager, &b.session_id, "b.pdf").await;

    let c = fx.manager.initialize_session(None).await.unwrap();
    assert_eq!(c.evicted.as_deref(), Some(a.session_id.as_str()));
    assert!(!fx.manager.store().is_valid(&a.session_id).await.unwrap());
    assert_eq!(chunks_for(&fx.manager, &a.session_id).await, 0);
    assert_eq!(chunks_for(&fx.manager, &b.session_id).await, 2);
    assert!(fx.manager.store().pending_purges().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_file_only_touches_that_file() {
    let fx = fixture(2, 2);
    let s = fx.manager.initialize_session(None).await.unwrap().session_id;
    index_file(&fx.manager, &s, "x.pdf").await;
    index_file(&fx.manager, &s, "y.pdf").await;

    fx.manager.remove_file_from_session(&s, "x.pdf").await.unwrap();
    assert_eq!(fx.manager.get_session_files(&s).await.unwrap(), vec!["y.pdf"]);
    assert_eq!(
        fx.manager
            .coordinator()
            .get_processed_files_for_session(&s)
            .await
            .into_iter()
            .collect::<Vec<_>>(),
        vec!["y.pdf"]
    );
    assert!(fx.manager.can_add_file(&s).await.unwrap());
}

#[tokio::test]
async fn test_failed_eviction_cascade_is_reconciled() {
    let fx = fixture(1, 2);
    let a = fx.manager.initialize_session(None).await.unwrap().session_id;
    index_file(&fx.manager, &a, "a.pdf").await;

    fx.index.set_down(true);
    let b = fx.manager.initialize_session(None).await.unwrap();
    assert_eq!(b.evicted.as_deref(), Some(a.as_str()));

    // store side is done, index side is owed
    assert!(!fx.manager.store().is_valid(&a).await.unwrap());
    assert_eq!(fx.manager.store().pending_purges().await.unwrap().len(), 1);

    // still down: nothing settles
    assert_eq!(fx.manager.reconcile_pending_purges().await.unwrap(), 0);
    assert_eq!(fx.manager.store().pending_purges().await.unwrap().len(), 1);

    fx.index.set_down(false);
    assert_eq!(chunks_for(&fx.manager, &a).await, 2);
    assert_eq!(fx.manager.reconcile_pending_purges().await.unwrap(), 1);
    assert_eq!(chunks_for(&fx.manager, &a).await, 0);
    assert!(fx.manager.store().pending_purges().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_file_removal_is_reconciled() {
    let fx = fixture(2, 2);
    let s = fx.manager.initialize_session(None).await.unwrap().session_id;
    index_file(&fx.manager, &s, "x.pdf").await;

    fx.index.set_down(true);
    fx.manager.remove_file_from_session(&s, "x.pdf").await.unwrap();
    assert!(fx.manager.get_session_files(&s).await.unwrap().is_empty());

    fx.index.set_down(false);
    assert_eq!(fx.manager.reconcile_pending_purges().await.unwrap(), 1);
    assert_eq!(chunks_for(&fx.manager, &s).await, 0);
}

#[tokio::test]
async fn test_pending_purges_survive_restart() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sessions.json");
    {
        let store = LocalSessionStore::open(&path, 1, 2).unwrap();
        store.create("old").await.unwrap();
        assert_eq!(store.create("new").await.unwrap().as_deref(), Some("old"));
    }

    let store = LocalSessionStore::open(&path, 1, 2).unwrap();
    let pending = store.pending_purges().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].session_id, "old");
    assert!(pending[0].file_name.is_none());
}

#[tokio::test]
async fn test_unwritable_index_keeps_purge_pending_until_written() {
    let fx = fixture(1, 2);
    let a = fx.manager.initialize_session(None).await.unwrap().session_id;
    index_file(&fx.manager, &a, "a.pdf").await;

    fx.block_index_writes();
    let b = fx.manager.initialize_session(None).await.unwrap();
    assert_eq!(b.evicted.as_deref(), Some(a.as_str()));
    assert_eq!(fx.manager.store().pending_purges().await.unwrap().len(), 1);

    // memory still agrees with disk, so the retry has something to delete
    assert_eq!(chunks_for(&fx.manager, &a).await, 2);
    assert_eq!(fx.manager.reconcile_pending_purges().await.unwrap(), 0);
    assert_eq!(fx.manager.store().pending_purges().await.unwrap().len(), 1);

    fx.unblock_index_writes();
    assert_eq!(fx.manager.reconcile_pending_purges().await.unwrap(), 1);
    assert!(fx.manager.store().pending_purges().await.unwrap().is_empty());

    let reopened = open_index(&fx.index_dir());
    let left = reopened
        .get()
        .await
        .unwrap()
        .into_iter()
        .filter(|(_, m)| m.get("session_id") == Some(&a))
        .count();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn test_lowered_cap_purges_every_drained_session() {
    let temp = TempDir::new().unwrap();
    let sessions = temp.path().join("sessions.json");
    let index: Arc<dyn VectorIndex> = Arc::new(open_index(&temp.path().join("index")));
    let coordinator = Arc::new(DocumentCoordinator::new(index));

    let wide = SessionLifecycleManager::new(
        Arc::new(LocalSessionStore::open(&sessions, 3, 2).unwrap()),
        Arc::clone(&coordinator),
    );
    let mut old = Vec::new();
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        let id = wide.initialize_session(None).await.unwrap().session_id;
        index_file(&wide, &id, name).await;
        old.push(id);
    }

    let narrow = SessionLifecycleManager::new(
        Arc::new(LocalSessionStore::open(&sessions, 1, 2).unwrap()),
        coordinator,
    );
    let init = narrow.initialize_session(None).await.unwrap();
    assert_eq!(init.evicted.as_deref(), Some(old[0].as_str()));

    for id in &old {
        assert_eq!(chunks_for(&narrow, id).await, 0);
    }
    assert!(narrow.store().pending_purges().await.unwrap().is_empty());
    assert_eq!(narrow.store().queue().await.unwrap(), vec![init.session_id]);
}

#[tokio::test]
async fn test_upload_while_index_down_is_rolled_back() {
    let fx = fixture(2, 2);
    let service = service(&fx);
    let s = service.initialize_session(None).await.unwrap().session_id;

    fx.index.set_down(true);
    let report = service
        .upload_files(&s, vec![Upload::new("notes.md", "The launch is on Friday.")])
        .await
        .unwrap();
    assert!(report.accepted.is_empty());
    assert!(report.processed.is_empty());
    assert_eq!(report.rejected, vec!["notes.md"]);
    assert_eq!(report.messages.len(), 1);
    assert!(report.messages[0].starts_with("Cannot process notes.md:"));

    // the file is not registered, so chat refuses instead of answering blind
    assert!(fx.manager.get_session_files(&s).await.unwrap().is_empty());
    assert!(matches!(
        service.chat(&s, "When is the launch?", &[]).await.unwrap_err(),
        DocChatError::NoDocuments
    ));

    fx.index.set_down(false);
    fx.manager.reconcile_pending_purges().await.unwrap();
    let report = service
        .upload_files(&s, vec![Upload::new("notes.md", "The launch is on Friday.")])
        .await
        .unwrap();
    assert_eq!(report.processed, vec!["notes.md"]);
    assert_eq!(chunks_for(&fx.manager, &s).await, 1);
}

#[tokio::test]
async fn test_upload_while_index_unwritable_is_rolled_back() {
    let fx = fixture(2, 2);
    let service = service(&fx);
    let s = service.initialize_session(None).await.unwrap().session_id;

    fx.block_index_writes();
    let report = service
        .upload_files(&s, vec![Upload::new("notes.md", "The launch is on Friday.")])
        .await
        .unwrap();
    assert_eq!(report.rejected, vec!["notes.md"]);
    assert!(fx.manager.get_session_files(&s).await.unwrap().is_empty());
    assert_eq!(chunks_for(&fx.manager, &s).await, 0);

    fx.unblock_index_writes();
    assert_eq!(open_index(&fx.index_dir()).len(), 0);
}
