//! Local session store tests: FIFO eviction, file caps, persistence.

use docchat::session::{LocalSessionStore, PurgeIntent, SessionDocument, SessionStore};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn open(temp: &TempDir, max_sessions: usize, max_files: usize) -> LocalSessionStore {
    LocalSessionStore::open(temp.path().join("sessions.json"), max_sessions, max_files).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

// Scenario Tests
#[tokio::test]
async fn test_scenario_create_beyond_cap_evicts_oldest() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, 2, 2);

    assert_eq!(store.create("A").await.unwrap(), None);
    assert_eq!(store.create("B").await.unwrap(), None);
    assert_eq!(store.create("C").await.unwrap(), Some("A".to_string()));

    assert!(!store.is_valid("A").await.unwrap());
    assert!(store.is_valid("B").await.unwrap());
    assert!(store.is_valid("C").await.unwrap());
    assert_eq!(store.queue().await.unwrap(), vec!["B", "C"]);

    let pending = store.pending_purges().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].same_target(&PurgeIntent::session("A")));
}

#[tokio::test]
async fn test_scenario_file_cap() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, 2, 2);
    store.create("s").await.unwrap();

    assert!(store.add_file("s", "x").await.unwrap());
    assert!(store.add_file("s", "y").await.unwrap());
    assert!(!store.add_file("s", "z").await.unwrap());
    assert_eq!(store.list_files("s").await.unwrap(), vec!["x", "y"]);
    assert!(!store.can_add_file("s").await.unwrap());
}

#[tokio::test]
async fn test_scenario_remove_frees_a_slot() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, 2, 2);
    store.create("s").await.unwrap();
    store.add_file("s", "x").await.unwrap();
    store.add_file("s", "y").await.unwrap();

    store.remove_file("s", "x").await.unwrap();
    assert!(store.can_add_file("s").await.unwrap());
    assert!(store.add_file("s", "z").await.unwrap());
    assert_eq!(store.list_files("s").await.unwrap(), vec!["y", "z"]);
}

#[tokio::test]
async fn test_add_file_to_unknown_session_is_rejected() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, 2, 2);
    assert!(!store.add_file("ghost", "x").await.unwrap());
    assert!(store.list_files("ghost").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_missing_file_is_noop() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, 2, 2);
    store.create("s").await.unwrap();
    store.add_file("s", "x").await.unwrap();

    store.remove_file("s", "nope").await.unwrap();
    store.remove_file("ghost", "x").await.unwrap();
    assert_eq!(store.list_files("s").await.unwrap(), vec!["x"]);
}

#[tokio::test]
async fn test_delete_session_leaves_others() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, 3, 2);
    store.create("a").await.unwrap();
    store.create("b").await.unwrap();
    store.add_file("a", "x").await.unwrap();

    store.delete_session("a").await.unwrap();
    assert!(!store.is_valid("a").await.unwrap());
    assert_eq!(store.queue().await.unwrap(), vec!["b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_respect_file_cap() {
    let temp = TempDir::new().unwrap();
    let store = std::sync::Arc::new(open(&temp, 2, 3));
    store.create("s").await.unwrap();

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.add_file("s", &format!("f{i}.pdf")).await.unwrap() })
        })
        .collect();
    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 3);
    assert_eq!(store.list_files("s").await.unwrap().len(), 3);
}

// Persistence Tests
#[tokio::test]
async fn test_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let store = open(&temp, 3, 3);
        store.create("a").await.unwrap();
        store.create("b").await.unwrap();
        store.add_file("b", "doc.pdf").await.unwrap();
    }

    let store = open(&temp, 3, 3);
    assert_eq!(store.queue().await.unwrap(), vec!["a", "b"]);
    assert_eq!(store.list_files("b").await.unwrap(), vec!["doc.pdf"]);
}

#[tokio::test]
async fn test_document_layout_on_disk() {
    let temp = TempDir::new().unwrap();
    let store = open(&temp, 3, 3);
    store.create("a").await.unwrap();
    store.add_file("a", "doc.pdf").await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["session_queue"], serde_json::json!(["a"]));
    assert_eq!(raw["session_files"]["a"], serde_json::json!(["doc.pdf"]));
    assert!(raw.get("pending_purges").is_none());
}

#[tokio::test]
async fn test_malformed_document_resets_to_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sessions.json");
    fs::write(&path, "{ not json").unwrap();

    let store = LocalSessionStore::open(&path, 3, 3).unwrap();
    assert!(store.queue().await.unwrap().is_empty());
    assert_eq!(store.snapshot(), SessionDocument::default());
}

#[tokio::test]
async fn test_document_without_purge_field_loads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sessions.json");
    fs::write(
        &path,
        r#"{"session_queue": ["old"], "session_files": {"old": ["a.pdf"]}}"#,
    )
    .unwrap();

    let store = LocalSessionStore::open(&path, 3, 3).unwrap();
    assert!(store.is_valid("old").await.unwrap());
    assert!(store.pending_purges().await.unwrap().is_empty());
}

// Property Tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_queue_never_exceeds_cap_and_evicts_oldest(cap in 1usize..5, creates in 1usize..15) {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, cap, 3);
        let rt = runtime();

        let mut expected: Vec<String> = Vec::new();
        for i in 0..creates {
            let id = format!("s{i}");
            let evicted = rt.block_on(store.create(&id)).unwrap();
            if expected.len() >= cap {
                prop_assert_eq!(evicted, Some(expected.remove(0)));
            } else {
                prop_assert_eq!(evicted, None);
            }
            expected.push(id);

            let queue = rt.block_on(store.queue()).unwrap();
            prop_assert!(queue.len() <= cap);
            prop_assert_eq!(&queue, &expected);
        }
    }

    #[test]
    fn prop_file_list_never_exceeds_cap(
        cap in 1usize..5,
        names in proptest::collection::vec("[a-e]\\.pdf", 0..12),
    ) {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 2, cap);
        let rt = runtime();
        rt.block_on(store.create("s")).unwrap();

        for name in &names {
            rt.block_on(store.add_file("s", name)).unwrap();
            let files = rt.block_on(store.list_files("s")).unwrap();
            prop_assert!(files.len() <= cap);
        }
    }

    #[test]
    fn prop_add_file_is_idempotent(name in "[a-z]{1,8}\\.txt") {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, 2, 3);
        let rt = runtime();
        rt.block_on(store.create("s")).unwrap();

        prop_assert!(rt.block_on(store.add_file("s", &name)).unwrap());
        prop_assert!(rt.block_on(store.add_file("s", &name)).unwrap());
        let files = rt.block_on(store.list_files("s")).unwrap();
        prop_assert_eq!(files, vec![name]);
    }

    #[test]
    fn prop_document_roundtrips_through_disk(
        sessions in proptest::collection::btree_map(
            "[a-z0-9]{1,8}",
            proptest::collection::vec("[a-z]{1,6}\\.pdf", 0..4),
            0..5,
        ),
    ) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        let doc = SessionDocument {
            session_queue: sessions.keys().cloned().collect(),
            session_files: sessions,
            pending_purges: Vec::new(),
        };

        doc.save(&path).unwrap();
        prop_assert_eq!(SessionDocument::load(&path), doc);
    }
}
