use peerdex_content::{StubContentService, SELF_KEY};
use peerdex_discovery::PeerIndexFetcher;
use peerdex_publish::{PublishError, Publisher, HTML_FILE_NAME};
use peerdex_storage::{MemoryStorage, Storage};
use peerdex_types::{IndexOutcome, OutcomeError, PeerIndexDocument, PublishEvent, INDEX_FILE_NAME};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn site(root: &TempDir, name: &str) -> PathBuf {
    let dir = root.path().join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), format!("<h1>{name}</h1>")).unwrap();
    dir.canonicalize().unwrap()
}

async fn drain(mut rx: mpsc::Receiver<PublishEvent>) -> Vec<PublishEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn nothing_tracked_makes_no_service_calls() {
    let stub = StubContentService::new();
    let publisher = Arc::new(Publisher::new(
        Arc::new(stub.clone()),
        Arc::new(MemoryStorage::new()),
    ));

    let (rx, handle) = publisher.spawn(8);
    let events = drain(rx).await;
    let summary = handle.await.unwrap().unwrap();

    assert!(summary.nothing_to_publish());
    assert!(stub.calls().is_empty());
    assert!(matches!(events.first(), Some(PublishEvent::Started { total: 0 })));
    assert!(matches!(events.last(), Some(PublishEvent::Completed(_))));
}

#[tokio::test]
async fn missing_directory_is_reported_and_left_out_of_the_index() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");
    let docs = site(&root, "docs");
    let gone = root.path().join("gone");

    let stub = StubContentService::new()
        .with_key("blog", "k51blog")
        .with_key("docs", "k51docs")
        .with_key("gone", "k51gone")
        .with_content_id(&blog, "bafyblog")
        .with_content_id(&docs, "bafydocs");
    let storage = MemoryStorage::new();
    storage.upsert_published(&blog, "blog").unwrap();
    storage.upsert_published(&docs, "docs").unwrap();
    storage.upsert_published(&gone, "gone").unwrap();

    let publisher = Arc::new(Publisher::new(Arc::new(stub.clone()), Arc::new(storage)));
    let (rx, handle) = publisher.spawn(8);
    let events = drain(rx).await;
    let summary = handle.await.unwrap().unwrap();

    assert_eq!((summary.total, summary.published, summary.failed), (3, 2, 1));

    let outcomes: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            PublishEvent::Outcome(outcome) => Some(outcome.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes.len(), 3);
    let failed = outcomes.iter().find(|o| o.key == "gone").unwrap();
    assert_eq!(failed.error, Some(OutcomeError::DirectoryNotFound(gone)));
    assert_eq!(failed.pointer_name, "k51gone");

    match summary.index {
        Some(IndexOutcome::Published { ref node_id, keys, .. }) => {
            assert_eq!(node_id, "12D3KooWlocal");
            assert_eq!(keys, 2);
        }
        ref other => panic!("unexpected index outcome {other:?}"),
    }

    let index_dir = stub.added().pop().unwrap();
    let document = PeerIndexDocument::parse(&index_dir.files[INDEX_FILE_NAME]).unwrap();
    assert_eq!(document.len(), 2);
    assert_eq!(document.ipns["blog"], "k51blog");
    assert_eq!(document.ipns["docs"], "k51docs");
    assert!(index_dir.files.contains_key(HTML_FILE_NAME));

    let self_publish = stub.published().pop().unwrap();
    assert_eq!(self_publish.key, None);
    assert_eq!(self_publish.content_id, index_dir.content_id);
    assert_eq!(self_publish.ttl.as_deref(), Some("1m"));
}

#[tokio::test]
async fn published_index_is_readable_by_a_scanning_peer() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");

    let local = StubContentService::new()
        .with_key("blog", "k51blog")
        .with_content_id(&blog, "bafyblog");
    let storage = MemoryStorage::new();
    storage.upsert_published(&blog, "blog").unwrap();

    let (tx, rx) = mpsc::channel(8);
    Publisher::new(Arc::new(local.clone()), Arc::new(storage))
        .publish_all(tx)
        .await
        .unwrap();
    drop(rx);

    let served = local.added().pop().unwrap().files[INDEX_FILE_NAME].clone();
    let remote = StubContentService::new()
        .with_index("12D3KooWlocal", std::str::from_utf8(&served).unwrap())
        .with_resolution(
            "k51blog",
            peerdex_content::Canned::Value("bafyblog".to_string()),
        );

    let result = PeerIndexFetcher::new(Arc::new(remote))
        .fetch("12D3KooWlocal", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].display_name, "blog");
    assert_eq!(result.entries[0].content_id.as_deref(), Some("bafyblog"));
}

#[tokio::test]
async fn unknown_naming_key_is_an_outcome_not_an_error() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");

    let stub = StubContentService::new();
    let storage = MemoryStorage::new();
    storage.upsert_published(&blog, "blog").unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let summary = Publisher::new(Arc::new(stub.clone()), Arc::new(storage))
        .publish_all(tx)
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.index.is_none());
    let mut saw_outcome = false;
    while let Some(event) = rx.recv().await {
        if let PublishEvent::Outcome(outcome) = event {
            assert_eq!(outcome.error, Some(OutcomeError::NamingKeyNotFound));
            assert_eq!(outcome.pointer_name, "");
            saw_outcome = true;
        }
    }
    assert!(saw_outcome);
    assert!(stub.added().is_empty());
}

#[tokio::test]
async fn all_failures_keep_the_previous_index() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");
    let docs = site(&root, "docs");

    let stub = StubContentService::new()
        .with_key("blog", "k51blog")
        .with_key("docs", "k51docs")
        .failing_add(&blog)
        .failing_publish("docs");
    let storage = MemoryStorage::new();
    storage.upsert_published(&blog, "blog").unwrap();
    storage.upsert_published(&docs, "docs").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let summary = Publisher::new(Arc::new(stub.clone()), Arc::new(storage))
        .publish_all(tx)
        .await
        .unwrap();

    assert_eq!((summary.published, summary.failed), (0, 2));
    assert!(summary.index.is_none());
    assert!(stub
        .calls()
        .iter()
        .all(|call| !call.starts_with(&format!("name publish {SELF_KEY}"))));
}

#[tokio::test]
async fn scratch_directory_is_removed_after_publishing() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");

    let stub = StubContentService::new().with_key("blog", "k51blog");
    let storage = MemoryStorage::new();
    storage.upsert_published(&blog, "blog").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    Publisher::new(Arc::new(stub.clone()), Arc::new(storage))
        .publish_all(tx)
        .await
        .unwrap();

    let scratch = stub.added().pop().unwrap().path;
    assert_ne!(scratch, blog);
    assert!(!scratch.exists());
}

#[tokio::test]
async fn add_directory_creates_key_and_tracks_path() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");

    let stub = StubContentService::new();
    let storage = Arc::new(MemoryStorage::new());
    let publisher = Publisher::new(Arc::new(stub.clone()), storage.clone());

    let outcome = publisher.add_directory(&blog, None).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.key, "blog");
    assert_eq!(outcome.pointer_name, "k51blog");
    assert!(stub.calls().contains(&"key gen blog".to_string()));

    let tracked = storage.get_published(&blog).unwrap().unwrap();
    assert_eq!(tracked.key, "blog");

    // Adding again reuses the key and refreshes the row.
    let again = publisher.add_directory(&blog, Some("blog")).await.unwrap();
    assert!(again.is_success());
    assert_eq!(
        stub.calls().iter().filter(|c| c.starts_with("key gen")).count(),
        1
    );
    assert_eq!(storage.list_published().unwrap().len(), 1);
}

#[tokio::test]
async fn add_directory_rejects_bad_input() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");
    let publisher = Publisher::new(
        Arc::new(StubContentService::new()),
        Arc::new(MemoryStorage::new()),
    );

    let missing = publisher
        .add_directory(Path::new("/definitely/not/here"), None)
        .await
        .unwrap_err();
    assert!(matches!(missing, PublishError::NotADirectory(_)));

    let reserved = publisher
        .add_directory(&blog, Some(SELF_KEY))
        .await
        .unwrap_err();
    assert!(matches!(reserved, PublishError::ReservedKey(_)));
}

#[tokio::test]
async fn remove_stops_tracking() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");
    let storage = Arc::new(MemoryStorage::new());
    storage.upsert_published(&blog, "blog").unwrap();
    let publisher = Publisher::new(Arc::new(StubContentService::new()), storage.clone());

    assert!(publisher.remove(&blog).await.unwrap());
    assert!(!publisher.remove(&blog).await.unwrap());
    assert!(storage.list_published().unwrap().is_empty());

    // Rows for directories that no longer exist can still be removed.
    let gone = root.path().join("gone");
    storage.upsert_published(&gone, "gone").unwrap();
    assert!(publisher.remove(&gone).await.unwrap());
}

#[tokio::test]
async fn unreadable_keys_still_complete_the_stream() {
    let root = TempDir::new().unwrap();
    let blog = site(&root, "blog");
    let stub = StubContentService::new().failing_key_list();
    let storage = MemoryStorage::new();
    storage.upsert_published(&blog, "blog").unwrap();

    let publisher = Arc::new(Publisher::new(Arc::new(stub.clone()), Arc::new(storage)));
    let (rx, handle) = publisher.spawn(8);
    let events = drain(rx).await;

    assert!(matches!(
        handle.await.unwrap(),
        Err(PublishError::Service(_))
    ));
    assert!(matches!(events.first(), Some(PublishEvent::Started { total: 1 })));
    match events.last() {
        Some(PublishEvent::Completed(summary)) => {
            assert_eq!((summary.published, summary.failed), (0, 0));
            assert!(summary.index.is_none());
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(stub.added().is_empty());
}
