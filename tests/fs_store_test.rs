//! Filesystem archive store: create-if-absent semantics on a real directory

use autorag_crawler::archive_store::{ArchiveStore, FsArchiveStore, PutOutcome, StoreError};
use autorag_crawler::fingerprint::{Fingerprint, fingerprint};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

fn key(path: &str) -> Fingerprint {
    fingerprint(&Url::parse(&format!("https://confidence.sh{path}")).unwrap())
}

#[tokio::test]
async fn put_then_read_back() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsArchiveStore::new(temp_dir.path(), false);
    let key = key("/docs");

    assert!(!store.head(&key).await.unwrap());
    assert!(store.get(&key).await.unwrap().is_none());

    let outcome = store
        .put_if_absent(&key, b"<html>docs</html>", "text/html")
        .await
        .unwrap();
    assert_eq!(outcome, PutOutcome::Created);
    assert!(store.head(&key).await.unwrap());

    let record = store.get(&key).await.unwrap().expect("record");
    assert_eq!(record.fingerprint, key);
    assert_eq!(record.content, b"<html>docs</html>");
    assert!(record.content_type.starts_with("text/html"));
    assert!(temp_dir.path().join(key.as_str()).is_file());
}

#[tokio::test]
async fn second_put_never_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsArchiveStore::new(temp_dir.path(), false);
    let key = key("/pricing");

    store.put_if_absent(&key, b"first", "text/html").await.unwrap();
    let outcome = store.put_if_absent(&key, b"second", "text/html").await.unwrap();

    assert_eq!(outcome, PutOutcome::AlreadyExists);
    let record = store.get(&key).await.unwrap().expect("record");
    assert_eq!(record.content, b"first");

    // no temp files are left behind by the losing write
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name != key.as_str() && name != ".gitignore")
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writers_create_exactly_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FsArchiveStore::new(temp_dir.path(), false));
    let key = key("/race");

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move {
                store
                    .put_if_absent(&key, format!("writer {i}").as_bytes(), "text/html")
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for writer in writers {
        if writer.await.unwrap().unwrap() == PutOutcome::Created {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    let record = store.get(&key).await.unwrap().expect("record");
    assert!(String::from_utf8(record.content).unwrap().starts_with("writer "));
}

#[tokio::test]
async fn compressed_records_keep_their_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsArchiveStore::new(temp_dir.path(), true);
    let key = key("/docs");
    let html = "<html><body>compressed</body></html>".repeat(50);

    store
        .put_if_absent(&key, html.as_bytes(), "text/html; charset=utf-8")
        .await
        .unwrap();

    let path = store.path_for(&key).unwrap();
    assert!(path.to_string_lossy().ends_with(".html.gz"));
    assert!(std::fs::metadata(&path).unwrap().len() < html.len() as u64);

    let record = store.get(&key).await.unwrap().expect("record");
    assert_eq!(record.content, html.as_bytes());
    assert_eq!(record.content_type, "text/html; charset=utf-8");
}

#[tokio::test]
async fn corrupt_compressed_record_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsArchiveStore::new(temp_dir.path(), true);
    let key = key("/broken");
    std::fs::write(store.path_for(&key).unwrap(), b"not gzip").unwrap();

    assert!(store.head(&key).await.unwrap());
    let result = store.get(&key).await;
    assert!(matches!(result, Err(StoreError::Corrupt { .. })), "{result:?}");
}

#[tokio::test]
async fn archive_root_is_created_with_gitignore() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("archive");
    let store = FsArchiveStore::new(&root, false);
    assert_eq!(store.root(), root.as_path());

    store
        .put_if_absent(&key("/"), b"<html></html>", "text/html")
        .await
        .unwrap();

    let gitignore = std::fs::read_to_string(root.join(".gitignore")).unwrap();
    assert_eq!(gitignore, "*\n!.gitignore\n");
}

#[tokio::test]
async fn keys_cannot_escape_the_root() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsArchiveStore::new(temp_dir.path().join("archive"), false);

    for raw in ["\"../escape.html\"", "\"a/b.html\"", "\".hidden\"", "\"\""] {
        let key: Fingerprint = serde_json::from_str(raw).unwrap();
        let result = store.put_if_absent(&key, b"x", "text/html").await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))), "{raw}: {result:?}");
        assert!(matches!(store.head(&key).await, Err(StoreError::InvalidKey(_))));
    }
    assert!(!temp_dir.path().join("escape.html").exists());
}
