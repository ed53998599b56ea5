//! End-to-end tests for the document store: ingest, search, persistence,
//! and corruption recovery against a real directory on disk.

use std::collections::HashMap;

use serde_json::json;
use tempfile::TempDir;

use vectorstore::StoreError;
use vectorstore::chunking::{ChunkingOptions, assemble_chunks, detect_boundaries};
use vectorstore::extract::DocumentKind;
use vectorstore::store::VectorStore;

fn category(value: &str) -> HashMap<String, serde_json::Value> {
    [("category".to_string(), json!(value))].into()
}

async fn seed_three(store: &VectorStore) -> Vec<String> {
    let mut ids = Vec::new();
    ids.push(
        store
            .add_text(
                "User authentication and login functionality",
                category("auth"),
            )
            .await
            .expect("add_text"),
    );
    ids.push(
        store
            .add_text("Database connection and data management", category("database"))
            .await
            .expect("add_text"),
    );
    ids.push(
        store
            .add_text("API endpoint security and validation", category("security"))
            .await
            .expect("add_text"),
    );
    ids
}

#[tokio::test]
async fn smoke_ingest_and_search() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("s");

    let store = VectorStore::create(&path).await.expect("create");
    seed_three(&store).await;

    let results = store
        .search_text("login and security", 2)
        .await
        .expect("search");

    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
    assert!(results[0].score > 0.5);
}

#[tokio::test]
async fn persistence_across_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("s");

    let mut expected_ids = {
        let store = VectorStore::create(&path).await.expect("create");
        seed_three(&store).await
    };
    expected_ids.sort();

    assert!(path.join("vector_index.bin").exists());

    let reopened = VectorStore::open(&path).await.expect("open");
    assert_eq!(reopened.all_ids(), expected_ids);
}

#[tokio::test]
async fn corrupt_index_recovers_on_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("s");

    {
        let store = VectorStore::create(&path).await.expect("create");
        store
            .add_text("Test document one", HashMap::new())
            .await
            .expect("add_text");
        store
            .add_text("Test document two", HashMap::new())
            .await
            .expect("add_text");
    }

    std::fs::write(path.join("vector_index.bin"), b"corrupted data").expect("corrupt index");

    let store = VectorStore::open(&path).await.expect("open recovers");
    let results = store.search_text("Test", 10).await.expect("search");
    assert_eq!(results.len(), 2);

    // The rebuilt index has been rewritten and now loads cleanly.
    let bytes = std::fs::read(path.join("vector_index.bin")).expect("index file");
    assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
    let reopened = VectorStore::open(&path).await.expect("clean reopen");
    assert_eq!(reopened.record_count(), 2);
}

#[tokio::test]
async fn partial_record_is_tolerated() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("s");

    let mut expected_ids = {
        let store = VectorStore::create(&path).await.expect("create");
        vec![
            store
                .add_text("First intact document", HashMap::new())
                .await
                .expect("add_text"),
            store
                .add_text("Second intact document", HashMap::new())
                .await
                .expect("add_text"),
        ]
    };
    expected_ids.sort();

    // Force a rebuild so the scan encounters the truncated record.
    std::fs::remove_file(path.join("vector_index.bin")).expect("drop index");
    let documents = path.join("documents");
    std::fs::create_dir_all(&documents).expect("create documents dir");
    std::fs::write(
        documents.join("partial.json"),
        br#"{"id":"partial","content":"...","metadata":{"#,
    )
    .expect("write partial record");

    let store = VectorStore::open(&path).await.expect("open tolerates");
    let ids = store.all_ids();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids, expected_ids);
    assert!(!ids.contains(&"partial".to_string()));
}

#[tokio::test]
async fn chunking_is_deterministic_and_bounded() {
    let text = "This is a test sentence. ".repeat(50);
    let options = ChunkingOptions {
        max_chunk_size: 150,
        min_chunk_size: 50,
        overlap_size: 25,
        ..ChunkingOptions::default()
    };

    let boundaries = detect_boundaries(&text, DocumentKind::Text);
    let chunks = assemble_chunks(&text, &boundaries, &options).expect("chunks");

    assert!(!chunks.is_empty());
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        let len = chunk.content.chars().count();
        assert!((50..=150).contains(&len), "chunk {i} has length {len}");
    }

    let again = assemble_chunks(&text, &boundaries, &options).expect("chunks");
    assert_eq!(chunks, again);
}

#[tokio::test]
async fn lifecycle_gates() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("t");

    {
        let store = VectorStore::create(&path).await.expect("create");
        store
            .add_text("occupying content", HashMap::new())
            .await
            .expect("add_text");
    }

    // Create on a populated valid store fails.
    assert!(matches!(
        VectorStore::create(&path).await,
        Err(StoreError::AlreadyExists(_))
    ));

    // Open of a missing directory fails.
    assert!(matches!(
        VectorStore::open(dir.path().join("nonexistent")).await,
        Err(StoreError::NotFound(_))
    ));

    // Delete of a missing directory reports false.
    assert!(
        !VectorStore::delete(dir.path().join("nonexistent"))
            .await
            .expect("delete")
    );

    // Delete of the real store succeeds exactly once.
    assert!(VectorStore::delete(&path).await.expect("delete"));
    assert!(!VectorStore::delete(&path).await.expect("delete again"));
}

#[tokio::test]
async fn document_ingest_end_to_end() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("s");
    let store = VectorStore::create(&path).await.expect("create");

    let doc = dir.path().join("manual.md");
    let body = "# Operations Manual\n\n".to_string()
        + &"The service restarts automatically on failure. ".repeat(30)
        + "\n\n## Maintenance\n\n"
        + &"Rotate the logs weekly to keep disk usage flat. ".repeat(30);
    std::fs::write(&doc, &body).expect("write doc");

    let ids = store.add_document(&doc, None).await.expect("ingest");
    assert!(ids.len() > 1);

    // Every chunk shares the document metadata and counts up chunk_index.
    for (i, id) in ids.iter().enumerate() {
        let record = store.get(id).await.expect("get").expect("present");
        assert_eq!(record.metadata.get("chunk_index"), Some(&json!(i)));
        assert_eq!(
            record.metadata.get("total_chunks"),
            Some(&json!(ids.len()))
        );
        assert_eq!(
            record.metadata.get("source_title"),
            Some(&json!("Operations Manual"))
        );
    }

    let results = store
        .search_text("log rotation maintenance", 3)
        .await
        .expect("search");
    assert!(!results.is_empty());
    let top = &results[0].record;
    assert!(top.content.contains("Rotate the logs"));
}
