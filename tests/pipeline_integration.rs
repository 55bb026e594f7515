//! Integration tests for the ingestion pipeline with deterministic mock
//! embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use ragstore::ingestion::IngestionPipeline;
use ragstore::providers::{EmbeddingProvider, MockEmbeddingProvider};
use ragstore::store::{Backend, NewDocument, SqliteRagStore};
use ragstore::types::RetrievalError;
use serde_json::Value;
use tempfile::TempDir;

const DIM: usize = 8;

async fn store_with_documents(dir: &TempDir, contents: &[&str]) -> Arc<SqliteRagStore> {
    let store = SqliteRagStore::open(dir.path().join("store.sqlite"), DIM)
        .await
        .expect("store opens");
    for (idx, content) in contents.iter().enumerate() {
        store
            .insert_document(NewDocument::new(format!("doc_{idx}.txt"), *content).with_file_type("text"))
            .await
            .unwrap();
    }
    Arc::new(store)
}

/// Embedder that refuses texts containing a marker, for failure-isolation
/// tests.
struct FlakyEmbedder {
    inner: MockEmbeddingProvider,
    fail_marker: &'static str,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        if text.contains(self.fail_marker) {
            return Err(RetrievalError::Provider("synthetic outage".to_string()));
        }
        self.inner.embed(text).await
    }

    fn model(&self) -> &str {
        "flaky-mock"
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[tokio::test]
async fn first_run_processes_everything_second_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = store_with_documents(&dir, &["alpha text", "beta text", "gamma text"]).await;
    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(MockEmbeddingProvider::new(DIM)),
    );

    let first = pipeline.ingest_all().await.unwrap();
    assert_eq!(first.processed, 3);
    assert_eq!(first.skipped, 0);
    assert_eq!(first.errors, 0);
    assert_eq!(store.count_embeddings().await.unwrap(), 3);

    let second = pipeline.ingest_all().await.unwrap();
    assert_eq!(second.processed, 0, "re-run must perform zero writes");
    assert_eq!(second.skipped, 3);
    assert_eq!(second.errors, 0);
    assert_eq!(store.count_embeddings().await.unwrap(), 3);
}

#[tokio::test]
async fn a_failing_document_never_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let store = store_with_documents(
        &dir,
        &["fine one", "BROKEN middle", "fine two"],
    )
    .await;
    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(FlakyEmbedder {
            inner: MockEmbeddingProvider::new(DIM),
            fail_marker: "BROKEN",
        }),
    );

    let report = pipeline.ingest_all().await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors, 1);
    assert_eq!(report.skipped, 0);

    // The documents after the failure were still embedded.
    assert_eq!(store.count_embeddings().await.unwrap(), 2);

    // A later run with a healthy provider picks up only the failed one.
    let retry = IngestionPipeline::new(store.clone(), Arc::new(MockEmbeddingProvider::new(DIM)));
    let report = retry.ingest_all().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn stored_chunks_carry_provenance_metadata() {
    let dir = TempDir::new().unwrap();
    let store = store_with_documents(&dir, &["the only document"]).await;
    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(MockEmbeddingProvider::new(DIM)),
    );

    pipeline.ingest_all().await.unwrap();

    let document = &store.list_documents().await.unwrap()[0];
    let rows = store.embeddings_for_document(document.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].chunk_index, 0, "single-chunk ingestion writes index 0");
    assert_eq!(rows[0].content_chunk, "the only document");

    let metadata = &rows[0].metadata;
    assert_eq!(
        metadata.get("filename").and_then(Value::as_str),
        Some("doc_0.txt")
    );
    assert_eq!(metadata.get("file_type").and_then(Value::as_str), Some("text"));
    assert_eq!(
        metadata.get("content_length").and_then(Value::as_u64),
        Some("the only document".len() as u64)
    );
    assert_eq!(
        metadata.get("embedding_model").and_then(Value::as_str),
        Some("mock-embedding")
    );
}

#[tokio::test]
async fn ingest_skips_documents_with_empty_content() {
    let dir = TempDir::new().unwrap();
    let store = SqliteRagStore::open(dir.path().join("store.sqlite"), DIM)
        .await
        .unwrap();
    let filled = store
        .insert_document(NewDocument::new("real.txt", "content"))
        .await
        .unwrap();
    let empty = store
        .insert_document(NewDocument::new("hollow.txt", ""))
        .await
        .unwrap();
    let store = Arc::new(store);

    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(MockEmbeddingProvider::new(DIM)),
    );
    // Feed the raw records directly so the empty one reaches the pipeline.
    let report = pipeline
        .ingest(&[filled.clone(), empty.clone()])
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.errors, 0);
    assert!(store.exists(filled.id, 0).await.unwrap());
    assert!(!store.exists(empty.id, 0).await.unwrap());
}
