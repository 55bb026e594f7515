//! Sequential ingestion: documents in, embedding rows out.

use std::sync::Arc;

use serde_json::Value;

use crate::providers::EmbeddingProvider;
use crate::store::{Backend, DocumentRecord};
use crate::types::{Metadata, RetrievalError};

/// Aggregate outcome of one ingestion pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents embedded and stored during this run.
    pub processed: usize,
    /// Documents skipped because an embedding already existed.
    pub skipped: usize,
    /// Documents that failed (provider or storage) and were passed over.
    pub errors: usize,
}

/// Drives the embedding store from an external embedding provider.
///
/// One document at a time, one provider call in flight: a document whose
/// chunk-0 embedding already exists is skipped, a failed provider call or
/// upsert is counted and passed over, and every successful upsert commits
/// before the next document starts. Re-running over an unchanged document
/// set therefore performs zero writes, and an interrupted run resumes
/// cleanly from the `exists` check.
pub struct IngestionPipeline {
    store: Arc<dyn Backend>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn Backend>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Ingests every document currently registered in the store (non-empty
    /// content, id order).
    pub async fn ingest_all(&self) -> Result<IngestReport, RetrievalError> {
        let documents = self.store.list_documents().await?;
        self.ingest(&documents).await
    }

    /// Ingests the given documents in order and reports aggregate counts.
    ///
    /// Only connectivity-level failures (listing, `exists` probes) abort the
    /// run; per-document provider and storage failures are counted in
    /// [`IngestReport::errors`] and never stop the pass.
    pub async fn ingest(
        &self,
        documents: &[DocumentRecord],
    ) -> Result<IngestReport, RetrievalError> {
        let mut report = IngestReport::default();

        for document in documents {
            if document.content.is_empty() {
                continue;
            }

            if self.store.exists(document.id, 0).await? {
                tracing::debug!(document_id = document.id, "embedding exists, skipping");
                report.skipped += 1;
                continue;
            }

            let embedding = match self.embedder.embed(&document.content).await {
                Ok(embedding) => embedding,
                Err(err) => {
                    tracing::warn!(
                        document_id = document.id,
                        filename = %document.filename,
                        error = %err,
                        "embedding request failed"
                    );
                    report.errors += 1;
                    continue;
                }
            };

            let metadata = provenance_metadata(document, self.embedder.model());
            match self
                .store
                .upsert_embedding(document.id, 0, &document.content, &embedding, metadata)
                .await
            {
                Ok(_) => {
                    tracing::info!(
                        document_id = document.id,
                        filename = %document.filename,
                        "embedding stored"
                    );
                    report.processed += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        document_id = document.id,
                        filename = %document.filename,
                        error = %err,
                        "embedding upsert failed"
                    );
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "ingestion pass complete"
        );
        Ok(report)
    }
}

/// Metadata recorded with each chunk: where it came from and which model
/// embedded it.
fn provenance_metadata(document: &DocumentRecord, embedding_model: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("filename".into(), Value::String(document.filename.clone()));
    if let Some(file_type) = &document.file_type {
        metadata.insert("file_type".into(), Value::String(file_type.clone()));
    }
    metadata.insert("file_size".into(), Value::from(document.file_size));
    metadata.insert(
        "processed_at".into(),
        Value::String(document.processed_at.to_rfc3339()),
    );
    metadata.insert(
        "content_length".into(),
        Value::from(document.content.len() as u64),
    );
    metadata.insert(
        "embedding_model".into(),
        Value::String(embedding_model.to_string()),
    );
    metadata
}
