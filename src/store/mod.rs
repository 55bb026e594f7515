//! Storage backends for documents and their chunk embeddings.
//!
//! This module provides a unified [`Backend`] trait that abstracts over
//! storage implementations, so the ingestion pipeline and chat layer can work
//! against any supported backend without being tied to a specific database.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │  Backend Trait  │
//!                     │  (async CRUD +  │
//!                     │   similarity)   │
//!                     └────────┬────────┘
//!                              │
//!                    ┌─────────┴─────────┐
//!                    ▼                   ▼
//!             ┌─────────────┐     ┌─────────────┐
//!             │   SQLite    │     │  (future)   │
//!             │ sqlite-vec  │     │  pgvector   │
//!             └─────────────┘     └─────────────┘
//! ```
//!
//! The key invariant every backend upholds: `(document_id, chunk_index)` is
//! unique, and a second write for the same pair replaces the prior row in
//! full (content, vector, metadata, timestamp) instead of duplicating it.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Metadata, RetrievalError};

pub use sqlite::SqliteRagStore;

/// A source document registered with the store.
///
/// Content is immutable once stored; there is no partial-update path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Storage-assigned identifier.
    pub id: i64,
    pub filename: String,
    /// Full extracted text of the source.
    pub content: String,
    pub file_size: i64,
    pub file_type: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// Input for registering a new document.
///
/// Size and timestamp are derived at the store boundary.
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub filename: String,
    pub content: String,
    pub file_type: Option<String>,
}

impl NewDocument {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            file_type: None,
        }
    }

    #[must_use]
    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }
}

/// A stored chunk embedding row, as returned by read paths.
///
/// The vector itself is write-only through the public API: reads return the
/// text, metadata, and provenance, not the stored floats. Similarity search
/// scores rows inside the storage engine and reports the score alongside
/// the record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Storage-assigned identifier; ties ranking break on it ascending.
    pub id: i64,
    /// Document this chunk belongs to (referential, not owning).
    pub document_id: i64,
    /// Zero-based index of this chunk within the document.
    pub chunk_index: usize,
    /// The exact substring the stored vector represents.
    pub content_chunk: String,
    /// Open string-keyed metadata; reads are lenient (bad data → empty map).
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    /// Human-readable label for context headers: the originating filename
    /// when metadata carries one, otherwise the document identifier.
    pub fn label(&self) -> String {
        self.metadata
            .get("filename")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Document {}", self.document_id))
    }
}

/// Unified trait for embedding storage backends.
///
/// Writes are transactional at single-record granularity: an upsert either
/// commits text, vector, and metadata together or leaves the prior state of
/// that key (including "absent") untouched.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Vector length this store was opened with. All writes and queries must
    /// match it exactly.
    fn dimension(&self) -> usize;

    /// Register a source document and return the stored record.
    async fn insert_document(
        &self,
        document: NewDocument,
    ) -> Result<DocumentRecord, RetrievalError>;

    /// Fetch one document by id.
    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, RetrievalError>;

    /// All documents with non-empty content, ordered by id ascending.
    ///
    /// This is the source set an ingestion pass iterates.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, RetrievalError>;

    /// `true` iff an embedding row exists for `(document_id, chunk_index)`.
    ///
    /// Used to avoid redundant external embedding calls on re-runs.
    async fn exists(&self, document_id: i64, chunk_index: usize) -> Result<bool, RetrievalError>;

    /// Insert or overwrite the embedding row for `(document_id, chunk_index)`.
    ///
    /// The vector length must equal [`Backend::dimension`]; the chunk text may
    /// be empty. Returns the row id. Exactly one row exists for the key after
    /// a successful call; the timestamp is refreshed to call time.
    async fn upsert_embedding(
        &self,
        document_id: i64,
        chunk_index: usize,
        content_chunk: &str,
        embedding: &[f32],
        metadata: Metadata,
    ) -> Result<i64, RetrievalError>;

    /// All embedding rows for a document, ordered by chunk index ascending.
    /// An empty vec is not an error.
    async fn embeddings_for_document(
        &self,
        document_id: i64,
    ) -> Result<Vec<EmbeddingRecord>, RetrievalError>;

    /// Rank stored chunks against a query vector by cosine similarity.
    ///
    /// Similarity is `1 − cosine distance`. Only rows with
    /// `similarity >= similarity_threshold` qualify; results are ordered by
    /// similarity descending, ties broken by row id ascending, truncated to
    /// `max_results`. An empty result is valid. A query vector whose length
    /// differs from the configured dimension is rejected with
    /// [`RetrievalError::DimensionMismatch`].
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        similarity_threshold: f32,
        max_results: usize,
    ) -> Result<Vec<(EmbeddingRecord, f32)>, RetrievalError>;

    /// Total embedding rows in the store.
    async fn count_embeddings(&self) -> Result<usize, RetrievalError>;

    /// Total registered documents.
    async fn count_documents(&self) -> Result<usize, RetrievalError>;

    /// Delete every embedding row. Administrative and all-or-nothing; the
    /// normal write path never deletes single records. Returns the number of
    /// rows removed.
    async fn clear_embeddings(&self) -> Result<usize, RetrievalError>;

    /// Switch the store to a new vector dimension.
    ///
    /// Clears all embedding rows and rebuilds the vector index; mixed
    /// dimensions cannot coexist, so this is the only migration path.
    async fn reset_dimension(&self, new_dimension: usize) -> Result<(), RetrievalError>;
}
