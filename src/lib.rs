//! Embedding retrieval engine: a SQLite-backed embedding store with
//! idempotent upsert, cosine similarity search, and budget-bounded context
//! assembly for retrieval-augmented generation.
//!
//! ```text
//! Documents ──► ingestion::IngestionPipeline ──► store::SqliteRagStore
//!                        │                            (documents, embeddings,
//!                        └─► providers::EmbeddingProvider      sqlite-vec index)
//!
//! Query text ──► providers::EmbeddingProvider ──► query vector
//!                                                      │
//!                        Backend::search_similar ◄─────┘
//!                                  │
//!                                  ▼ ranked (record, similarity)
//!                        context::ContextAssembler
//!                                  │
//!                                  ▼ bounded context
//!                        chat::RagChat ──► providers::ChatProvider
//! ```
//!
//! Retrieval semantics in one place: similarity is `1 − cosine distance`,
//! results rank by similarity descending with ties broken by record id,
//! `(document_id, chunk_index)` is unique with upsert-on-conflict, and the
//! assembled context is always a rank-order prefix of the result list that
//! never exceeds its character budget.

pub mod chat;
pub mod config;
pub mod context;
pub mod ingestion;
pub mod providers;
pub mod store;
pub mod types;

pub use chat::{ChatOptions, ChatOutcome, RagChat};
pub use config::RagConfig;
pub use context::ContextAssembler;
pub use ingestion::{IngestReport, IngestionPipeline};
pub use providers::{
    ChatMessage, ChatProvider, ChatRole, EmbeddingProvider, MockEmbeddingProvider,
    OpenAiChatProvider, OpenAiEmbeddingProvider,
};
pub use store::{Backend, DocumentRecord, EmbeddingRecord, NewDocument, SqliteRagStore};
pub use types::{Metadata, RetrievalError};
