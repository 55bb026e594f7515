//! End-to-end walkthrough: register documents, ingest embeddings, run a
//! similarity query, and print the assembled context.
//!
//! Runs fully offline with the deterministic mock embedder, so it needs no
//! API key or network:
//!
//! ```bash
//! cargo run --example ingest_and_query
//! ```
//!
//! Set `RAGSTORE_DB` to choose the database path.

use std::sync::Arc;

use tracing_subscriber::FmtSubscriber;

use ragstore::config::RagConfig;
use ragstore::context::ContextAssembler;
use ragstore::ingestion::IngestionPipeline;
use ragstore::providers::{EmbeddingProvider, MockEmbeddingProvider};
use ragstore::store::{Backend, NewDocument, SqliteRagStore};
use ragstore::types::RetrievalError;

const DIM: usize = 16;

#[tokio::main]
async fn main() -> Result<(), RetrievalError> {
    init_tracing();

    let config = RagConfig::from_env()?;
    let db_path = config.database_path.clone();
    let store = Arc::new(SqliteRagStore::open(&db_path, DIM).await?);
    let embedder = Arc::new(MockEmbeddingProvider::new(DIM));

    if store.count_documents().await? == 0 {
        println!("Registering sample documents...");
        for (filename, content) in sample_documents() {
            store
                .insert_document(NewDocument::new(filename, content).with_file_type("text"))
                .await?;
        }
    }

    let pipeline = IngestionPipeline::new(store.clone(), embedder.clone());
    let report = pipeline.ingest_all().await?;

    println!("\nIngestion summary");
    println!("  processed : {}", report.processed);
    println!("  skipped   : {}", report.skipped);
    println!("  errors    : {}", report.errors);
    println!("  total embeddings: {}", store.count_embeddings().await?);

    // The mock embedder maps identical text to identical vectors, so
    // querying with a stored document's text retrieves that document first.
    let query = "Vector embeddings allow finding semantically similar content.";
    println!("\nQuery: {query}");

    let query_vector = embedder.embed(query).await?;
    let results = store.search_similar(&query_vector, 0.0, 5).await?;

    println!("Found {} result(s)", results.len());
    for (i, (record, similarity)) in results.iter().enumerate() {
        println!(
            "  {}. similarity {:.3}  {}",
            i + 1,
            similarity,
            record.label()
        );
    }

    let context = ContextAssembler::new(2000).assemble(&results);
    if context.is_empty() {
        println!("\nNo context qualified.");
    } else {
        println!("\nAssembled context\n-----------------\n{context}");
    }

    println!("Database: {}", db_path.display());
    Ok(())
}

fn sample_documents() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "embeddings.txt",
            "Vector embeddings allow finding semantically similar content.",
        ),
        (
            "chunks.txt",
            "Documents are split into chunks, and each chunk is stored with its embedding.",
        ),
        (
            "retrieval.txt",
            "At query time the most similar chunks are packed into a bounded context.",
        ),
    ]
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
