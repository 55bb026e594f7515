//! Retrieval-augmented chat against an OpenAI-compatible API.
//!
//! Embeds your question, retrieves the most similar stored chunks, and asks
//! the chat model to answer from that context. Needs `OPENAI_API_KEY` and a
//! database populated by an earlier ingestion run:
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --example rag_chat -- "what do my notes say about X?"
//! ```

use std::env;
use std::sync::Arc;

use tracing_subscriber::FmtSubscriber;

use ragstore::chat::{ChatOptions, RagChat};
use ragstore::config::RagConfig;
use ragstore::providers::{OpenAiChatProvider, OpenAiEmbeddingProvider};
use ragstore::store::{Backend, SqliteRagStore};
use ragstore::types::RetrievalError;

#[tokio::main]
async fn main() -> Result<(), RetrievalError> {
    init_tracing();

    let query = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        eprintln!("usage: rag_chat <question>");
        return Ok(());
    }

    let config = RagConfig::from_env()?;
    let store = Arc::new(
        SqliteRagStore::open(&config.database_path, config.embedding_dimension).await?,
    );

    let stored = store.count_embeddings().await?;
    if stored == 0 {
        println!("Knowledge base is empty; answers will not be grounded.");
        println!("Run an ingestion pass first to populate embeddings.");
    } else {
        println!("Knowledge base holds {stored} embeddings.");
    }

    let embedder = Arc::new(OpenAiEmbeddingProvider::from_config(&config)?);
    let generator = Arc::new(OpenAiChatProvider::from_config(&config)?);
    let chat = RagChat::new(store, embedder, generator, ChatOptions::from(&config));

    println!("\nQuestion: {query}");
    let outcome = chat.answer(&query).await?;

    println!(
        "\nAnswer (grounded in {} document(s)):\n{}",
        outcome.context_documents, outcome.answer
    );
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
