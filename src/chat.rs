//! Retrieval-augmented chat: query → embed → search → assemble → generate.

use std::sync::Arc;

use crate::config::{
    DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_CONTEXT_DOCS, DEFAULT_SIMILARITY_THRESHOLD, RagConfig,
};
use crate::context::ContextAssembler;
use crate::providers::{ChatMessage, ChatProvider, EmbeddingProvider};
use crate::store::Backend;
use crate::types::RetrievalError;

const SYSTEM_INSTRUCTION: &str = "You are an assistant with access to a knowledge base. \
Use the provided context documents to answer questions accurately. If the context does not \
contain enough information to answer fully, say so clearly, and cite the documents you rely on.";

/// Query-time knobs for a retrieval-augmented answer.
#[derive(Clone, Copy, Debug)]
pub struct ChatOptions {
    /// Minimum similarity for a chunk to qualify as context, in `[0, 1]`.
    pub similarity_threshold: f32,
    /// Maximum number of chunks retrieved.
    pub max_context_docs: usize,
    /// Character budget for the assembled context.
    pub max_context_chars: usize,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_context_docs: DEFAULT_MAX_CONTEXT_DOCS,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl From<&RagConfig> for ChatOptions {
    fn from(config: &RagConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            max_context_docs: config.max_context_docs,
            max_context_chars: config.max_context_chars,
        }
    }
}

/// Outcome of one retrieval-augmented answer.
#[derive(Clone, Debug)]
pub struct ChatOutcome {
    pub answer: String,
    /// Chunks that qualified as context for this answer.
    pub context_documents: usize,
}

/// Builds the message list for the generation provider.
///
/// With context, the user turn carries the context blocks ahead of the
/// question; without, it asks the model to answer from general knowledge and
/// say that no documents backed the answer.
pub fn build_messages(user_query: &str, context: &str) -> Vec<ChatMessage> {
    let user_content = if context.is_empty() {
        format!(
            "Question: {user_query}\n\n\
             Note: no relevant context documents were found in the knowledge base. \
             Answer from general knowledge and mention that no specific documents \
             back this answer."
        )
    } else {
        format!(
            "Context Documents:\n{context}\n\n\
             Question: {user_query}\n\n\
             Answer the question using the context above, naming the documents you \
             reference."
        )
    };

    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(user_content),
    ]
}

/// The full retrieval-augmented pipeline behind a single `answer` call.
///
/// Stateless per call: each query's read set and assembled context are
/// self-contained, so one `RagChat` may serve concurrent callers.
pub struct RagChat {
    store: Arc<dyn Backend>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn ChatProvider>,
    options: ChatOptions,
}

impl RagChat {
    pub fn new(
        store: Arc<dyn Backend>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn ChatProvider>,
        options: ChatOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            options,
        }
    }

    /// Answers a query against the knowledge base.
    ///
    /// Provider and storage failures surface as errors; retrieval finding
    /// nothing is not one of them — the answer is then generated without
    /// context.
    pub async fn answer(&self, user_query: &str) -> Result<ChatOutcome, RetrievalError> {
        let query_embedding = self.embedder.embed(user_query).await?;

        let results = self
            .store
            .search_similar(
                &query_embedding,
                self.options.similarity_threshold,
                self.options.max_context_docs,
            )
            .await?;

        let assembler = ContextAssembler::new(self.options.max_context_chars);
        let context = assembler.assemble(&results);

        if context.is_empty() {
            tracing::debug!(
                threshold = self.options.similarity_threshold,
                "no qualifying context, answering from general knowledge"
            );
        } else {
            tracing::debug!(documents = results.len(), "assembled retrieval context");
        }

        let messages = build_messages(user_query, &context);
        let answer = self.generator.complete(&messages).await?;

        Ok(ChatOutcome {
            answer,
            context_documents: results.len(),
        })
    }
}
