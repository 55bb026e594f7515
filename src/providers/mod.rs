//! External model provider seams.
//!
//! The engine treats both model calls as black boxes behind traits: text in,
//! fixed-length vector out ([`EmbeddingProvider`]), and messages in, text out
//! ([`ChatProvider`]). Either may fail or be slow; neither is retried here.

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RetrievalError;

pub use mock::MockEmbeddingProvider;
pub use openai::{OpenAiChatProvider, OpenAiEmbeddingProvider};

/// Produces fixed-length embedding vectors for text.
///
/// Implementations must be deterministic in vector length: every successful
/// call for the same model configuration returns [`dimensions`] floats.
///
/// [`dimensions`]: EmbeddingProvider::dimensions
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    /// Embed several texts, preserving input order.
    ///
    /// The default issues one call per text; providers with batch endpoints
    /// override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Identifier of the embedding model, recorded in chunk metadata.
    fn model(&self) -> &str;

    /// Vector length this provider produces.
    fn dimensions(&self) -> usize;
}

/// Role of a chat message, serialized in OpenAI wire form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message in a chat completion request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Generates a chat completion from a message list.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RetrievalError>;

    /// Identifier of the generation model.
    fn model(&self) -> &str;
}
