//! OpenAI-compatible embedding and chat completion providers.
//!
//! Thin reqwest wrappers over `/v1/embeddings` and `/v1/chat/completions`.
//! Failures surface as provider errors; there is no retry or backoff layer
//! here, callers decide how to recover.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ChatMessage, ChatProvider, EmbeddingProvider};
use crate::config::RagConfig;
use crate::types::RetrievalError;

/// Sampling temperature for generation.
const CHAT_TEMPERATURE: f32 = 0.7;
/// Completion token cap for generation.
const CHAT_MAX_TOKENS: u32 = 1000;

/// Embedding provider talking to an OpenAI-compatible `/v1/embeddings`.
#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(
        api_base: &Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, RetrievalError> {
        let endpoint = api_base
            .join("/v1/embeddings")
            .map_err(|err| RetrievalError::Provider(err.to_string()))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        })
    }

    /// Builds a provider from configuration; requires an API key.
    pub fn from_config(config: &RagConfig) -> Result<Self, RetrievalError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| RetrievalError::Provider("missing API key".to_string()))?;
        Self::new(
            &config.api_base,
            api_key,
            config.embedding_model.clone(),
            config.embedding_dimension,
        )
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let input = [text.to_string()];
        let vectors = self.embed_batch(&input).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Provider("embedding response was empty".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbeddingResponse = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.data.len() != texts.len() {
            return Err(RetrievalError::Provider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }
        for datum in &response.data {
            if datum.embedding.len() != self.dimensions {
                return Err(RetrievalError::Provider(format!(
                    "model {} returned a {}-dimension vector, expected {}",
                    self.model,
                    datum.embedding.len(),
                    self.dimensions
                )));
            }
        }

        Ok(response.data.into_iter().map(|datum| datum.embedding).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Chat provider talking to an OpenAI-compatible `/v1/chat/completions`.
#[derive(Clone)]
pub struct OpenAiChatProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatProvider {
    pub fn new(
        api_base: &Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, RetrievalError> {
        let endpoint = api_base
            .join("/v1/chat/completions")
            .map_err(|err| RetrievalError::Generation(err.to_string()))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            temperature: CHAT_TEMPERATURE,
            max_tokens: CHAT_MAX_TOKENS,
        })
    }

    /// Builds a provider from configuration; requires an API key.
    pub fn from_config(config: &RagConfig) -> Result<Self, RetrievalError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| RetrievalError::Generation("missing API key".to_string()))?;
        Self::new(&config.api_base, api_key, config.chat_model.clone())
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RetrievalError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response: ChatResponse = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RetrievalError::Generation("completion had no choices".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
