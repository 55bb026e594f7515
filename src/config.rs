//! Configuration defaults and environment loading.
//!
//! Every query-time knob exposed to callers (`similarity_threshold`,
//! `max_context_docs`, `max_context_chars`) has a documented default here,
//! alongside the provider models the defaults were tuned against.

use std::path::PathBuf;

use url::Url;

use crate::types::RetrievalError;

/// Embedding model the store defaults were chosen for.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Vector length produced by [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
/// Generation model used by the chat layer.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
/// Minimum similarity for a chunk to qualify as context.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;
/// Maximum number of chunks retrieved per query.
pub const DEFAULT_MAX_CONTEXT_DOCS: usize = 10;
/// Character budget for the assembled context blob.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;
/// OpenAI-compatible API base the providers talk to.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Runtime configuration for the retrieval engine.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: Url,
    /// API key for the provider endpoints; absent means provider calls fail.
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chat_model: String,
    pub similarity_threshold: f32,
    pub max_context_docs: usize,
    pub max_context_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./ragstore.sqlite"),
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base parses"),
            api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_context_docs: DEFAULT_MAX_CONTEXT_DOCS,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl RagConfig {
    /// Builds a configuration from the environment, falling back to defaults.
    ///
    /// Reads a `.env` file when present. Recognized variables:
    /// `RAGSTORE_DB`, `OPENAI_API_BASE`, `OPENAI_API_KEY`,
    /// `RAGSTORE_EMBEDDING_MODEL`, `RAGSTORE_EMBEDDING_DIMENSION`,
    /// `RAGSTORE_CHAT_MODEL`, `RAGSTORE_SIMILARITY_THRESHOLD`,
    /// `RAGSTORE_MAX_CONTEXT_DOCS`, `RAGSTORE_MAX_CONTEXT_CHARS`.
    pub fn from_env() -> Result<Self, RetrievalError> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(path) = std::env::var("RAGSTORE_DB") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            config.api_base = Url::parse(&base)
                .map_err(|err| RetrievalError::InvalidDocument(format!("OPENAI_API_BASE: {err}")))?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("RAGSTORE_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(dim) = parse_env("RAGSTORE_EMBEDDING_DIMENSION") {
            config.embedding_dimension = dim;
        }
        if let Ok(model) = std::env::var("RAGSTORE_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Some(threshold) = parse_env::<f32>("RAGSTORE_SIMILARITY_THRESHOLD") {
            config.similarity_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(docs) = parse_env("RAGSTORE_MAX_CONTEXT_DOCS") {
            config.max_context_docs = docs;
        }
        if let Some(chars) = parse_env("RAGSTORE_MAX_CONTEXT_CHARS") {
            config.max_context_chars = chars;
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}
