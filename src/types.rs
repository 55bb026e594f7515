//! Shared error and metadata types for the retrieval engine.

use serde_json::Value;

/// Errors surfaced by stores, providers, and the ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Storage-layer failure (connection, statement, transaction).
    #[error("storage error: {0}")]
    Storage(String),

    /// The embedding provider failed or returned an unusable response.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// The generation provider failed or returned an unusable response.
    #[error("generation provider error: {0}")]
    Generation(String),

    /// A vector's length does not match the store's configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller-supplied input that cannot be stored or queried.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Open string-keyed metadata attached to an embedding record.
///
/// Stored as JSON text; values are the JSON variants (string, number, bool,
/// nested map). Validation happens at the store boundary: writes always
/// persist an object, and reads that hit unparsable or non-object data fall
/// back to an empty map instead of erroring.
pub type Metadata = serde_json::Map<String, Value>;

/// Decodes stored metadata text leniently.
///
/// Partially-written or legacy rows must not poison read paths, so anything
/// that is not a JSON object decodes as an empty map.
pub fn decode_metadata(raw: &str) -> Metadata {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => Metadata::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_metadata_accepts_objects() {
        let map = decode_metadata(r#"{"filename":"notes.txt","content_length":42}"#);
        assert_eq!(map.get("filename").and_then(Value::as_str), Some("notes.txt"));
        assert_eq!(map.get("content_length").and_then(Value::as_u64), Some(42));
    }

    #[test]
    fn decode_metadata_defaults_on_garbage() {
        assert!(decode_metadata("not json").is_empty());
        assert!(decode_metadata("[1,2,3]").is_empty());
        assert!(decode_metadata("\"just a string\"").is_empty());
        assert!(decode_metadata("").is_empty());
    }
}
