//! Wire-format tests for the OpenAI-compatible providers against a local
//! mock server.

use httpmock::prelude::*;
use ragstore::providers::{ChatMessage, ChatProvider, EmbeddingProvider};
use ragstore::{OpenAiChatProvider, OpenAiEmbeddingProvider, RetrievalError};
use serde_json::json;
use url::Url;

#[tokio::test]
async fn embedding_provider_speaks_the_embeddings_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .header("authorization", "Bearer test-key")
                .json_body_partial(
                    r#"{"model": "text-embedding-3-small", "input": ["hello world"]}"#,
                );
            then.status(200).json_body(json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [
                    {"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}
                ]
            }));
        })
        .await;

    let base = Url::parse(&server.base_url()).unwrap();
    let provider =
        OpenAiEmbeddingProvider::new(&base, "test-key", "text-embedding-3-small", 3).unwrap();

    let vector = provider.embed("hello world").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    mock.assert_async().await;
}

#[tokio::test]
async fn embedding_provider_batches_in_one_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .json_body_partial(r#"{"input": ["one", "two"]}"#);
            then.status(200).json_body(json!({
                "data": [
                    {"embedding": [1.0, 0.0]},
                    {"embedding": [0.0, 1.0]}
                ]
            }));
        })
        .await;

    let base = Url::parse(&server.base_url()).unwrap();
    let provider = OpenAiEmbeddingProvider::new(&base, "test-key", "text-embedding-3-small", 2).unwrap();

    let vectors = provider
        .embed_batch(&["one".to_string(), "two".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[1], vec![0.0, 1.0]);
    assert_eq!(mock.hits_async().await, 1, "batch must be a single request");
}

#[tokio::test]
async fn embedding_provider_rejects_unexpected_vector_length() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({
                "data": [{"embedding": [0.1, 0.2]}]
            }));
        })
        .await;

    let base = Url::parse(&server.base_url()).unwrap();
    let provider = OpenAiEmbeddingProvider::new(&base, "test-key", "text-embedding-3-small", 1536)
        .unwrap();

    let result = provider.embed("anything").await;
    assert!(matches!(result, Err(RetrievalError::Provider(_))));
}

#[tokio::test]
async fn embedding_provider_surfaces_http_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(500);
        })
        .await;

    let base = Url::parse(&server.base_url()).unwrap();
    let provider = OpenAiEmbeddingProvider::new(&base, "test-key", "text-embedding-3-small", 3).unwrap();

    assert!(matches!(
        provider.embed("anything").await,
        Err(RetrievalError::Http(_))
    ));
}

#[tokio::test]
async fn chat_provider_sends_messages_and_returns_the_first_choice() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key")
                .json_body_partial(
                    r#"{
                        "model": "gpt-4o",
                        "messages": [
                            {"role": "system", "content": "be helpful"},
                            {"role": "user", "content": "capital of France?"}
                        ]
                    }"#,
                );
            then.status(200).json_body(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "Paris."}}
                ]
            }));
        })
        .await;

    let base = Url::parse(&server.base_url()).unwrap();
    let provider = OpenAiChatProvider::new(&base, "test-key", "gpt-4o").unwrap();

    let messages = vec![
        ChatMessage::system("be helpful"),
        ChatMessage::user("capital of France?"),
    ];
    let answer = provider.complete(&messages).await.unwrap();
    assert_eq!(answer, "Paris.");
    mock.assert_async().await;
}

#[tokio::test]
async fn chat_provider_rejects_empty_choice_lists() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        })
        .await;

    let base = Url::parse(&server.base_url()).unwrap();
    let provider = OpenAiChatProvider::new(&base, "test-key", "gpt-4o").unwrap();

    let result = provider.complete(&[ChatMessage::user("hello")]).await;
    assert!(matches!(result, Err(RetrievalError::Generation(_))));
}
