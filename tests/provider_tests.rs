//! Wire format of the HTTP embedding and generation providers.

use kbase::llm::LLMClient;
use kbase::llm::gemini::GeminiClient;
use kbase::rag::Embedder;
use kbase::rag::embeddings::{GeminiEmbedder, OllamaEmbedder, OpenAIEmbedder};
use kbase::types::AppError;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn gemini_embedder(server: &MockServer, dimensions: usize) -> GeminiEmbedder {
    GeminiEmbedder::new(
        "test-key".to_string(),
        server.uri(),
        "text-embedding-004".to_string(),
        dimensions,
        TIMEOUT,
    )
    .unwrap()
}

// ============= Gemini embeddings =============

#[tokio::test]
async fn test_gemini_embed_query_uses_retrieval_query_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "taskType": "RETRIEVAL_QUERY",
            "content": { "parts": [{ "text": "How do I enroll?" }] }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let vector = gemini_embedder(&server, 3)
        .embed_query("How do I enroll?")
        .await
        .unwrap();

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_gemini_embed_document_uses_retrieval_document_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .and(body_partial_json(json!({ "taskType": "RETRIEVAL_DOCUMENT" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [1.0, 0.0] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let vector = gemini_embedder(&server, 2)
        .embed_document("chunk text")
        .await
        .unwrap();
    assert_eq!(vector.len(), 2);
}

#[tokio::test]
async fn test_gemini_rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = gemini_embedder(&server, 3).embed_query("q").await.unwrap_err();

    assert!(matches!(err, AppError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_gemini_wrong_dimensions_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [0.5] } })),
        )
        .mount(&server)
        .await;

    let err = gemini_embedder(&server, 768).embed_query("q").await.unwrap_err();
    assert!(matches!(err, AppError::Embedding(_)));
}

#[tokio::test]
async fn test_blank_text_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let err = gemini_embedder(&server, 3).embed_document(" \n ").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

// ============= Other embedding providers =============

#[tokio::test]
async fn test_openai_embeddings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "text-embedding-3-small", "input": "hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.25, 0.75] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OpenAIEmbedder::new(
        "sk-test".to_string(),
        server.uri(),
        "text-embedding-3-small".to_string(),
        2,
        TIMEOUT,
    )
    .unwrap();

    assert_eq!(embedder.embed_query("hello").await.unwrap(), vec![0.25, 0.75]);
}

#[tokio::test]
async fn test_ollama_embeddings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "nomic-embed-text" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.5, 0.5, 0.0]]
        })))
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(server.uri(), "nomic-embed-text".to_string(), 3, TIMEOUT).unwrap();

    assert_eq!(embedder.embed_document("text").await.unwrap(), vec![0.5, 0.5, 0.0]);
    assert_eq!(embedder.model_id(), "nomic-embed-text");
}

// ============= Gemini generation =============

fn gemini_client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        "test-key".to_string(),
        server.uri(),
        "gemini-2.5-flash".to_string(),
        TIMEOUT,
    )
    .unwrap()
}

#[tokio::test]
async fn test_gemini_generate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "prompt" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Enroll online." }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = gemini_client(&server).generate("prompt").await.unwrap();
    assert_eq!(answer, "Enroll online.");
}

#[tokio::test]
async fn test_gemini_generate_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = gemini_client(&server).generate("prompt").await.unwrap_err();
    assert!(matches!(err, AppError::LLM(_)));
    assert!(err.to_string().contains("internal"));
}

#[tokio::test]
async fn test_gemini_generate_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = GeminiClient::new(
        "test-key".to_string(),
        server.uri(),
        "gemini-2.5-flash".to_string(),
        Duration::from_millis(100),
    )
    .unwrap();

    let err = client.generate("prompt").await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)));
}
