//! Text embedding providers.
//!
//! One [`Embedder`] is built from `[embedding]` at startup and shared by the
//! ingestion job and the answering pipeline, so documents and questions are
//! always embedded by the same model. Every returned vector is checked against
//! the configured dimensionality.

use crate::types::{AppError, Result};
use crate::utils::toml_config::EmbeddingConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a chunk for storage.
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a question for retrieval.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded next to stored vectors.
    fn model_id(&self) -> &str;
}

/// Build the embedder named by the `[embedding]` configuration.
///
/// # Errors
///
/// Returns a configuration error if the API key variable is not set.
pub fn create_embedder(config: &EmbeddingConfig, http_timeout: Duration) -> Result<Arc<dyn Embedder>> {
    match config {
        EmbeddingConfig::Gemini {
            api_key_env,
            api_base,
            model,
            dimensions,
        } => Ok(Arc::new(GeminiEmbedder::new(
            read_key(api_key_env)?,
            api_base.clone(),
            model.clone(),
            *dimensions,
            http_timeout,
        )?)),
        EmbeddingConfig::Ollama {
            base_url,
            model,
            dimensions,
        } => Ok(Arc::new(OllamaEmbedder::new(
            base_url.clone(),
            model.clone(),
            *dimensions,
            http_timeout,
        )?)),
        EmbeddingConfig::OpenAI {
            api_key_env,
            api_base,
            model,
            dimensions,
        } => Ok(Arc::new(OpenAIEmbedder::new(
            read_key(api_key_env)?,
            api_base.clone(),
            model.clone(),
            *dimensions,
            http_timeout,
        )?)),
    }
}

fn read_key(env_name: &str) -> Result<String> {
    std::env::var(env_name)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "Environment variable '{}' for the embedding API key is not set",
                env_name
            ))
        })
}

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Send an embedding request and return the JSON body.
async fn send_json(provider: &str, request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            AppError::Timeout(format!("{} embedding request: {}", provider, e))
        } else {
            AppError::Embedding(format!("{} embedding request failed: {}", provider, e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
            AppError::RateLimited(format!("{} embeddings: {}", provider, text))
        } else {
            AppError::Embedding(format!(
                "{} embedding request failed ({}): {}",
                provider, status, text
            ))
        });
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Embedding(format!("Failed to parse {} response: {}", provider, e)))
}

/// Read a JSON array of numbers.
fn parse_vector(value: Option<&Value>, provider: &str) -> Result<Vec<f32>> {
    let values = value.and_then(Value::as_array).ok_or_else(|| {
        AppError::Embedding(format!("{} response did not contain an embedding", provider))
    })?;

    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                AppError::Embedding(format!("{} embedding contains a non-number", provider))
            })
        })
        .collect()
}

fn check_dimensions(vector: Vec<f32>, expected: usize, model: &str) -> Result<Vec<f32>> {
    if vector.len() != expected {
        return Err(AppError::Embedding(format!(
            "Model '{}' returned {} dimensions, expected {}",
            model,
            vector.len(),
            expected
        )));
    }
    Ok(vector)
}

fn reject_blank(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidInput("Cannot embed empty text".to_string()));
    }
    Ok(())
}

// ============= Gemini =============

/// Google Gemini `embedContent`. Documents and queries use the
/// `RETRIEVAL_DOCUMENT` and `RETRIEVAL_QUERY` task types of the same model.
pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            dimensions,
        })
    }

    async fn embed(&self, text: &str, task_type: &str) -> Result<Vec<f32>> {
        reject_blank(text)?;

        let url = format!("{}/models/{}:embedContent", self.api_base, self.model);
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
            "taskType": task_type,
        });

        let response = send_json(
            "Gemini",
            self.client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        let vector = parse_vector(response.pointer("/embedding/values"), "Gemini")?;
        check_dimensions(vector, self.dimensions, &self.model)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text, "RETRIEVAL_DOCUMENT").await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text, "RETRIEVAL_QUERY").await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============= Ollama =============

/// Local embeddings through Ollama's `/api/embed`.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String, dimensions: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimensions,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        reject_blank(text)?;

        let url = format!("{}/api/embed", self.base_url);
        let body = json!({ "model": self.model, "input": text });

        let response = send_json("Ollama", self.client.post(url).json(&body)).await?;
        let vector = parse_vector(response.pointer("/embeddings/0"), "Ollama")?;
        check_dimensions(vector, self.dimensions, &self.model)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============= OpenAI-compatible =============

/// `/embeddings` of the OpenAI API or any compatible server.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            dimensions,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        reject_blank(text)?;

        let url = format!("{}/embeddings", self.api_base);
        let body = json!({ "model": self.model, "input": text });

        let response = send_json(
            "OpenAI",
            self.client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let vector = parse_vector(response.pointer("/data/0/embedding"), "OpenAI")?;
        check_dimensions(vector, self.dimensions, &self.model)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        let value = json!({ "embedding": { "values": [0.5, -1.0, 2] } });
        let vector = parse_vector(value.pointer("/embedding/values"), "test").unwrap();
        assert_eq!(vector, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_vector_missing() {
        let value = json!({ "error": "nope" });
        let result = parse_vector(value.pointer("/embedding/values"), "test");
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(vec![0.0; 4], 4, "m").is_ok());
        assert!(matches!(
            check_dimensions(vec![0.0; 3], 4, "m"),
            Err(AppError::Embedding(_))
        ));
    }

    #[test]
    fn test_gemini_model_prefix_is_normalized() {
        let embedder = GeminiEmbedder::new(
            "key".to_string(),
            "https://example.test/v1beta/".to_string(),
            "models/text-embedding-004".to_string(),
            768,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(embedder.model_id(), "text-embedding-004");
        assert_eq!(embedder.dimensions(), 768);
    }

    #[test]
    fn test_create_embedder_requires_key() {
        let config = EmbeddingConfig::Gemini {
            api_key_env: "KBASE_TEST_UNSET_EMBED_KEY".to_string(),
            api_base: "https://example.test".to_string(),
            model: "m".to_string(),
            dimensions: 8,
        };
        let result = create_embedder(&config, Duration::from_secs(1));
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
