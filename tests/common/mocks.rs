//! Mock implementations for testing.
//!
//! This module provides a mock embedder and a mock LLM client that can be
//! used across different test files without duplication.

use async_trait::async_trait;
use kbase::llm::LLMClient;
use kbase::rag::Embedder;
use kbase::types::{AppError, Result};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const MOCK_DIMENSIONS: usize = 128;
pub const MOCK_EMBED_MODEL: &str = "mock-embed";

/// Deterministic bag-of-words embedder.
///
/// Each lowercase word is hashed into one of [`MOCK_DIMENSIONS`] buckets and
/// the counts are L2-normalised, so texts sharing words score higher under
/// cosine similarity.
#[derive(Clone, Default)]
pub struct MockEmbedder {
    fail_all: bool,
    /// Fail any text containing this word
    poison: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An embedder whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// An embedder that fails on texts containing `word`.
    pub fn failing_on(word: &str) -> Self {
        Self {
            poison: Some(word.to_lowercase()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut values = vec![0.0f32; MOCK_DIMENSIONS];
        for word in words(text) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            values[(hasher.finish() % MOCK_DIMENSIONS as u64) as usize] += 1.0;
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|v| *v /= norm);
        }
        values
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all {
            return Err(AppError::Embedding("Mock embedding failure".to_string()));
        }
        if let Some(poison) = &self.poison {
            if words(text).any(|w| w == *poison) {
                return Err(AppError::Embedding(format!("Mock refuses '{}'", poison)));
            }
        }
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("Cannot embed empty text".to_string()));
        }
        Ok(Self::vector(text))
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }

    fn model_id(&self) -> &str {
        MOCK_EMBED_MODEL
    }
}

#[derive(Clone)]
enum Reply {
    Fixed(String),
    /// Return the prompt itself
    Echo,
    Fail,
}

/// Mock LLM client that counts calls and remembers the last prompt.
#[derive(Clone)]
pub struct MockLLMClient {
    reply: Reply,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    last_prompt: Arc<parking_lot::Mutex<Option<String>>>,
}

impl MockLLMClient {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self::with_reply(Reply::Fixed(response.to_string()))
    }

    /// Create a mock client that answers with the prompt it received.
    pub fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self::with_reply(Reply::Fail)
    }

    /// Sleep before answering.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Reply::Fixed(response) => Ok(response.clone()),
            Reply::Echo => Ok(prompt.to_string()),
            Reply::Fail => Err(AppError::LLM("Mock LLM failure".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}
