//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for the generative model that
//! writes answers:
//! - **Gemini**: Google Generative Language API over plain HTTP (always available)
//! - **Ollama**: Local LLM inference (feature `ollama`)
//! - **OpenAI**: OpenAI API and compatible endpoints (feature `openai`)

use crate::types::{AppError, Result};
use crate::utils::toml_config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
///
/// | Provider | Feature | Notes |
/// |----------|---------|-------|
/// | Gemini | always | Default, matches the default embedder |
/// | Ollama | `ollama` | Recommended for local |
/// | OpenAI | `openai` | Includes compatible APIs |
#[derive(Debug, Clone)]
pub enum Provider {
    /// Google Gemini `generateContent`
    Gemini {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    /// };
    /// ```
    #[cfg(feature = "ollama")]
    Ollama { base_url: String, model: String },

    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    #[cfg(feature = "openai")]
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },
}

impl Provider {
    /// Resolve the `[llm]` configuration into a provider, reading the API key
    /// from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is missing or the provider's
    /// Cargo feature is not enabled.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config {
            LlmConfig::Gemini {
                api_key_env,
                api_base,
                model,
            } => Ok(Provider::Gemini {
                api_key: read_key(api_key_env)?,
                api_base: api_base.clone(),
                model: model.clone(),
            }),

            #[cfg(feature = "ollama")]
            LlmConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),

            #[cfg(feature = "openai")]
            LlmConfig::OpenAI {
                api_key_env,
                api_base,
                model,
            } => Ok(Provider::OpenAI {
                api_key: read_key(api_key_env)?,
                api_base: api_base.clone(),
                model: model.clone(),
            }),

            #[allow(unreachable_patterns)]
            _ => Err(AppError::Configuration(
                "LLM provider not enabled. Check feature flags.".into(),
            )),
        }
    }

    /// Create a client instance for this provider
    ///
    /// `timeout` bounds each HTTP request made by the Gemini and OpenAI
    /// clients.
    pub async fn create_client(&self, timeout: Duration) -> Result<Arc<dyn LLMClient>> {
        match self {
            Provider::Gemini {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::gemini::GeminiClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                timeout,
            )?)),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()).await?,
            )),

            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                timeout,
            )?)),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini { .. } => "Gemini",
            #[cfg(feature = "ollama")]
            Provider::Ollama { .. } => "Ollama",
            #[cfg(feature = "openai")]
            Provider::OpenAI { .. } => "OpenAI",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Gemini { model, .. } => model,
            #[cfg(feature = "ollama")]
            Provider::Ollama { model, .. } => model,
            #[cfg(feature = "openai")]
            Provider::OpenAI { model, .. } => model,
        }
    }
}

fn read_key(env_name: &str) -> Result<String> {
    std::env::var(env_name)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "Environment variable '{}' for the LLM API key is not set",
                env_name
            ))
        })
}
