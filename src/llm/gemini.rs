//! Google Gemini LLM client implementation
//!
//! Calls `models/{model}:generateContent` of the Generative Language API with
//! a single user turn and joins the text parts of the first candidate.

use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, api_base: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
        })
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(response: &Value) -> Result<String> {
        let parts = response
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                let reason = response
                    .pointer("/promptFeedback/blockReason")
                    .and_then(Value::as_str)
                    .unwrap_or("no candidates returned");
                AppError::LLM(format!("Gemini returned no answer: {}", reason))
            })?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();

        if text.trim().is_empty() {
            return Err(AppError::LLM("Gemini returned an empty answer".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("Gemini request: {}", e))
                } else {
                    AppError::LLM(format!("Gemini request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                AppError::RateLimited(format!("Gemini: {}", text))
            } else {
                AppError::LLM(format!("Gemini request failed ({}): {}", status, text))
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Failed to parse Gemini response: {}", e)))?;

        Self::extract_text(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
