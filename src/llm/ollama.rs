//! Ollama LLM client implementation
//!
//! Sends the rendered prompt as a single user chat message through `ollama-rs`.

use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
};

const DEFAULT_OLLAMA_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

/// Split `http://host:port` into `("http://host", port)`.
fn split_base_url(base_url: &str) -> (String, u16) {
    let (scheme, rest) = base_url
        .trim_end_matches('/')
        .split_once("://")
        .unwrap_or(("http", base_url));

    match rest.rsplit_once(':') {
        Some((host, port)) => (
            format!("{}://{}", scheme, host),
            port.parse().unwrap_or(DEFAULT_OLLAMA_PORT),
        ),
        None => (format!("{}://{}", scheme, rest), DEFAULT_OLLAMA_PORT),
    }
}

impl OllamaClient {
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let (host, port) = split_base_url(&base_url);
        let client = Ollama::new(host, port);

        Ok(Self { client, model })
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages = vec![ChatMessage::user(prompt.to_string())];

        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_base_url_full() {
        assert_eq!(
            split_base_url("http://localhost:11434"),
            ("http://localhost".to_string(), 11434)
        );
    }

    #[test]
    fn test_split_base_url_no_port() {
        assert_eq!(
            split_base_url("http://localhost/"),
            ("http://localhost".to_string(), 11434)
        );
    }

    #[test]
    fn test_split_base_url_custom_port_without_scheme() {
        assert_eq!(
            split_base_url("192.168.1.100:8080"),
            ("http://192.168.1.100".to_string(), 8080)
        );
    }
}
