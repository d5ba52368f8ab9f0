//! LLM Provider Clients and Abstractions
//!
//! The answering pipeline only needs one operation from a generative model:
//! turn a rendered prompt into text. [`LLMClient`] captures that, and
//! [`Provider`] builds the configured implementation.
//!
//! # Supported Providers
//!
//! - Gemini (always compiled, plain HTTP through `reqwest`)
//! - `ollama` - Local Ollama server
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use kbase::llm::Provider;
//!
//! let provider = Provider::from_config(&config.llm)?;
//! let client = provider.create_client(Duration::from_secs(30)).await?;
//! let answer = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
pub mod gemini;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, Provider};
