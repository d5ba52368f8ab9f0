//! # kbase - Knowledge Base Chat Server
//!
//! A retrieval-augmented chatbot over a folder of plain-text documents.
//!
//! ## Overview
//!
//! kbase has two halves that share one embedding model and one vector index:
//!
//! 1. **Ingestion** (`kbase ingest`) - chunk every `.txt` file in the documents
//!    folder, embed the chunks and upsert them into the index
//! 2. **Answering** (`kbase serve`, `kbase chat`, `kbase ask`) - embed a
//!    question, retrieve the nearest chunks and have an LLM answer from them
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use kbase::db::{IndexManager, IndexSettings, IndexSpec, InMemoryVectorStore};
//! use kbase::rag::{RagPipeline, RagSettings};
//! use std::sync::Arc;
//!
//! let manager = IndexManager::new(Arc::new(InMemoryVectorStore::new()), IndexSettings::default());
//! let index = manager.open(IndexSpec {
//!     name: "knowledge-base".to_string(),
//!     dimensions: 768,
//!     metric: Default::default(),
//! });
//! let pipeline = RagPipeline::new(embedder, index, llm, RagSettings::default());
//!
//! let answer = pipeline.answer("How do I enroll?").await;
//! println!("{}", answer.answer());
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference for answers (default) |
//! | `openai` | OpenAI-compatible chat completions |
//! | `swagger-ui` | Interactive API docs at `/swagger-ui/` |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`auth`] - Demo login gate, session tokens and middleware
//! - [`cli`] - Command line parsing, colored output and the terminal chat
//! - [`db`] - Vector index abstraction (Pinecone, in-memory)
//! - [`llm`] - Answer generation clients
//! - [`rag`] - Chunking, embeddings, ingestion and the answering pipeline
//! - [`session`] - Per-login chat state
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Login gate, JWT session tokens and middleware.
pub mod auth;
/// Command line interface.
pub mod cli;
/// Vector index clients.
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Per-login conversation state.
pub mod session;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use rag::{Embedder, Ingestor, RagPipeline};
pub use session::{SessionState, SessionStore};
pub use types::{AppError, RagAnswer, Result};
pub use utils::toml_config::{ConfigManager, KbaseConfig};

use crate::auth::{AuthService, DemoLoginGate};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<ConfigManager>,
    /// Question answering over the knowledge base
    pub pipeline: Arc<RagPipeline>,
    /// Open chat sessions
    pub sessions: Arc<SessionStore>,
    /// Session token issuer
    pub auth_service: Arc<AuthService>,
    /// Demo login/sign-up rules
    pub login_gate: Arc<DemoLoginGate>,
}
