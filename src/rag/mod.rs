//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! # Module Structure
//!
//! - [`chunker`] - Word-window chunking with deterministic chunk ids
//! - [`embeddings`] - The [`Embedder`](embeddings::Embedder) trait and HTTP providers
//! - [`ingest`] - Offline ingestion of a documents folder
//! - [`pipeline`] - Question answering over the index
//!
//! # Flow
//!
//! 1. **Ingestion** - Documents are chunked and embedded
//! 2. **Storage** - Records are upserted into the vector index
//! 3. **Retrieval** - The question is embedded and the top-k chunks retrieved
//! 4. **Generation** - The LLM answers from the assembled context
//!
//! # Example
//!
//! ```ignore
//! use kbase::rag::{RagPipeline, RagSettings};
//!
//! let pipeline = RagPipeline::new(embedder, index, llm, RagSettings::default());
//! let answer = pipeline.answer("What courses are offered?").await;
//! println!("{}", answer.answer());
//! ```

pub mod chunker;
pub mod embeddings;
pub mod ingest;
pub mod pipeline;

pub use chunker::TextChunker;
pub use embeddings::{Embedder, create_embedder};
pub use ingest::{IngestOutcome, IngestReport, IngestSettings, Ingestor};
pub use pipeline::{RagPipeline, RagSettings};
