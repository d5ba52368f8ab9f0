//! Vector index access.
//!
//! - [`vectorstore`]: the `VectorStore` trait and the in-memory store
//! - [`pinecone`]: Pinecone REST client
//! - [`index`]: index creation/verification and batched, retried writes
//!
//! The vector index is the only durable state of the system.

#![allow(missing_docs)]

pub mod index;
pub mod pinecone;
pub mod vectorstore;

// Re-exports
pub use index::{IndexHandle, IndexManager, IndexSettings, IndexSpec, UpsertSummary};
pub use pinecone::PineconeStore;
pub use vectorstore::{IndexInfo, IndexStats, InMemoryVectorStore, VectorStore, create_store};
