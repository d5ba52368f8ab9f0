//! Vector Store Abstraction Layer
//!
//! Ingestion and retrieval talk to the vector index through the
//! [`VectorStore`] trait, so the managed Pinecone service and the
//! process-local store are interchangeable.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      VectorStore Trait                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ describe/create/delete index │ upsert │ query │ fetch │ list  │
//! └──────────────────────────────────────────────────────────────┘
//!                 ▲                                ▲
//!          ┌──────┴──────┐                 ┌───────┴───────┐
//!          │  Pinecone   │                 │   In-memory   │
//!          │ (REST API)  │                 │ (tests, demo) │
//!          └─────────────┘                 └───────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kbase::db::vectorstore::{InMemoryVectorStore, VectorStore};
//!
//! let store = InMemoryVectorStore::new();
//! store.create_index("kb", 768, DistanceMetric::Cosine).await?;
//! store.upsert("kb", &records).await?;
//! let matches = store.query("kb", &query_vector, 5).await?;
//! ```

use crate::types::{AppError, DistanceMetric, EmbeddingRecord, QueryMatch, Result};
use crate::utils::toml_config::VectorStoreConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Index Descriptions
// ============================================================================

/// Description of one index as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub dimensions: usize,
    pub metric: DistanceMetric,
    /// Whether the index accepts reads and writes yet.
    pub ready: bool,
}

/// Record counts of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_vector_count: usize,
    pub dimensions: usize,
}

// ============================================================================
// Vector Store Trait
// ============================================================================

/// Abstract trait for vector index operations.
///
/// Every data operation names the index it targets. Records are keyed by id:
/// upserting an existing id replaces the stored vector and metadata.
///
/// # Implementors
///
/// - `PineconeStore` - Managed cloud service
/// - `InMemoryVectorStore` - Testing and local demos
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get the name of this vector store provider.
    fn provider_name(&self) -> &'static str;

    /// Describe an index, or `None` if it does not exist.
    async fn describe_index(&self, name: &str) -> Result<Option<IndexInfo>>;

    /// Create an index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index already exists or creation fails.
    async fn create_index(&self, name: &str, dimensions: usize, metric: DistanceMetric)
        -> Result<()>;

    /// List all indexes.
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>>;

    /// Delete an index and all its records.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Insert or overwrite records. Returns the number of records written.
    async fn upsert(&self, index: &str, records: &[EmbeddingRecord]) -> Result<usize>;

    /// Nearest neighbours of `vector`, highest score first, at most `top_k`.
    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;

    /// Records with the given ids. Unknown ids are omitted.
    async fn fetch(&self, index: &str, ids: &[String]) -> Result<Vec<EmbeddingRecord>>;

    /// Delete records by id. Returns the number of ids submitted for deletion.
    async fn delete(&self, index: &str, ids: &[String]) -> Result<usize>;

    /// Every record id starting with `prefix`.
    async fn list_ids(&self, index: &str, prefix: &str) -> Result<Vec<String>>;

    /// Record counts of an index.
    async fn stats(&self, index: &str) -> Result<IndexStats>;
}

/// Build the vector store named by the `[vector_store]` configuration.
///
/// # Errors
///
/// Returns a configuration error if a required API key is not set.
pub fn create_store(
    config: &VectorStoreConfig,
    http_timeout: Duration,
) -> Result<Arc<dyn VectorStore>> {
    match config {
        VectorStoreConfig::Pinecone {
            api_key_env,
            controller_url,
            cloud,
            region,
            namespace,
        } => {
            let api_key = std::env::var(api_key_env)
                .ok()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' for the Pinecone API key is not set",
                        api_key_env
                    ))
                })?;

            let store = super::pinecone::PineconeStore::new(
                api_key,
                controller_url.clone(),
                cloud.clone(),
                region.clone(),
                namespace.clone(),
                http_timeout,
            )?;
            Ok(Arc::new(store))
        }
        VectorStoreConfig::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}

// ============================================================================
// In-Memory Vector Store
// ============================================================================

use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory vector store.
///
/// Data is not persisted and will be lost when the process exits.
/// Indexes are ready as soon as they are created.
pub struct InMemoryVectorStore {
    indexes: Arc<RwLock<HashMap<String, InMemoryIndex>>>,
}

struct InMemoryIndex {
    dimensions: usize,
    metric: DistanceMetric,
    records: HashMap<String, EmbeddingRecord>,
}

impl InMemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            indexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Calculate cosine similarity between two vectors.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    /// Similarity under `metric`; larger is always closer.
    fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
        match metric {
            DistanceMetric::Cosine => Self::cosine_similarity(a, b),
            DistanceMetric::Dotproduct => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclidean => {
                let distance: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }

    fn not_found(name: &str) -> AppError {
        AppError::NotFound(format!("Index '{}' not found", name))
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexInfo>> {
        let indexes = self.indexes.read();
        Ok(indexes.get(name).map(|index| IndexInfo {
            name: name.to_string(),
            dimensions: index.dimensions,
            metric: index.metric,
            ready: true,
        }))
    }

    async fn create_index(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let mut indexes = self.indexes.write();
        if indexes.contains_key(name) {
            return Err(AppError::InvalidInput(format!(
                "Index '{}' already exists",
                name
            )));
        }
        indexes.insert(
            name.to_string(),
            InMemoryIndex {
                dimensions,
                metric,
                records: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        let indexes = self.indexes.read();
        let mut infos: Vec<IndexInfo> = indexes
            .iter()
            .map(|(name, index)| IndexInfo {
                name: name.clone(),
                dimensions: index.dimensions,
                metric: index.metric,
                ready: true,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let mut indexes = self.indexes.write();
        indexes.remove(name).ok_or_else(|| Self::not_found(name))?;
        Ok(())
    }

    async fn upsert(&self, index: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut indexes = self.indexes.write();
        let target = indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;

        for record in records {
            if record.values.len() != target.dimensions {
                return Err(AppError::InvalidInput(format!(
                    "Record '{}' has {} dimensions, index '{}' expects {}",
                    record.id,
                    record.values.len(),
                    index,
                    target.dimensions
                )));
            }
        }

        for record in records {
            target.records.insert(record.id.clone(), record.clone());
        }

        Ok(records.len())
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let indexes = self.indexes.read();
        let target = indexes.get(index).ok_or_else(|| Self::not_found(index))?;

        let mut matches: Vec<QueryMatch> = target
            .records
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: Self::score(target.metric, vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();

        // Sort by score descending, ties by id for stable output
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn fetch(&self, index: &str, ids: &[String]) -> Result<Vec<EmbeddingRecord>> {
        let indexes = self.indexes.read();
        let target = indexes.get(index).ok_or_else(|| Self::not_found(index))?;

        Ok(ids
            .iter()
            .filter_map(|id| target.records.get(id).cloned())
            .collect())
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<usize> {
        let mut indexes = self.indexes.write();
        let target = indexes.get_mut(index).ok_or_else(|| Self::not_found(index))?;

        for id in ids {
            target.records.remove(id);
        }

        Ok(ids.len())
    }

    async fn list_ids(&self, index: &str, prefix: &str) -> Result<Vec<String>> {
        let indexes = self.indexes.read();
        let target = indexes.get(index).ok_or_else(|| Self::not_found(index))?;

        let mut ids: Vec<String> = target
            .records
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn stats(&self, index: &str) -> Result<IndexStats> {
        let indexes = self.indexes.read();
        let target = indexes.get(index).ok_or_else(|| Self::not_found(index))?;

        Ok(IndexStats {
            total_vector_count: target.records.len(),
            dimensions: target.dimensions,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
