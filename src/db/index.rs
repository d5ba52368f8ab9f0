//! Index lifecycle and batched writes.
//!
//! [`IndexManager`] makes sure the configured index exists with the expected
//! shape before ingestion writes to it. [`IndexHandle`] wraps one index and
//! adds the write policy: fixed-size batches, a pause between batches and
//! exponential backoff when the store rate-limits a batch.

use crate::db::vectorstore::{IndexStats, VectorStore};
use crate::rag::chunker::{chunk_id_prefix, chunk_index_from_id};
use crate::types::{AppError, DistanceMetric, EmbeddingRecord, QueryMatch, Result};
use crate::utils::toml_config::IndexConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name and shape of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimensions: usize,
    pub metric: DistanceMetric,
}

/// Write and readiness policy.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub ready_timeout: Duration,
    pub ready_poll_interval: Duration,
}

impl IndexSettings {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            ready_poll_interval: Duration::from_millis(config.ready_poll_ms),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}

/// A batch that could not be written.
#[derive(Debug, Clone, Serialize)]
pub struct FailedBatch {
    /// Position of the batch within the upsert call
    pub batch: usize,
    pub ids: Vec<String>,
    pub error: String,
}

/// Outcome of [`IndexHandle::upsert`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpsertSummary {
    pub batches: usize,
    pub upserted: usize,
    /// Records dropped before sending because their dimensionality was wrong
    pub rejected: Vec<String>,
    pub retries: u32,
    pub failed_batches: Vec<FailedBatch>,
}

impl UpsertSummary {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.failed_batches.is_empty()
    }
}

/// Creates and verifies indexes.
pub struct IndexManager {
    store: Arc<dyn VectorStore>,
    settings: IndexSettings,
}

impl IndexManager {
    pub fn new(store: Arc<dyn VectorStore>, settings: IndexSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Handle to `spec` without contacting the store.
    ///
    /// Used on the query path, where a missing index surfaces as a retrieval
    /// error on the first query.
    pub fn open(&self, spec: IndexSpec) -> IndexHandle {
        IndexHandle {
            store: Arc::clone(&self.store),
            spec,
            settings: self.settings.clone(),
        }
    }

    /// Return a handle to `spec`, creating the index if needed.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the index exists with another dimension or metric
    /// - `Timeout` if a new index is not ready within `ready_timeout`
    /// - any store error from describing or creating the index
    pub async fn ensure_index(&self, spec: IndexSpec) -> Result<IndexHandle> {
        match self.store.describe_index(&spec.name).await? {
            Some(existing) => {
                if existing.dimensions != spec.dimensions {
                    return Err(AppError::Configuration(format!(
                        "Index '{}' has dimension {}, but the embedding model produces {}",
                        spec.name, existing.dimensions, spec.dimensions
                    )));
                }
                if existing.metric != spec.metric {
                    return Err(AppError::Configuration(format!(
                        "Index '{}' uses metric '{}', configured metric is '{}'",
                        spec.name, existing.metric, spec.metric
                    )));
                }
                debug!(index = %spec.name, "Index exists");

                if !existing.ready {
                    self.wait_until_ready(&spec.name).await?;
                }
            }
            None => {
                info!(
                    index = %spec.name,
                    dimensions = spec.dimensions,
                    metric = %spec.metric,
                    provider = self.store.provider_name(),
                    "Creating index"
                );
                self.store
                    .create_index(&spec.name, spec.dimensions, spec.metric)
                    .await?;
                self.wait_until_ready(&spec.name).await?;
                info!(index = %spec.name, "Index ready");
            }
        }

        Ok(self.open(spec))
    }

    async fn wait_until_ready(&self, name: &str) -> Result<()> {
        let started = Instant::now();

        loop {
            if let Some(info) = self.store.describe_index(name).await? {
                if info.ready {
                    return Ok(());
                }
            }

            if started.elapsed() >= self.settings.ready_timeout {
                return Err(AppError::Timeout(format!(
                    "Index '{}' was not ready after {:?}",
                    name, self.settings.ready_timeout
                )));
            }

            debug!(index = name, "Waiting for index to become ready");
            tokio::time::sleep(self.settings.ready_poll_interval).await;
        }
    }
}

/// One index plus the write policy.
#[derive(Clone)]
pub struct IndexHandle {
    store: Arc<dyn VectorStore>,
    spec: IndexSpec,
    settings: IndexSettings,
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("spec", &self.spec)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl IndexHandle {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    /// Write records in batches. Never fails as a whole: batches that still
    /// fail after retries are listed in the summary and the rest continue.
    pub async fn upsert(&self, records: &[EmbeddingRecord]) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        let (valid, rejected): (Vec<&EmbeddingRecord>, Vec<&EmbeddingRecord>) = records
            .iter()
            .partition(|r| r.values.len() == self.spec.dimensions);

        for record in &rejected {
            warn!(
                id = %record.id,
                got = record.values.len(),
                expected = self.spec.dimensions,
                "Rejecting record with wrong dimensionality"
            );
        }
        summary.rejected = rejected.into_iter().map(|r| r.id.clone()).collect();

        let batches: Vec<Vec<EmbeddingRecord>> = valid
            .chunks(self.settings.batch_size)
            .map(|batch| batch.iter().map(|r| (*r).clone()).collect())
            .collect();
        let total = batches.len();

        for (position, batch) in batches.iter().enumerate() {
            if position > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            summary.batches += 1;
            match self.upsert_batch(batch, &mut summary.retries).await {
                Ok(count) => {
                    summary.upserted += count;
                    info!(
                        index = %self.spec.name,
                        batch = position + 1,
                        total,
                        records = count,
                        "Upserted batch"
                    );
                }
                Err(e) => {
                    warn!(
                        index = %self.spec.name,
                        batch = position + 1,
                        total,
                        error = %e,
                        "Batch upsert failed"
                    );
                    summary.failed_batches.push(FailedBatch {
                        batch: position,
                        ids: batch.iter().map(|r| r.id.clone()).collect(),
                        error: e.to_string(),
                    });
                }
            }
        }

        summary
    }

    async fn upsert_batch(&self, batch: &[EmbeddingRecord], retries: &mut u32) -> Result<usize> {
        let mut attempt: u32 = 0;

        loop {
            match self.store.upsert(&self.spec.name, batch).await {
                Ok(count) => return Ok(count),
                Err(AppError::RateLimited(message)) if attempt < self.settings.max_retries => {
                    let delay = self
                        .settings
                        .backoff_base
                        .saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        index = %self.spec.name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        %message,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    *retries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// At most `k` matches, highest score first.
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        if vector.len() != self.spec.dimensions {
            return Err(AppError::InvalidInput(format!(
                "Query vector has {} dimensions, index '{}' expects {}",
                vector.len(),
                self.spec.name,
                self.spec.dimensions
            )));
        }

        let mut matches = self.store.query(&self.spec.name, vector, k).await?;
        matches.truncate(k);
        Ok(matches)
    }

    /// Delete the records of `source` whose chunk position is `>= keep`.
    ///
    /// Returns the number of deleted records.
    pub async fn prune_source(&self, source: &str, keep: usize) -> Result<usize> {
        let prefix = chunk_id_prefix(source);
        let stale: Vec<String> = self
            .store
            .list_ids(&self.spec.name, &prefix)
            .await?
            .into_iter()
            .filter(|id| chunk_index_from_id(id).is_some_and(|index| index >= keep))
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        info!(index = %self.spec.name, source, count = stale.len(), "Pruning stale chunks");
        self.store.delete(&self.spec.name, &stale).await?;
        Ok(stale.len())
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.store.stats(&self.spec.name).await
    }
}
