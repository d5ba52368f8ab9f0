//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mocks;

use kbase::db::{IndexHandle, IndexManager, IndexSettings, IndexSpec, InMemoryVectorStore};
use kbase::types::DistanceMetric;
use std::sync::Arc;
use std::time::Duration;

pub const INDEX_NAME: &str = "test-index";

/// Index settings without pauses so tests run fast.
pub fn fast_index_settings() -> IndexSettings {
    IndexSettings {
        batch_size: 100,
        batch_delay: Duration::ZERO,
        max_retries: 2,
        backoff_base: Duration::from_millis(1),
        ready_timeout: Duration::from_secs(1),
        ready_poll_interval: Duration::from_millis(5),
    }
}

pub fn index_spec(dimensions: usize) -> IndexSpec {
    IndexSpec {
        name: INDEX_NAME.to_string(),
        dimensions,
        metric: DistanceMetric::Cosine,
    }
}

pub fn memory_manager() -> IndexManager {
    IndexManager::new(Arc::new(InMemoryVectorStore::new()), fast_index_settings())
}

/// A manager and a created, empty index sharing one in-memory store.
pub async fn memory_index(dimensions: usize) -> (IndexManager, IndexHandle) {
    let manager = memory_manager();
    let handle = manager
        .ensure_index(index_spec(dimensions))
        .await
        .expect("create in-memory index");
    (manager, handle)
}
