//! Pinecone vector database integration.
//!
//! Talks to Pinecone's REST API directly: the control plane
//! (`https://api.pinecone.io`) manages indexes, and each index serves its data
//! plane on its own host, which is looked up once through `describe_index` and
//! cached.
//!
//! # Example
//!
//! ```rust,ignore
//! use kbase::db::PineconeStore;
//!
//! let store = PineconeStore::new(api_key, "https://api.pinecone.io".into(),
//!     "aws".into(), "us-east-1".into(), None, Duration::from_secs(30))?;
//! store.create_index("knowledge-base", 768, DistanceMetric::Cosine).await?;
//! let matches = store.query("knowledge-base", &embedding, 5).await?;
//! ```

use crate::db::vectorstore::{IndexInfo, IndexStats, VectorStore};
use crate::types::{AppError, DistanceMetric, EmbeddingRecord, QueryMatch, RecordMetadata, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Value of the `X-Pinecone-API-Version` header.
pub const PINECONE_API_VERSION: &str = "2024-07";

/// Pinecone vector store.
pub struct PineconeStore {
    client: Client,
    api_key: String,
    controller_url: String,
    cloud: String,
    region: String,
    namespace: Option<String>,
    hosts: RwLock<HashMap<String, String>>,
}

// ============= Wire Types =============

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    metric: DistanceMetric,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Serialize)]
struct WireVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a RecordMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedVector>,
}

#[derive(Debug, Deserialize)]
struct FetchedVector {
    id: String,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListedId>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ListedId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceSummary>,
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: usize,
}

impl From<IndexModel> for IndexInfo {
    fn from(model: IndexModel) -> Self {
        IndexInfo {
            name: model.name,
            dimensions: model.dimension,
            metric: model.metric,
            ready: model.status.map(|s| s.ready).unwrap_or(false),
        }
    }
}

/// Metadata as stored by Pinecone. Numbers come back as floats, so fields are
/// read leniently instead of through a strict deserializer.
fn metadata_from_value(value: &Value) -> RecordMetadata {
    let text_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    RecordMetadata {
        text: text_field("text").unwrap_or_default(),
        source: text_field("source").unwrap_or_default(),
        chunk_index: value
            .get("chunk_index")
            .and_then(Value::as_f64)
            .filter(|n| *n >= 0.0)
            .map(|n| n as usize),
        embedding_model: text_field("embedding_model"),
    }
}

fn transport_error(context: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(format!("Pinecone {}: {}", context, err))
    } else {
        AppError::VectorStore(format!("Pinecone {} failed: {}", context, err))
    }
}

impl PineconeStore {
    /// Create a new PineconeStore. No request is made until the first call.
    pub fn new(
        api_key: String,
        controller_url: String,
        cloud: String,
        region: String,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            controller_url: controller_url.trim_end_matches('/').to_string(),
            cloud,
            region,
            namespace: namespace.filter(|ns| !ns.is_empty()),
            hosts: RwLock::new(HashMap::new()),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    /// Send a request and map error statuses onto `AppError`.
    async fn send(&self, context: &str, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => {
                AppError::RateLimited(format!("Pinecone {}: {}", context, body))
            }
            StatusCode::NOT_FOUND => AppError::NotFound(format!("Pinecone {}: {}", context, body)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Configuration(format!(
                "Pinecone rejected the API key ({}): {}",
                status, body
            )),
            _ => AppError::VectorStore(format!(
                "Pinecone {} failed ({}): {}",
                context, status, body
            )),
        })
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        context: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        self.send(context, request)
            .await?
            .json()
            .await
            .map_err(|e| AppError::VectorStore(format!("Invalid Pinecone {} response: {}", context, e)))
    }

    async fn fetch_index_model(&self, name: &str) -> Result<Option<IndexModel>> {
        let url = format!("{}/indexes/{}", self.controller_url, name);
        match self
            .send_json::<IndexModel>("describe index", self.client.get(url))
            .await
        {
            Ok(model) => Ok(Some(model)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Base URL of an index's data plane.
    async fn data_url(&self, index: &str) -> Result<String> {
        let cached = self.hosts.read().get(index).cloned();
        if let Some(host) = cached {
            return Ok(host);
        }

        let model = self
            .fetch_index_model(index)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Index '{}' not found", index)))?;
        let host = model
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::VectorStore(format!("Index '{}' has no host yet", index)))?;

        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };
        let base = base.trim_end_matches('/').to_string();

        debug!(index, host = %base, "Resolved Pinecone data plane host");
        self.hosts.write().insert(index.to_string(), base.clone());
        Ok(base)
    }

    fn with_namespace(&self, mut body: Value) -> Value {
        if let (Some(ns), Some(map)) = (&self.namespace, body.as_object_mut()) {
            map.insert("namespace".to_string(), Value::String(ns.clone()));
        }
        body
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn provider_name(&self) -> &'static str {
        "pinecone"
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexInfo>> {
        Ok(self.fetch_index_model(name).await?.map(IndexInfo::from))
    }

    async fn create_index(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let url = format!("{}/indexes", self.controller_url);
        let body = json!({
            "name": name,
            "dimension": dimensions,
            "metric": metric.as_str(),
            "spec": {
                "serverless": {
                    "cloud": self.cloud,
                    "region": self.region,
                }
            }
        });

        self.send("create index", self.client.post(url).json(&body))
            .await?;
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        let url = format!("{}/indexes", self.controller_url);
        let list: IndexList = self.send_json("list indexes", self.client.get(url)).await?;
        Ok(list.indexes.into_iter().map(IndexInfo::from).collect())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let url = format!("{}/indexes/{}", self.controller_url, name);
        self.send("delete index", self.client.delete(url)).await?;
        self.hosts.write().remove(name);
        Ok(())
    }

    async fn upsert(&self, index: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/vectors/upsert", self.data_url(index).await?);
        let vectors: Vec<WireVector<'_>> = records
            .iter()
            .map(|r| WireVector {
                id: &r.id,
                values: &r.values,
                metadata: &r.metadata,
            })
            .collect();
        let body = self.with_namespace(json!({ "vectors": vectors }));

        let response: UpsertResponse = self
            .send_json("upsert", self.client.post(url).json(&body))
            .await?;
        Ok(response.upserted_count)
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let url = format!("{}/query", self.data_url(index).await?);
        let body = self.with_namespace(json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        }));

        let response: QueryResponse = self
            .send_json("query", self.client.post(url).json(&body))
            .await?;

        let mut matches: Vec<QueryMatch> = response
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.as_ref().map(metadata_from_value),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn fetch(&self, index: &str, ids: &[String]) -> Result<Vec<EmbeddingRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/vectors/fetch", self.data_url(index).await?);
        let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        if let Some(ns) = &self.namespace {
            params.push(("namespace", ns.as_str()));
        }

        let mut response: FetchResponse = self
            .send_json("fetch", self.client.get(url).query(&params))
            .await?;

        // Keep request order
        Ok(ids
            .iter()
            .filter_map(|id| response.vectors.remove(id))
            .map(|v| EmbeddingRecord {
                metadata: v.metadata.as_ref().map(metadata_from_value).unwrap_or_default(),
                id: v.id,
                values: v.values,
            })
            .collect())
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/vectors/delete", self.data_url(index).await?);
        let body = self.with_namespace(json!({ "ids": ids }));

        self.send("delete", self.client.post(url).json(&body))
            .await?;
        Ok(ids.len())
    }

    async fn list_ids(&self, index: &str, prefix: &str) -> Result<Vec<String>> {
        let url = format!("{}/vectors/list", self.data_url(index).await?);
        let mut ids = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = vec![("prefix", prefix)];
            if let Some(ns) = &self.namespace {
                params.push(("namespace", ns.as_str()));
            }
            if let Some(t) = &token {
                params.push(("paginationToken", t.as_str()));
            }

            let page: ListResponse = self
                .send_json("list", self.client.get(&url).query(&params))
                .await?;
            ids.extend(page.vectors.into_iter().map(|v| v.id));

            match page.pagination.and_then(|p| p.next).filter(|n| !n.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn stats(&self, index: &str) -> Result<IndexStats> {
        let url = format!("{}/describe_index_stats", self.data_url(index).await?);
        let response: StatsResponse = self
            .send_json("describe index stats", self.client.post(url).json(&json!({})))
            .await?;

        let total_vector_count = match &self.namespace {
            Some(ns) => response
                .namespaces
                .get(ns)
                .map(|summary| summary.vector_count)
                .unwrap_or(0),
            None => response.total_vector_count,
        };

        Ok(IndexStats {
            total_vector_count,
            dimensions: response.dimension,
        })
    }
}
