//! TOML-based configuration for kbase
//!
//! Everything the ingestion job, the answering pipeline and the server need is
//! declared in a single TOML file (`kbase.toml`). Secrets are never stored in
//! the file: provider sections name the environment variable that holds them.
//!
//! # Hot Reloading
//!
//! `ConfigManager` keeps the current configuration behind an `ArcSwap` and can
//! watch the file for changes. Components built at startup keep the values they
//! were constructed with; readers that go through the manager see updates.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::types::DistanceMetric;

/// Root configuration structure loaded from kbase.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KbaseConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub ui: UiConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT secret
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,

    /// Session token validity in seconds
    #[serde(default = "default_session_expiry")]
    pub session_expiry: i64,

    /// Minimum password length accepted by the demo login gate
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,

    /// Upper bound on unexpired sessions held in memory
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_jwt_secret_env() -> String {
    "KBASE_JWT_SECRET".to_string()
}

fn default_session_expiry() -> i64 {
    86400
}

fn default_min_password_len() -> usize {
    6
}

fn default_max_sessions() -> usize {
    10_000
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: default_jwt_secret_env(),
            session_expiry: default_session_expiry(),
            min_password_len: default_min_password_len(),
            max_sessions: default_max_sessions(),
        }
    }
}

// ============= Embedding Configuration =============

/// Embedding model used for both documents and questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    Gemini {
        #[serde(default = "default_gemini_key_env")]
        api_key_env: String,
        #[serde(default = "default_gemini_base")]
        api_base: String,
        #[serde(default = "default_gemini_embedding_model")]
        model: String,
        #[serde(default = "default_embedding_dimensions")]
        dimensions: usize,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
        dimensions: usize,
    },
    OpenAI {
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
        dimensions: usize,
    },
}

impl EmbeddingConfig {
    pub fn dimensions(&self) -> usize {
        match self {
            EmbeddingConfig::Gemini { dimensions, .. }
            | EmbeddingConfig::Ollama { dimensions, .. }
            | EmbeddingConfig::OpenAI { dimensions, .. } => *dimensions,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Gemini {
            api_key_env: default_gemini_key_env(),
            api_base: default_gemini_base(),
            model: default_gemini_embedding_model(),
            dimensions: default_embedding_dimensions(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_embedding_dimensions() -> usize {
    768
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Vector Store Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VectorStoreConfig {
    /// Managed Pinecone index (serverless)
    Pinecone {
        #[serde(default = "default_pinecone_key_env")]
        api_key_env: String,
        #[serde(default = "default_pinecone_controller")]
        controller_url: String,
        #[serde(default = "default_pinecone_cloud")]
        cloud: String,
        #[serde(default = "default_pinecone_region")]
        region: String,
        #[serde(default)]
        namespace: Option<String>,
    },
    /// Process-local store; contents are lost on exit
    Memory,
}

fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

fn default_pinecone_controller() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_pinecone_cloud() -> String {
    "aws".to_string()
}

fn default_pinecone_region() -> String {
    "us-east-1".to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        VectorStoreConfig::Pinecone {
            api_key_env: default_pinecone_key_env(),
            controller_url: default_pinecone_controller(),
            cloud: default_pinecone_cloud(),
            region: default_pinecone_region(),
            namespace: None,
        }
    }
}

// ============= Index Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,

    #[serde(default)]
    pub metric: DistanceMetric,

    /// Records per upsert request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between upsert batches
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Retries for a rate-limited batch
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// How long to wait for a newly created index to become ready
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
}

fn default_index_name() -> String {
    "knowledge-base".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_ready_timeout_secs() -> u64 {
    120
}

fn default_ready_poll_ms() -> u64 {
    2000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            metric: DistanceMetric::default(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            ready_timeout_secs: default_ready_timeout_secs(),
            ready_poll_ms: default_ready_poll_ms(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LlmConfig {
    Gemini {
        #[serde(default = "default_gemini_key_env")]
        api_key_env: String,
        #[serde(default = "default_gemini_base")]
        api_base: String,
        #[serde(default = "default_gemini_model")]
        model: String,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
    OpenAI {
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::Gemini {
            api_key_env: default_gemini_key_env(),
            api_base: default_gemini_base(),
            model: default_gemini_model(),
        }
    }
}

// ============= RAG Configuration =============

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a helpful AI assistant for a knowledge base.

Context from knowledge base:
{context}

Question: {question}

Instructions:
- Provide detailed, accurate answers based ONLY on the context
- If the context does not contain the answer, say that you don't know
- Use bullet points for clarity
- Be professional and encouraging";

pub const DEFAULT_NO_RESULTS_MESSAGE: &str =
    "No relevant information found in the knowledge base.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunk window, in words
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Maximum characters of chunk text stored as metadata
    #[serde(default = "default_metadata_text_limit")]
    pub metadata_text_limit: usize,

    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,

    #[serde(default = "default_no_results_message")]
    pub no_results_message: String,

    /// Deadline for each external call made while answering
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Concurrent embedding requests during ingestion
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,

    /// Timeout of outbound HTTP requests
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_top_k() -> usize {
    5
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_metadata_text_limit() -> usize {
    1000
}

fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

fn default_no_results_message() -> String {
    DEFAULT_NO_RESULTS_MESSAGE.to_string()
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_embed_concurrency() -> usize {
    4
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            metadata_text_limit: default_metadata_text_limit(),
            prompt_template: default_prompt_template(),
            no_results_message: default_no_results_message(),
            call_timeout_secs: default_call_timeout_secs(),
            embed_concurrency: default_embed_concurrency(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

// ============= Ingestion & UI Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// File extension picked up by the ingestion job (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("documents")
}

fn default_extension() -> String {
    "txt".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_example_questions")]
    pub example_questions: Vec<String>,
}

fn default_example_questions() -> Vec<String> {
    vec![
        "What courses are offered?".to_string(),
        "Which programs include job placement?".to_string(),
        "What does the data science syllabus cover?".to_string(),
        "How do I enroll?".to_string(),
    ]
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            example_questions: default_example_questions(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl KbaseConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: KbaseConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency. Does not require secrets to be present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than zero".to_string(),
            ));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k must be greater than zero".to_string(),
            ));
        }
        for placeholder in ["{context}", "{question}"] {
            if !rag.prompt_template.contains(placeholder) {
                return Err(ConfigError::ValidationError(format!(
                    "rag.prompt_template must contain the {} placeholder",
                    placeholder
                )));
            }
        }
        if rag.embed_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "rag.embed_concurrency must be at least 1".to_string(),
            ));
        }

        if self.embedding.dimensions() == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.index.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "index.name must not be empty".to_string(),
            ));
        }
        if self.index.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "index.batch_size must be greater than zero".to_string(),
            ));
        }

        if self.auth.session_expiry <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_expiry must be greater than zero".to_string(),
            ));
        }
        if self.auth.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "auth.max_sessions must be greater than zero".to_string(),
            ));
        }

        if self.ingest.extension.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ingest.extension must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Environment variables this configuration reads secrets from
    pub fn required_env_vars(&self) -> Vec<&str> {
        let mut vars = Vec::new();

        match &self.embedding {
            EmbeddingConfig::Gemini { api_key_env, .. }
            | EmbeddingConfig::OpenAI { api_key_env, .. } => vars.push(api_key_env.as_str()),
            EmbeddingConfig::Ollama { .. } => {}
        }

        if let VectorStoreConfig::Pinecone { api_key_env, .. } = &self.vector_store {
            vars.push(api_key_env.as_str());
        }

        match &self.llm {
            LlmConfig::Gemini { api_key_env, .. } | LlmConfig::OpenAI { api_key_env, .. } => {
                vars.push(api_key_env.as_str())
            }
            LlmConfig::Ollama { .. } => {}
        }

        let mut unique = Vec::with_capacity(vars.len());
        for name in vars {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        unique
    }

    /// Verify that every referenced secret is set in the environment
    pub fn validate_env(&self) -> Result<(), ConfigError> {
        for name in self.required_env_vars() {
            self.resolve_env(name)
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;
        }
        Ok(())
    }

    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    pub fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        self.require_env(&self.auth.jwt_secret_env)
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<KbaseConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path so the watcher keeps working if the cwd changes
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = KbaseConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (no file, no watching)
    pub fn from_config(config: KbaseConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("kbase.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<KbaseConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = KbaseConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching the configuration file for changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload = std::time::Instant::now();
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.elapsed() < debounce_duration {
                    continue;
                }

                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match KbaseConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = std::time::Instant::now();
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> String {
        r#"
[server]
host = "0.0.0.0"
port = 8080
log_level = "debug"

[auth]
jwt_secret_env = "TEST_KBASE_JWT"
min_password_len = 8

[embedding]
type = "ollama"
base_url = "http://localhost:11434"
model = "nomic-embed-text"
dimensions = 768

[vector_store]
type = "pinecone"
api_key_env = "TEST_PINECONE_KEY"
namespace = "docs"

[index]
name = "company-kb"
batch_size = 25

[llm]
type = "gemini"
model = "gemini-2.5-flash"

[rag]
top_k = 3
chunk_size = 300
chunk_overlap = 30

[ingest]
documents_dir = "./kb"

[ui]
example_questions = ["How do I enroll?"]
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config = KbaseConfig::from_toml_str(&create_test_config()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.min_password_len, 8);
        assert_eq!(config.embedding.dimensions(), 768);
        assert_eq!(config.index.name, "company-kb");
        assert_eq!(config.index.batch_size, 25);
        assert_eq!(config.index.metric, DistanceMetric::Cosine);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.ingest.documents_dir, PathBuf::from("./kb"));
        assert_eq!(config.ui.example_questions.len(), 1);

        match &config.vector_store {
            VectorStoreConfig::Pinecone {
                namespace, region, ..
            } => {
                assert_eq!(namespace.as_deref(), Some("docs"));
                assert_eq!(region, "us-east-1");
            }
            other => panic!("expected pinecone, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = KbaseConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert_eq!(config.rag.metadata_text_limit, 1000);
        assert_eq!(config.index.batch_size, 50);
        assert_eq!(config.index.batch_delay_ms, 1000);
        assert_eq!(config.ingest.extension, "txt");
        assert_eq!(config.auth.min_password_len, 6);
        assert_eq!(config.auth.max_sessions, 10_000);
        assert!(matches!(config.embedding, EmbeddingConfig::Gemini { .. }));
        assert!(matches!(config.llm, LlmConfig::Gemini { .. }));
    }

    #[test]
    fn test_validation_overlap_must_be_smaller_than_size() {
        let result = KbaseConfig::from_toml_str(
            r#"
[rag]
chunk_size = 50
chunk_overlap = 50
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_template_needs_placeholders() {
        let result = KbaseConfig::from_toml_str(
            r#"
[rag]
prompt_template = "Answer: {question}"
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("{context}"));
    }

    #[test]
    fn test_validation_session_limits() {
        assert!(KbaseConfig::from_toml_str("[auth]\nsession_expiry = 0\n").is_err());
        assert!(KbaseConfig::from_toml_str("[auth]\nmax_sessions = 0\n").is_err());
    }

    #[test]
    fn test_validation_zero_top_k() {
        let result = KbaseConfig::from_toml_str("[rag]\ntop_k = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_required_env_vars() {
        let config = KbaseConfig::from_toml_str(&create_test_config()).unwrap();
        let vars = config.required_env_vars();

        assert!(vars.contains(&"TEST_PINECONE_KEY"));
        assert!(vars.contains(&"GEMINI_API_KEY"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_missing_env_var_reported() {
        let config = KbaseConfig::from_toml_str(
            r#"
[vector_store]
type = "memory"

[embedding]
type = "ollama"
model = "nomic-embed-text"
dimensions = 768

[llm]
type = "openai"
api_key_env = "KBASE_TEST_SURELY_UNSET_KEY"
model = "gpt-4o-mini"
"#,
        )
        .unwrap();

        match config.validate_env() {
            Err(ConfigError::MissingEnvVar(name)) => {
                assert_eq!(name, "KBASE_TEST_SURELY_UNSET_KEY")
            }
            other => panic!("expected MissingEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn test_example_config_is_valid() {
        let config =
            KbaseConfig::from_toml_str(include_str!("../../kbase.example.toml")).unwrap();

        assert_eq!(config.rag.prompt_template, DEFAULT_PROMPT_TEMPLATE);
        assert_eq!(config.rag.no_results_message, DEFAULT_NO_RESULTS_MESSAGE);
        assert_eq!(
            config.required_env_vars(),
            vec!["GEMINI_API_KEY", "PINECONE_API_KEY"]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = KbaseConfig::load("/definitely/not/here/kbase.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_config_manager_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kbase.toml");
        fs::write(&path, "[rag]\ntop_k = 2\n").unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.config().rag.top_k, 2);

        fs::write(&path, "[rag]\ntop_k = 7\n").unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.config().rag.top_k, 7);
    }

    #[test]
    fn test_config_manager_keeps_previous_on_invalid_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kbase.toml");
        fs::write(&path, "[rag]\ntop_k = 2\n").unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        fs::write(&path, "[rag]\ntop_k = 0\n").unwrap();

        assert!(manager.reload().is_err());
        assert_eq!(manager.config().rag.top_k, 2);
    }
}
