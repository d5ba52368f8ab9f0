use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= Chunk & Index Record Types =============

/// A bounded window of a source document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub index: usize,
}

/// Metadata stored next to every vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecordMetadata {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

/// A vector plus metadata, keyed by chunk id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl EmbeddingRecord {
    /// Build a record for `chunk`, truncating the stored text to `text_limit` characters.
    pub fn from_chunk(chunk: &Chunk, values: Vec<f32>, text_limit: usize, model: &str) -> Self {
        Self {
            id: chunk.id.clone(),
            values,
            metadata: RecordMetadata {
                text: truncate_chars(&chunk.text, text_limit),
                source: chunk.source.clone(),
                chunk_index: Some(chunk.index),
                embedding_model: Some(model.to_string()),
            },
        }
    }
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<RecordMetadata>,
}

/// Similarity metric of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dotproduct,
    Euclidean,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Dotproduct => "dotproduct",
            DistanceMetric::Euclidean => "euclidean",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dotproduct" | "dot" => Ok(DistanceMetric::Dotproduct),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            other => Err(AppError::Configuration(format!(
                "Unknown distance metric '{}'",
                other
            ))),
        }
    }
}

/// Truncate to at most `limit` Unicode scalar values.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

// ============= Conversation Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a session's chat history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            timestamp: Utc::now(),
        }
    }
}

// ============= RAG Answer Types =============

/// Stage of the answering pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    Embedding,
    Retrieval,
    Generation,
    Timeout,
}

/// Result of one question through the pipeline. Never an error: failures are a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum RagAnswer {
    Answered {
        answer: String,
        context: String,
        num_chunks: usize,
        sources: Vec<String>,
    },
    NoContext {
        message: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

impl RagAnswer {
    /// Text shown to the user. Failures are prefixed with `Error:`.
    pub fn answer(&self) -> String {
        match self {
            RagAnswer::Answered { answer, .. } => answer.clone(),
            RagAnswer::NoContext { message } => message.clone(),
            RagAnswer::Failed { message, .. } => format!("Error: {}", message),
        }
    }

    pub fn context(&self) -> &str {
        match self {
            RagAnswer::Answered { context, .. } => context,
            _ => "",
        }
    }

    pub fn num_chunks(&self) -> usize {
        match self {
            RagAnswer::Answered { num_chunks, .. } => *num_chunks,
            _ => 0,
        }
    }

    pub fn sources(&self) -> &[String] {
        match self {
            RagAnswer::Answered { sources, .. } => sources,
            _ => &[],
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RagAnswer::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RagAnswer::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn status(&self) -> AnswerStatus {
        match self {
            RagAnswer::Answered { .. } => AnswerStatus::Answered,
            RagAnswer::NoContext { .. } => AnswerStatus::NoContext,
            RagAnswer::Failed { .. } => AnswerStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    NoContext,
    Failed,
}

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DebugInfo {
    pub num_chunks: usize,
    pub context: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub status: AnswerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl ChatResponse {
    pub fn from_answer(result: &RagAnswer, include_debug: bool) -> Self {
        Self {
            answer: result.answer(),
            sources: result.sources().to_vec(),
            status: result.status(),
            error_kind: result.failure_kind(),
            debug: include_debug.then(|| DebugInfo {
                num_chunks: result.num_chunks(),
                context: result.context().to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub messages: usize,
    pub queries: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub messages: Vec<ChatTurn>,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub email: String,
    pub show_debug: bool,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DebugToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExamplesResponse {
    pub questions: Vec<String>,
}

// ============= Authentication Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Session id
    pub sub: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::RateLimited(_) | AppError::Timeout(_))
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Embedding(_) | AppError::VectorStore(_) | AppError::LLM(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Configuration(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
