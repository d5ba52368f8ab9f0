//! Question answering over the knowledge base.
//!
//! [`RagPipeline::answer`] runs four stages in order: embed the question,
//! retrieve the nearest chunks, assemble them into a context block, and ask
//! the LLM to answer from that context. Every stage has a deadline, and any
//! failure comes back as [`RagAnswer::Failed`] instead of an error.

use crate::db::IndexHandle;
use crate::llm::LLMClient;
use crate::rag::embeddings::Embedder;
use crate::types::{AppError, FailureKind, QueryMatch, RagAnswer, Result};
use crate::utils::toml_config::RagConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Source label used when a record carries no source.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Separator between chunks in the assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Retrieval and prompting parameters.
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub top_k: usize,
    pub prompt_template: String,
    pub no_results_message: String,
    pub call_timeout: Duration,
}

impl RagSettings {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            top_k: config.top_k,
            prompt_template: config.prompt_template.clone(),
            no_results_message: config.no_results_message.clone(),
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

/// Retrieved chunks joined for the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub context: String,
    pub num_chunks: usize,
    pub sources: Vec<String>,
}

/// Build the context block from query matches.
///
/// Matches are taken highest score first; matches without text are skipped.
/// Returns `None` when no usable chunk remains.
pub fn assemble_context(matches: &[QueryMatch]) -> Option<AssembledContext> {
    let mut ordered: Vec<&QueryMatch> = matches.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut texts = Vec::new();
    let mut sources = Vec::new();

    for m in ordered {
        let Some(metadata) = &m.metadata else {
            continue;
        };
        if metadata.text.trim().is_empty() {
            continue;
        }

        texts.push(metadata.text.as_str());
        sources.push(if metadata.source.is_empty() {
            UNKNOWN_SOURCE
        } else {
            metadata.source.as_str()
        });
    }

    if texts.is_empty() {
        return None;
    }

    Some(AssembledContext {
        context: texts.join(CONTEXT_SEPARATOR),
        num_chunks: texts.len(),
        sources: dedup_sources(sources),
    })
}

/// Remove repeated sources, keeping the first occurrence of each.
pub fn dedup_sources<I, S>(sources: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique: Vec<String> = Vec::new();
    for source in sources {
        let source = source.as_ref();
        if !unique.iter().any(|seen| seen == source) {
            unique.push(source.to_string());
        }
    }
    unique
}

/// Substitute `{context}` and `{question}` in one pass, so placeholder text
/// inside the context or the question is left untouched.
pub fn render_prompt(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

/// Embed, retrieve, assemble, generate.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    index: IndexHandle,
    llm: Arc<dyn LLMClient>,
    settings: RagSettings,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: IndexHandle,
        llm: Arc<dyn LLMClient>,
        settings: RagSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            settings,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Answer `question` from the knowledge base. Never returns an error.
    pub async fn answer(&self, question: &str) -> RagAnswer {
        let question = question.trim();
        if question.is_empty() {
            return RagAnswer::Failed {
                kind: FailureKind::InvalidInput,
                message: "Please enter a question.".to_string(),
            };
        }

        let started = Instant::now();
        let result = self.run(question).await;

        match &result {
            RagAnswer::Answered {
                num_chunks,
                sources,
                ..
            } => info!(
                num_chunks,
                sources = ?sources,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Answered question"
            ),
            RagAnswer::NoContext { .. } => info!("No relevant chunks for question"),
            RagAnswer::Failed { kind, message } => {
                warn!(kind = ?kind, error = %message, "Question failed")
            }
        }

        result
    }

    async fn run(&self, question: &str) -> RagAnswer {
        debug!(question, "Embedding question");
        let vector = match self
            .with_deadline("Embedding the question", self.embedder.embed_query(question))
            .await
        {
            Ok(vector) => vector,
            Err(e) => return Self::failed(FailureKind::Embedding, e),
        };

        let matches = match self
            .with_deadline(
                "Searching the knowledge base",
                self.index.query(&vector, self.settings.top_k),
            )
            .await
        {
            Ok(matches) => matches,
            Err(e) => return Self::failed(FailureKind::Retrieval, e),
        };
        debug!(matches = matches.len(), "Retrieved matches");

        self.warn_on_model_mismatch(&matches);

        let Some(assembled) = assemble_context(&matches) else {
            return RagAnswer::NoContext {
                message: self.settings.no_results_message.clone(),
            };
        };

        let prompt = render_prompt(&self.settings.prompt_template, &assembled.context, question);

        match self
            .with_deadline("Generating the answer", self.llm.generate(&prompt))
            .await
        {
            Ok(answer) => RagAnswer::Answered {
                answer,
                context: assembled.context,
                num_chunks: assembled.num_chunks,
                sources: assembled.sources,
            },
            Err(e) => Self::failed(FailureKind::Generation, e),
        }
    }

    async fn with_deadline<T>(
        &self,
        stage: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "{} took longer than {}s",
                stage,
                self.settings.call_timeout.as_secs()
            ))),
        }
    }

    fn failed(stage: FailureKind, error: AppError) -> RagAnswer {
        let kind = match error {
            AppError::Timeout(_) => FailureKind::Timeout,
            AppError::InvalidInput(_) => FailureKind::InvalidInput,
            _ => stage,
        };
        RagAnswer::Failed {
            kind,
            message: error.to_string(),
        }
    }

    fn warn_on_model_mismatch(&self, matches: &[QueryMatch]) {
        let active = self.embedder.model_id();
        let foreign = matches
            .iter()
            .filter_map(|m| m.metadata.as_ref()?.embedding_model.as_deref())
            .find(|model| *model != active);

        if let Some(model) = foreign {
            warn!(
                stored_model = model,
                active_model = active,
                index = self.index.name(),
                "Index contains vectors from a different embedding model; re-run ingestion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordMetadata;

    fn hit(id: &str, score: f32, text: &str, source: &str) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            score,
            metadata: Some(RecordMetadata {
                text: text.to_string(),
                source: source.to_string(),
                chunk_index: None,
                embedding_model: None,
            }),
        }
    }

    #[test]
    fn test_dedup_sources_keeps_first_seen_order() {
        assert_eq!(
            dedup_sources(["A", "A", "B", "A", "C"]),
            vec!["A".to_string(), "B".to_string(), "C".to_string()]
        );
        assert!(dedup_sources(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_assemble_context_orders_by_score_and_joins() {
        let matches = vec![
            hit("2", 0.5, "second", "b.txt"),
            hit("1", 0.9, "first", "a.txt"),
            hit("3", 0.1, "third", "a.txt"),
        ];

        let assembled = assemble_context(&matches).unwrap();
        assert_eq!(assembled.context, "first\n\nsecond\n\nthird");
        assert_eq!(assembled.num_chunks, 3);
        assert_eq!(assembled.sources, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_assemble_context_skips_matches_without_text() {
        let mut bare = hit("x", 0.99, "", "x.txt");
        bare.metadata = None;
        let matches = vec![bare, hit("y", 0.8, "   ", "y.txt"), hit("z", 0.7, "kept", "")];

        let assembled = assemble_context(&matches).unwrap();
        assert_eq!(assembled.num_chunks, 1);
        assert_eq!(assembled.context, "kept");
        assert_eq!(assembled.sources, vec![UNKNOWN_SOURCE]);
    }

    #[test]
    fn test_assemble_context_empty() {
        assert!(assemble_context(&[]).is_none());
    }

    #[test]
    fn test_render_prompt_single_pass() {
        let prompt = render_prompt(
            "Context:\n{context}\nQ: {question} {other}",
            "mentions {question} literally",
            "what?",
        );
        assert_eq!(
            prompt,
            "Context:\nmentions {question} literally\nQ: what? {other}"
        );
    }
}
