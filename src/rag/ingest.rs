//! Offline ingestion of a documents folder into the vector index.
//!
//! Files are processed one at a time in file-name order. For each file the
//! text is chunked, the chunks are embedded with bounded concurrency, the
//! records are upserted, and records left over from a longer previous
//! version of the file are pruned. A bad file or chunk is skipped; only a
//! failure to create or verify the index aborts the run.

use crate::db::{IndexHandle, IndexManager, IndexSpec};
use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::Embedder;
use crate::types::{Chunk, EmbeddingRecord, Result};
use crate::utils::toml_config::KbaseConfig;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Chunking and embedding parameters of a run.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub metadata_text_limit: usize,
    pub embed_concurrency: usize,
    /// File extension without the dot
    pub extension: String,
}

impl IngestSettings {
    pub fn from_config(config: &KbaseConfig) -> Self {
        Self {
            chunk_size: config.rag.chunk_size,
            chunk_overlap: config.rag.chunk_overlap,
            metadata_text_limit: config.rag.metadata_text_limit,
            embed_concurrency: config.rag.embed_concurrency,
            extension: config.ingest.extension.clone(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from_config(&KbaseConfig::default())
    }
}

/// Totals of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub embed_failures: usize,
    pub records_upserted: usize,
    pub failed_batches: usize,
    pub stale_records_deleted: usize,
    /// Vectors in the index after the run, if the index was touched and
    /// could be queried
    pub total_vectors: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The documents folder did not exist and was created empty.
    FolderCreated(PathBuf),
    /// The folder holds no matching files.
    NoDocuments(PathBuf),
    Completed(IngestReport),
}

/// Progress notifications for interactive front ends.
#[derive(Debug)]
pub enum IngestEvent<'a> {
    FilesFound { count: usize },
    FileChunked { source: &'a str, chunks: usize },
    FileSkipped { source: &'a str, reason: &'a str },
    IndexReady { name: &'a str },
    FileStored {
        source: &'a str,
        upserted: usize,
        embed_failures: usize,
        failed_batches: usize,
        pruned: usize,
    },
}

pub trait IngestObserver: Send + Sync {
    fn on_event(&self, event: &IngestEvent<'_>);
}

/// Runs ingestion against one index.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    manager: IndexManager,
    spec: IndexSpec,
    chunker: TextChunker,
    settings: IngestSettings,
    observer: Option<Arc<dyn IngestObserver>>,
}

impl Ingestor {
    /// # Errors
    ///
    /// Returns a configuration error for invalid chunk parameters.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        manager: IndexManager,
        spec: IndexSpec,
        settings: IngestSettings,
    ) -> Result<Self> {
        let chunker = TextChunker::new(settings.chunk_size, settings.chunk_overlap)?;

        Ok(Self {
            embedder,
            manager,
            spec,
            chunker,
            settings,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn emit(&self, event: IngestEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    /// Ingest every matching file directly inside `dir`.
    ///
    /// # Errors
    ///
    /// Fails only if the folder cannot be created or listed, or the index
    /// cannot be created or verified.
    pub async fn run(&self, dir: &Path) -> Result<IngestOutcome> {
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await?;
            info!(dir = %dir.display(), "Created documents folder");
            return Ok(IngestOutcome::FolderCreated(dir.to_path_buf()));
        }

        let files = self.list_documents(dir).await?;
        if files.is_empty() {
            info!(dir = %dir.display(), extension = %self.settings.extension, "No documents found");
            return Ok(IngestOutcome::NoDocuments(dir.to_path_buf()));
        }

        let mut report = IngestReport {
            files_found: files.len(),
            ..Default::default()
        };
        self.emit(IngestEvent::FilesFound { count: files.len() });
        info!(dir = %dir.display(), files = files.len(), "Starting ingestion");

        let mut handle: Option<IndexHandle> = None;

        for path in &files {
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let text = match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %source, error = %e, "Skipping unreadable file");
                    report.files_skipped += 1;
                    self.emit(IngestEvent::FileSkipped {
                        source: &source,
                        reason: "unreadable",
                    });
                    continue;
                }
            };

            let chunks = self.chunker.chunk_document(&source, &text);
            if chunks.is_empty() {
                warn!(file = %source, "Skipping empty file");
                report.files_skipped += 1;
                self.emit(IngestEvent::FileSkipped {
                    source: &source,
                    reason: "empty",
                });
                continue;
            }

            report.chunks_created += chunks.len();
            self.emit(IngestEvent::FileChunked {
                source: &source,
                chunks: chunks.len(),
            });

            let index = match &handle {
                Some(index) => index.clone(),
                None => {
                    let index = self.manager.ensure_index(self.spec.clone()).await?;
                    self.emit(IngestEvent::IndexReady { name: index.name() });
                    handle = Some(index.clone());
                    index
                }
            };

            let chunk_count = chunks.len();
            let (records, failures) = self.embed_chunks(chunks).await;
            report.chunks_embedded += records.len();
            report.embed_failures += failures;

            let summary = index.upsert(&records).await;
            report.records_upserted += summary.upserted;
            report.failed_batches += summary.failed_batches.len();

            let pruned = match index.prune_source(&source, chunk_count).await {
                Ok(pruned) => pruned,
                Err(e) => {
                    warn!(file = %source, error = %e, "Failed to prune stale chunks");
                    0
                }
            };
            report.stale_records_deleted += pruned;
            report.files_processed += 1;

            self.emit(IngestEvent::FileStored {
                source: &source,
                upserted: summary.upserted,
                embed_failures: failures,
                failed_batches: summary.failed_batches.len(),
                pruned,
            });
        }

        if let Some(index) = &handle {
            report.total_vectors = match index.stats().await {
                Ok(stats) => Some(stats.total_vector_count),
                Err(e) => {
                    warn!(error = %e, "Could not read index statistics");
                    None
                }
            };
        }

        info!(
            files_processed = report.files_processed,
            files_skipped = report.files_skipped,
            chunks = report.chunks_created,
            upserted = report.records_upserted,
            embed_failures = report.embed_failures,
            failed_batches = report.failed_batches,
            "Ingestion finished"
        );

        Ok(IngestOutcome::Completed(report))
    }

    /// Matching files directly inside `dir`, sorted by file name.
    async fn list_documents(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.settings.extension));

            if matches_extension && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Embed chunks concurrently, keeping chunk order. Returns the records of
    /// the chunks that embedded and the number that failed.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> (Vec<EmbeddingRecord>, usize) {
        let model = self.embedder.model_id().to_string();
        let limit = self.settings.metadata_text_limit;

        let results: Vec<Option<EmbeddingRecord>> = stream::iter(chunks)
            .map(|chunk| {
                let embedder = Arc::clone(&self.embedder);
                let model = model.clone();
                async move {
                    match embedder.embed_document(&chunk.text).await {
                        Ok(values) => Some(EmbeddingRecord::from_chunk(&chunk, values, limit, &model)),
                        Err(e) => {
                            warn!(chunk = %chunk.id, error = %e, "Skipping chunk that failed to embed");
                            None
                        }
                    }
                }
            })
            .buffered(self.settings.embed_concurrency.max(1))
            .collect()
            .await;

        let failures = results.iter().filter(|r| r.is_none()).count();
        (results.into_iter().flatten().collect(), failures)
    }
}
