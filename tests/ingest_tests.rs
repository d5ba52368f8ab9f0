//! Ingestion of temporary document folders into an in-memory index.

mod common;

use common::mocks::{MOCK_DIMENSIONS, MOCK_EMBED_MODEL, MockEmbedder};
use common::{INDEX_NAME, fast_index_settings, index_spec};
use kbase::db::{IndexManager, InMemoryVectorStore, VectorStore};
use kbase::rag::chunker::chunk_id;
use kbase::rag::ingest::{IngestEvent, IngestObserver};
use kbase::rag::{IngestOutcome, IngestReport, IngestSettings, Ingestor};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

struct Harness {
    store: Arc<dyn VectorStore>,
    ingestor: Ingestor,
}

fn harness(embedder: MockEmbedder, settings: IngestSettings) -> Harness {
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let manager = IndexManager::new(Arc::clone(&store), fast_index_settings());
    let ingestor = Ingestor::new(
        Arc::new(embedder),
        manager,
        index_spec(MOCK_DIMENSIONS),
        settings,
    )
    .unwrap();
    Harness { store, ingestor }
}

fn small_chunks() -> IngestSettings {
    IngestSettings {
        chunk_size: 10,
        chunk_overlap: 2,
        ..IngestSettings::default()
    }
}

fn words(prefix: &str, n: usize) -> String {
    (0..n)
        .map(|i| format!("{}{}", prefix, i))
        .collect::<Vec<_>>()
        .join(" ")
}

async fn completed(ingestor: &Ingestor, dir: &Path) -> IngestReport {
    match ingestor.run(dir).await.unwrap() {
        IngestOutcome::Completed(report) => report,
        other => panic!("expected a completed run, got {:?}", other),
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl IngestObserver for RecordingObserver {
    fn on_event(&self, event: &IngestEvent<'_>) {
        let line = match event {
            IngestEvent::FilesFound { count } => format!("found {}", count),
            IngestEvent::FileChunked { source, chunks } => format!("chunked {} {}", source, chunks),
            IngestEvent::FileSkipped { source, reason } => format!("skipped {} {}", source, reason),
            IngestEvent::IndexReady { name } => format!("ready {}", name),
            IngestEvent::FileStored {
                source, upserted, ..
            } => format!("stored {} {}", source, upserted),
        };
        self.events.lock().push(line);
    }
}

#[tokio::test]
async fn test_missing_folder_is_created() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("documents");
    let h = harness(MockEmbedder::new(), small_chunks());

    let outcome = h.ingestor.run(&dir).await.unwrap();

    assert_eq!(outcome, IngestOutcome::FolderCreated(dir.clone()));
    assert!(dir.is_dir());
    // Nothing to write, so the index is never created
    assert!(h.store.describe_index(INDEX_NAME).await.unwrap().is_none());
}

#[tokio::test]
async fn test_folder_without_text_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "not picked up").unwrap();
    let h = harness(MockEmbedder::new(), small_chunks());

    let outcome = h.ingestor.run(dir.path()).await.unwrap();

    assert_eq!(outcome, IngestOutcome::NoDocuments(dir.path().to_path_buf()));
}

#[tokio::test]
async fn test_empty_file_is_skipped_and_others_ingested() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), words("a", 25)).unwrap();
    std::fs::write(dir.path().join("b.txt"), "  \n\t ").unwrap();
    std::fs::write(dir.path().join("c.TXT"), words("c", 5)).unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let h = harness(MockEmbedder::new(), small_chunks());
    let ingestor = h.ingestor.with_observer(observer.clone());

    let report = completed(&ingestor, dir.path()).await;

    assert_eq!(report.files_found, 3);
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.files_skipped, 1);
    // 25 words with step 8: windows at 0, 8, 16, 24
    assert_eq!(report.chunks_created, 4 + 1);
    assert_eq!(report.records_upserted, 5);
    assert_eq!(report.total_vectors, Some(5));

    let events = observer.events.lock().clone();
    assert_eq!(
        events,
        vec![
            "found 3",
            "chunked a.txt 4",
            "ready test-index",
            "stored a.txt 4",
            "skipped b.txt empty",
            "chunked c.TXT 1",
            "stored c.TXT 1",
        ]
    );
}

#[tokio::test]
async fn test_records_carry_source_and_model() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("faq.txt"), words("w", 12)).unwrap();
    let h = harness(MockEmbedder::new(), small_chunks());

    completed(&h.ingestor, dir.path()).await;

    let ids = vec![chunk_id("faq.txt", 0), chunk_id("faq.txt", 1)];
    let records = h.store.fetch(INDEX_NAME, &ids).await.unwrap();
    assert_eq!(records.len(), 2);
    for (position, record) in records.iter().enumerate() {
        assert_eq!(record.metadata.source, "faq.txt");
        assert_eq!(record.metadata.chunk_index, Some(position));
        assert_eq!(record.metadata.embedding_model.as_deref(), Some(MOCK_EMBED_MODEL));
    }
    assert!(records[1].metadata.text.starts_with("w8 w9 w10"));
}

#[tokio::test]
async fn test_metadata_text_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    // 300 words of 9 characters each, one chunk of about 3000 characters
    let long = (0..300)
        .map(|i| format!("word{:05}", i))
        .collect::<Vec<_>>()
        .join(" ");
    std::fs::write(dir.path().join("long.txt"), long).unwrap();

    let h = harness(
        MockEmbedder::new(),
        IngestSettings {
            chunk_size: 500,
            chunk_overlap: 50,
            metadata_text_limit: 1000,
            ..IngestSettings::default()
        },
    );
    completed(&h.ingestor, dir.path()).await;

    let records = h
        .store
        .fetch(INDEX_NAME, &[chunk_id("long.txt", 0)])
        .await
        .unwrap();
    assert_eq!(records[0].metadata.text.chars().count(), 1000);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), words("a", 25)).unwrap();
    let h = harness(MockEmbedder::new(), small_chunks());

    let first = completed(&h.ingestor, dir.path()).await;
    let second = completed(&h.ingestor, dir.path()).await;

    assert_eq!(first.total_vectors, Some(4));
    assert_eq!(second.total_vectors, Some(4));
    assert_eq!(second.stale_records_deleted, 0);
}

#[tokio::test]
async fn test_shrunk_file_prunes_stale_chunks_and_updates_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, words("old", 25)).unwrap();
    std::fs::write(dir.path().join("b.txt"), words("b", 25)).unwrap();
    let h = harness(MockEmbedder::new(), small_chunks());

    completed(&h.ingestor, dir.path()).await;
    assert_eq!(h.store.stats(INDEX_NAME).await.unwrap().total_vector_count, 8);

    std::fs::write(&path, words("new", 9)).unwrap();
    let report = completed(&h.ingestor, dir.path()).await;

    assert_eq!(report.stale_records_deleted, 3);
    // a.txt now has 1 chunk, b.txt keeps its 4
    assert_eq!(report.total_vectors, Some(5));

    let records = h
        .store
        .fetch(INDEX_NAME, &[chunk_id("a.txt", 0), chunk_id("a.txt", 1)])
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].metadata.text.starts_with("new0"));
}

#[tokio::test]
async fn test_files_whose_names_sanitize_alike_are_kept_apart() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes 1.txt"), "alpha beta gamma delta").unwrap();
    std::fs::write(dir.path().join("notes_1.txt"), "omega psi chi").unwrap();
    let h = harness(MockEmbedder::new(), small_chunks());

    let report = completed(&h.ingestor, dir.path()).await;

    assert_eq!(report.records_upserted, 2);
    assert_eq!(report.stale_records_deleted, 0);
    assert_eq!(report.total_vectors, Some(2));

    let records = h
        .store
        .fetch(
            INDEX_NAME,
            &[chunk_id("notes 1.txt", 0), chunk_id("notes_1.txt", 0)],
        )
        .await
        .unwrap();
    let mut texts: Vec<(String, String)> = records
        .into_iter()
        .map(|r| (r.metadata.source, r.metadata.text))
        .collect();
    texts.sort();
    assert_eq!(
        texts,
        vec![
            ("notes 1.txt".to_string(), "alpha beta gamma delta".to_string()),
            ("notes_1.txt".to_string(), "omega psi chi".to_string()),
        ]
    );

    // A second run must not prune one file's records on behalf of the other
    let rerun = completed(&h.ingestor, dir.path()).await;
    assert_eq!(rerun.stale_records_deleted, 0);
    assert_eq!(rerun.total_vectors, Some(2));
}

#[tokio::test]
async fn test_failing_chunk_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    // The second window (words 8..18) holds the poison word
    let mut text: Vec<String> = (0..20).map(|i| format!("w{}", i)).collect();
    text[12] = "poison".to_string();
    std::fs::write(dir.path().join("a.txt"), text.join(" ")).unwrap();

    let h = harness(MockEmbedder::failing_on("poison"), small_chunks());
    let report = completed(&h.ingestor, dir.path()).await;

    assert_eq!(report.chunks_created, 3);
    assert_eq!(report.chunks_embedded, 2);
    assert_eq!(report.embed_failures, 1);
    assert_eq!(report.records_upserted, 2);
    assert_eq!(report.files_processed, 1);
}

#[tokio::test]
async fn test_dimension_mismatch_aborts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), words("a", 5)).unwrap();

    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    store
        .create_index(INDEX_NAME, MOCK_DIMENSIONS + 1, Default::default())
        .await
        .unwrap();
    let ingestor = Ingestor::new(
        Arc::new(MockEmbedder::new()),
        IndexManager::new(store, fast_index_settings()),
        index_spec(MOCK_DIMENSIONS),
        small_chunks(),
    )
    .unwrap();

    let err = ingestor.run(dir.path()).await.unwrap_err();
    assert!(matches!(err, kbase::AppError::Configuration(_)));
}

#[test]
fn test_invalid_chunk_settings_are_rejected() {
    let result = Ingestor::new(
        Arc::new(MockEmbedder::new()),
        IndexManager::new(Arc::new(InMemoryVectorStore::new()), fast_index_settings()),
        index_spec(MOCK_DIMENSIONS),
        IngestSettings {
            chunk_size: 10,
            chunk_overlap: 10,
            ..IngestSettings::default()
        },
    );
    assert!(result.is_err());
}
