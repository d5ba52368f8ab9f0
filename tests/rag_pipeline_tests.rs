//! Question answering over an in-memory index with mock providers.

mod common;

use common::mocks::{MOCK_DIMENSIONS, MOCK_EMBED_MODEL, MockEmbedder, MockLLMClient};
use common::{index_spec, memory_index, memory_manager};
use kbase::db::{IndexHandle, IndexManager, InMemoryVectorStore, VectorStore};
use kbase::rag::{IngestOutcome, IngestSettings, Ingestor, RagPipeline, RagSettings};
use kbase::types::{EmbeddingRecord, FailureKind, RagAnswer, RecordMetadata};
use std::sync::Arc;
use std::time::Duration;

fn settings(top_k: usize) -> RagSettings {
    RagSettings {
        top_k,
        call_timeout: Duration::from_secs(5),
        ..RagSettings::default()
    }
}

fn pipeline(
    embedder: &MockEmbedder,
    index: IndexHandle,
    llm: &MockLLMClient,
    settings: RagSettings,
) -> RagPipeline {
    RagPipeline::new(
        Arc::new(embedder.clone()),
        index,
        Arc::new(llm.clone()),
        settings,
    )
}

fn record(id: &str, text: &str, source: &str) -> EmbeddingRecord {
    EmbeddingRecord {
        id: id.to_string(),
        values: MockEmbedder::vector(text),
        metadata: RecordMetadata {
            text: text.to_string(),
            source: source.to_string(),
            chunk_index: Some(0),
            embedding_model: Some(MOCK_EMBED_MODEL.to_string()),
        },
    }
}

#[tokio::test]
async fn test_empty_index_short_circuits_without_llm_call() {
    let (_, index) = memory_index(MOCK_DIMENSIONS).await;
    let embedder = MockEmbedder::new();
    let llm = MockLLMClient::new("should not be used");
    let rag = pipeline(&embedder, index, &llm, settings(5));

    let answer = rag.answer("What courses are offered?").await;

    assert!(matches!(answer, RagAnswer::NoContext { .. }));
    assert_eq!(answer.num_chunks(), 0);
    assert!(answer.sources().is_empty());
    assert_eq!(answer.answer(), RagSettings::default().no_results_message);
    assert!(!answer.is_error());
    assert_eq!(llm.calls(), 0);
    assert_eq!(embedder.calls(), 1);
}

/// A record whose cosine score against `query` falls as `rank` grows.
fn ranked_record(id: &str, source: &str, query: &[f32], rank: usize) -> EmbeddingRecord {
    let hot = query
        .iter()
        .position(|v| *v > 0.0)
        .expect("query vector has a non-zero component");
    let mut values = query.to_vec();
    let idx = (hot + 1) % values.len();
    values[idx] = rank as f32 * 0.5;

    EmbeddingRecord {
        values,
        ..record(id, &format!("courses rank {}", rank), source)
    }
}

#[tokio::test]
async fn test_sources_are_deduplicated_in_first_seen_order() {
    let (_, index) = memory_index(MOCK_DIMENSIONS).await;
    let query = MockEmbedder::vector("courses");
    let records: Vec<EmbeddingRecord> = ["A", "A", "B", "A", "C"]
        .iter()
        .enumerate()
        .map(|(rank, source)| ranked_record(&rank.to_string(), source, &query, rank))
        .collect();
    assert!(index.upsert(&records).await.is_complete());

    let llm = MockLLMClient::new("Five courses.");
    let rag = pipeline(&MockEmbedder::new(), index, &llm, settings(5));

    let answer = rag.answer("courses").await;

    assert_eq!(answer.answer(), "Five courses.");
    assert_eq!(answer.num_chunks(), 5);
    assert_eq!(answer.sources(), ["A", "B", "C"]);
    assert!(answer.context().starts_with("courses rank 0\n\ncourses rank 1"));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_prompt_contains_context_and_question() {
    let (_, index) = memory_index(MOCK_DIMENSIONS).await;
    index
        .upsert(&[record("1", "Enrollment opens every Monday.", "faq.txt")])
        .await;

    let llm = MockLLMClient::new("Mondays.");
    let rag = pipeline(&MockEmbedder::new(), index, &llm, settings(3));

    let answer = rag.answer("  When does enrollment open?  ").await;

    let prompt = llm.last_prompt().unwrap();
    assert!(prompt.contains("Enrollment opens every Monday."));
    assert!(prompt.contains("When does enrollment open?"));
    assert_eq!(answer.context(), "Enrollment opens every Monday.");
    assert_eq!(answer.sources(), ["faq.txt"]);
}

#[tokio::test]
async fn test_failing_embedder_is_contained() {
    let (_, index) = memory_index(MOCK_DIMENSIONS).await;
    let llm = MockLLMClient::new("unused");
    let rag = pipeline(&MockEmbedder::failing(), index, &llm, settings(5));

    let answer = rag.answer("What courses are offered?").await;

    assert!(answer.is_error());
    assert_eq!(answer.failure_kind(), Some(FailureKind::Embedding));
    assert_eq!(answer.num_chunks(), 0);
    assert!(answer.sources().is_empty());
    assert!(answer.answer().starts_with("Error:"));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_failing_llm_is_contained() {
    let (_, index) = memory_index(MOCK_DIMENSIONS).await;
    index.upsert(&[record("1", "courses", "a.txt")]).await;
    let rag = pipeline(&MockEmbedder::new(), index, &MockLLMClient::failing(), settings(5));

    let answer = rag.answer("courses").await;

    assert_eq!(answer.failure_kind(), Some(FailureKind::Generation));
    assert!(answer.answer().contains("Mock LLM failure"));
}

#[tokio::test]
async fn test_missing_index_is_a_retrieval_failure() {
    let index = memory_manager().open(index_spec(MOCK_DIMENSIONS));
    let llm = MockLLMClient::new("unused");
    let rag = pipeline(&MockEmbedder::new(), index, &llm, settings(5));

    let answer = rag.answer("anything").await;

    assert_eq!(answer.failure_kind(), Some(FailureKind::Retrieval));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_slow_llm_times_out() {
    let (_, index) = memory_index(MOCK_DIMENSIONS).await;
    index.upsert(&[record("1", "courses", "a.txt")]).await;
    let llm = MockLLMClient::new("late").slow(Duration::from_millis(500));
    let rag = pipeline(
        &MockEmbedder::new(),
        index,
        &llm,
        RagSettings {
            call_timeout: Duration::from_millis(50),
            ..settings(5)
        },
    );

    let answer = rag.answer("courses").await;

    assert_eq!(answer.failure_kind(), Some(FailureKind::Timeout));
}

#[tokio::test]
async fn test_blank_question_is_rejected_before_embedding() {
    let (_, index) = memory_index(MOCK_DIMENSIONS).await;
    let embedder = MockEmbedder::new();
    let rag = pipeline(&embedder, index, &MockLLMClient::new("unused"), settings(5));

    let answer = rag.answer("   ").await;

    assert_eq!(answer.failure_kind(), Some(FailureKind::InvalidInput));
    assert_eq!(embedder.calls(), 0);
}

/// 470 rotating filler words followed by 50 words about refunds. The second
/// 500/50 window starts at word 450 and is dominated by the refund text.
fn faq_text() -> String {
    let mut words: Vec<String> = (0..470).map(|i| format!("filler{}", i % 40)).collect();
    for _ in 0..25 {
        words.push("refund".to_string());
        words.push("deadline".to_string());
    }
    words.join(" ")
}

#[tokio::test]
async fn test_ingest_then_answer_from_second_chunk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("faq.txt"), faq_text()).unwrap();

    let embedder = MockEmbedder::new();
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let manager = IndexManager::new(Arc::clone(&store), common::fast_index_settings());
    let ingest_settings = IngestSettings {
        chunk_size: 500,
        chunk_overlap: 50,
        ..IngestSettings::default()
    };
    let ingestor = Ingestor::new(
        Arc::new(embedder.clone()),
        manager,
        index_spec(MOCK_DIMENSIONS),
        ingest_settings,
    )
    .unwrap();

    let IngestOutcome::Completed(report) = ingestor.run(dir.path()).await.unwrap() else {
        panic!("expected a completed run");
    };
    assert_eq!(report.chunks_created, 2);
    assert_eq!(report.records_upserted, 2);
    assert_eq!(report.total_vectors, Some(2));

    // Same store, so the query side sees what ingestion wrote
    let index = IndexManager::new(store, common::fast_index_settings())
        .open(index_spec(MOCK_DIMENSIONS));

    let llm = MockLLMClient::echo();
    let rag = pipeline(&embedder, index, &llm, settings(1));

    let answer = rag.answer("What is the refund deadline?").await;

    assert!(matches!(answer, RagAnswer::Answered { .. }));
    assert_eq!(answer.sources(), ["faq.txt"]);
    assert_eq!(answer.num_chunks(), 1);
    assert!(answer.context().starts_with("filler10"));
    assert!(answer.context().contains("refund deadline"));
    assert!(llm.last_prompt().unwrap().contains("refund deadline"));
}
