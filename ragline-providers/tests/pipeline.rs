use ragline_core::engine::RagEngine;
use ragline_core::error::Error;
use ragline_core::rerank::Reranker;
use ragline_core::synth::AnswerKind;
use ragline_providers::mock::{FailingEmbedder, FailingScorer, FixedScorer};
use std::sync::Arc;

const ROSTER: &str = "Name: A\nRole: Engineer\n\nName: B\nRole: Designer";

async fn staffed_engine(reranker: Reranker) -> RagEngine {
    let engine = RagEngine::builder().reranker(reranker).build().await.unwrap();
    engine
        .ingest_chunks("alpha", "Alpha", "Name: A\nRole: Engineer")
        .await
        .unwrap();
    engine
        .ingest_chunks("beta", "Beta", "Name: B\nRole: Designer")
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn test_scorer_reorders_answer_sources() {
    let _ = tracing_subscriber::fmt::try_init();

    let fused = staffed_engine(Reranker::Passthrough)
        .await
        .query("What is A's role?", true)
        .await
        .unwrap();
    assert_eq!(fused.citations.len(), 2);

    // The second fused candidate gets the higher score
    let scorer = Arc::new(FixedScorer::new(vec![0.1, 0.9]));
    let reranked = staffed_engine(Reranker::ModelBacked(scorer.clone()))
        .await
        .query("What is A's role?", true)
        .await
        .unwrap();

    assert_eq!(scorer.calls(), 1);
    assert_eq!(reranked.kind, AnswerKind::Grounded);
    assert!(reranked.text.contains("Engineer"));
    let mut expected = fused.citations.clone();
    expected.reverse();
    assert_eq!(reranked.citations, expected);
    assert_ne!(reranked.text, fused.text);
}

#[tokio::test]
async fn test_failing_scorer_degrades() {
    let engine = RagEngine::builder()
        .reranker(Reranker::model(FailingScorer::default()))
        .build()
        .await
        .unwrap();
    engine.ingest_chunks("team", "Team", ROSTER).await.unwrap();

    let answer = engine.query("What is B's role?", true).await.unwrap();
    assert!(answer.text.contains("Designer"));
}

#[tokio::test]
async fn test_failing_embedder_blocks_ingestion() {
    let engine = RagEngine::builder()
        .embedder(Arc::new(FailingEmbedder::new(384)))
        .build()
        .await
        .unwrap();

    let err = engine
        .ingest_chunks("team", "Team", ROSTER)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { .. }));
    assert_eq!(engine.stats().chunks, 0);
}
