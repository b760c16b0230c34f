use ragline_core::engine::RagEngine;
use ragline_core::provider::DenseIndex;
use ragline_core::ragline_index::{ChunkLog, FlatVectorStore, LexicalIndex};
use std::sync::Arc;

#[tokio::test]
async fn test_chunk_log_replay_restores_answers() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("chunks.jsonl");

    {
        let engine = RagEngine::builder()
            .chunk_log(&log_path)
            .build()
            .await
            .unwrap();
        engine
            .ingest_chunks("d1", "Bio", "Name: A\nRole: Engineer")
            .await
            .unwrap();
        engine
            .ingest_chunks("d2", "Office", "# Parking\nVisitors park in lot C.")
            .await
            .unwrap();
    }

    let records = ChunkLog::open(&log_path).unwrap().load().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].chunk_id, "d1#0");
    assert_eq!(records[1].section, "Office > Parking");

    let restored = RagEngine::builder()
        .chunk_log(&log_path)
        .build()
        .await
        .unwrap();
    assert_eq!(restored.stats().chunks, 2);
    assert_eq!(restored.stats().documents, 2);

    let answer = restored.query("What is A's role?", true).await.unwrap();
    assert!(answer.text.contains("Engineer"));

    // New chunks continue the replayed sequence
    let more = restored
        .ingest_chunks("d1", "Bio", "Team: Platform")
        .await
        .unwrap();
    assert_eq!(more[0].chunk_id, "d1#1");
    assert_eq!(ChunkLog::open(&log_path).unwrap().load().unwrap().len(), 3);
}

#[tokio::test]
async fn test_on_disk_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let vectors = Arc::new(FlatVectorStore::new(384));
    let lexical = Arc::new(LexicalIndex::open(dir.path().join("lexical.db")).unwrap());

    let engine = RagEngine::builder()
        .dense_index(vectors.clone())
        .sparse_index(lexical.clone())
        .build()
        .await
        .unwrap();
    engine
        .ingest_chunks("d1", "Bio", "Name: A\nRole: Engineer")
        .await
        .unwrap();

    assert!(vectors.is_dirty());
    let snapshot = dir.path().join("vectors.bin");
    vectors.save(&snapshot).unwrap();

    let reloaded = FlatVectorStore::load(&snapshot).unwrap();
    let fetched = reloaded.fetch(&["d1#0".to_string()]).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert!(fetched[0].is_some());

    assert_eq!(lexical.len().unwrap(), 1);
    assert_eq!(lexical.search("engineer", 5).unwrap()[0].chunk_id, "d1#0");
}
