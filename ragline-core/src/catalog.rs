//! Immutable chunk catalog snapshots
//!
//! Queries read an `Arc<ChunkCatalog>` taken at their start; ingestion builds a new
//! catalog and swaps it in after the indexes have been written. Index hits that are
//! not in a query's snapshot are ignored, so a query never sees a half-ingested
//! document.

use crate::chunker::Chunk;
use std::collections::HashMap;
use std::sync::Arc;

/// Chunks by id plus per-document bookkeeping
#[derive(Debug, Clone, Default)]
pub struct ChunkCatalog {
    chunks: HashMap<String, Arc<Chunk>>,
    next_seq: HashMap<String, usize>,
}

impl ChunkCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.chunks.get(chunk_id).map(Arc::as_ref)
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.chunks.contains_key(chunk_id)
    }

    /// Sequence number the next chunk of `doc_id` gets
    pub fn next_seq(&self, doc_id: &str) -> usize {
        self.next_seq.get(doc_id).copied().unwrap_or(0)
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of documents with at least one chunk
    pub fn documents(&self) -> usize {
        self.next_seq.len()
    }

    /// Chunks of one document in sequence order
    pub fn document_chunks(&self, doc_id: &str) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self
            .chunks
            .values()
            .filter(|c| c.doc_id == doc_id)
            .map(Arc::as_ref)
            .collect();
        chunks.sort_by_key(|c| c.seq);
        chunks
    }

    /// A new snapshot with `chunks` added (replacing equal ids)
    pub fn with_chunks(&self, chunks: &[Chunk]) -> Self {
        let mut next = self.clone();
        for chunk in chunks {
            let seq = next.next_seq.entry(chunk.doc_id.clone()).or_insert(0);
            *seq = (*seq).max(chunk.seq + 1);
            next.chunks
                .insert(chunk.chunk_id.clone(), Arc::new(chunk.clone()));
        }
        next
    }
}
