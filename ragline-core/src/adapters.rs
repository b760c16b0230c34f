//! Provider implementations for the built-in `ragline-index` backends

use crate::error::{Error, Result};
use crate::provider::{DenseIndex, ScoredChunk, SparseIndex};
use async_trait::async_trait;
use ragline_index::{FlatVectorStore, IndexError, LexicalIndex};

fn unavailable(provider: &str, err: IndexError) -> Error {
    Error::provider_unavailable(provider, err.to_string())
}

#[async_trait]
impl SparseIndex for LexicalIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = LexicalIndex::search(self, query, k).map_err(|e| unavailable("lexical", e))?;
        Ok(hits
            .into_iter()
            .map(|h| ScoredChunk::new(h.chunk_id, h.score))
            .collect())
    }

    async fn index(&self, chunk_id: &str, text: &str) -> Result<()> {
        LexicalIndex::index(self, chunk_id, text).map_err(|e| unavailable("lexical", e))
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

#[async_trait]
impl DenseIndex for FlatVectorStore {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = FlatVectorStore::search(self, embedding, k)
            .map_err(|e| unavailable("flat-vector", e))?;
        Ok(hits
            .into_iter()
            .map(|h| ScoredChunk::new(h.chunk_id, f64::from(h.score)))
            .collect())
    }

    async fn upsert(&self, chunk_id: &str, embedding: Vec<f32>) -> Result<()> {
        FlatVectorStore::upsert(self, chunk_id, embedding).map_err(|e| unavailable("flat-vector", e))
    }

    async fn fetch(&self, chunk_ids: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        chunk_ids
            .iter()
            .map(|id| self.get(id).map_err(|e| unavailable("flat-vector", e)))
            .collect()
    }

    fn name(&self) -> &str {
        "flat-vector"
    }
}

#[cfg(feature = "hnsw")]
#[async_trait]
impl DenseIndex for ragline_index::HnswVectorStore {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = ragline_index::HnswVectorStore::search(self, embedding, k)
            .map_err(|e| unavailable("hnsw", e))?;
        Ok(hits
            .into_iter()
            .map(|h| ScoredChunk::new(h.chunk_id, f64::from(h.score)))
            .collect())
    }

    async fn upsert(&self, chunk_id: &str, embedding: Vec<f32>) -> Result<()> {
        ragline_index::HnswVectorStore::upsert(self, chunk_id, embedding)
            .map_err(|e| unavailable("hnsw", e))
    }

    async fn fetch(&self, chunk_ids: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        chunk_ids
            .iter()
            .map(|id| self.get(id).map_err(|e| unavailable("hnsw", e)))
            .collect()
    }

    fn name(&self) -> &str {
        "hnsw"
    }
}
