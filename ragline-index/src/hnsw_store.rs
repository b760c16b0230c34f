//! Approximate vector store using an HNSW graph
//!
//! Vectors are quantized to u8 for the graph, while float copies are kept so that
//! neighbours can be re-scored with exact cosine similarity and fetched for
//! diversity scoring.

use crate::error::{IndexError, Result};
use crate::vector_store::{dot, VectorHit};
use hnsw_rs::prelude::*;
use std::collections::HashMap;
use std::sync::RwLock;

struct HnswEntry {
    chunk_id: String,
    embedding: Vec<f32>,
    live: bool,
}

/// HNSW-backed vector store
pub struct HnswVectorStore {
    entries: RwLock<Vec<HnswEntry>>,
    positions: RwLock<HashMap<String, usize>>,
    hnsw: RwLock<Hnsw<'static, u8, DistU8L2>>,
    dimension: usize,
}

impl HnswVectorStore {
    pub fn new(dimension: usize, max_elements: usize) -> Self {
        // M=16, ef_construction=200
        let hnsw = Hnsw::new(16, max_elements, 16, 200, DistU8L2);
        Self {
            entries: RwLock::new(Vec::new()),
            positions: RwLock::new(HashMap::new()),
            hnsw: RwLock::new(hnsw),
            dimension,
        }
    }

    /// Map [-1.0, 1.0] onto [0, 255]
    fn quantize(vec: &[f32]) -> Vec<u8> {
        vec.iter()
            .map(|&x| ((x + 1.0) * 127.5).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Insert a vector; a previous vector for the same chunk stops matching
    pub fn upsert(&self, chunk_id: impl Into<String>, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }

        let chunk_id = chunk_id.into();
        let quantized = Self::quantize(&embedding);

        let mut entries = self.entries.write().map_err(|_| IndexError::LockPoisoned)?;
        let mut positions = self
            .positions
            .write()
            .map_err(|_| IndexError::LockPoisoned)?;
        let hnsw = self.hnsw.write().map_err(|_| IndexError::LockPoisoned)?;

        let idx = entries.len();
        hnsw.parallel_insert(&[(&quantized, idx)]);

        if let Some(old) = positions.insert(chunk_id.clone(), idx) {
            entries[old].live = false;
        }
        entries.push(HnswEntry {
            chunk_id,
            embedding,
            live: true,
        });
        Ok(())
    }

    /// Approximate top-`k`, re-scored with exact cosine similarity
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let entries = self.entries.read().map_err(|_| IndexError::LockPoisoned)?;
        if entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let superseded = entries.iter().filter(|e| !e.live).count();
        let search_k = (k + superseded).min(entries.len());
        let ef_search = (search_k * 2).max(50);

        let hnsw = self.hnsw.read().map_err(|_| IndexError::LockPoisoned)?;
        let neighbors = hnsw.search(&Self::quantize(query), search_k, ef_search);

        let mut hits: Vec<(usize, f32)> = neighbors
            .into_iter()
            .filter(|n| n.d_id < entries.len() && entries[n.d_id].live)
            .map(|n| (n.d_id, dot(query, &entries[n.d_id].embedding)))
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(idx, score)| VectorHit {
                chunk_id: entries[idx].chunk_id.clone(),
                score,
            })
            .collect())
    }

    pub fn get(&self, chunk_id: &str) -> Result<Option<Vec<f32>>> {
        let entries = self.entries.read().map_err(|_| IndexError::LockPoisoned)?;
        let positions = self.positions.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(positions
            .get(chunk_id)
            .map(|&idx| entries[idx].embedding.clone()))
    }

    pub fn len(&self) -> usize {
        self.positions.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// L2 squared distance for u8 vectors
///
/// On normalized vectors the Euclidean order matches the cosine order.
#[derive(Clone, Copy)]
struct DistU8L2;

impl Distance<u8> for DistU8L2 {
    fn eval(&self, a: &[u8], b: &[u8]) -> f32 {
        let mut sum_sq_diff = 0u32;
        for (&x, &y) in a.iter().zip(b.iter()) {
            let diff = x.abs_diff(y) as u32;
            sum_sq_diff += diff * diff;
        }
        sum_sq_diff as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_search() {
        let store = HnswVectorStore::new(3, 100);
        store.upsert("doc1", vec![1.0, 0.0, 0.0]).unwrap();
        store.upsert("doc2", vec![0.0, 1.0, 0.0]).unwrap();
        store.upsert("doc3", vec![0.9, 0.1, 0.0]).unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "doc1");
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn test_upsert_supersedes() {
        let store = HnswVectorStore::new(2, 100);
        store.upsert("a", vec![1.0, 0.0]).unwrap();
        store.upsert("a", vec![0.0, 1.0]).unwrap();

        assert_eq!(store.len(), 1);
        let hits = store.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(store.get("a").unwrap(), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn test_empty_store() {
        let store = HnswVectorStore::new(4, 100);
        assert!(store.search(&[0.0; 4], 10).unwrap().is_empty());
        assert!(store.upsert("x", vec![1.0]).is_err());
    }
}
