//! Exact cosine-similarity vector store
//!
//! Keeps every embedding in memory and scores queries by brute-force dot product.
//! Vectors are expected to be L2-normalized, so the dot product is the cosine
//! similarity. Snapshots are written with bincode (temp file + rename).

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// A stored vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub chunk_id: String,
    pub embedding: Vec<f32>,
}

/// Vector search result
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    /// Cosine similarity
    pub score: f32,
}

#[derive(Default)]
struct Entries {
    entries: Vec<VectorEntry>,
    positions: HashMap<String, usize>,
}

/// Flat (exhaustive) vector store
pub struct FlatVectorStore {
    inner: RwLock<Entries>,
    dimension: usize,
    dirty: AtomicBool,
}

impl FlatVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Entries::default()),
            dimension,
            dirty: AtomicBool::new(false),
        }
    }

    /// Insert a vector, replacing any previous vector for the same chunk
    pub fn upsert(&self, chunk_id: impl Into<String>, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }

        let chunk_id = chunk_id.into();
        let mut inner = self.inner.write().map_err(|_| IndexError::LockPoisoned)?;

        match inner.positions.get(&chunk_id).copied() {
            Some(pos) => inner.entries[pos].embedding = embedding,
            None => {
                let pos = inner.entries.len();
                inner.positions.insert(chunk_id.clone(), pos);
                inner.entries.push(VectorEntry {
                    chunk_id,
                    embedding,
                });
            }
        }

        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Top-`k` vectors by cosine similarity
    ///
    /// Returns fewer than `k` hits when the store is smaller than `k`. Ties keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let inner = self.inner.read().map_err(|_| IndexError::LockPoisoned)?;
        let mut scored: Vec<(usize, f32)> = inner
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (pos, dot(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| VectorHit {
                chunk_id: inner.entries[pos].chunk_id.clone(),
                score,
            })
            .collect())
    }

    /// Stored vector for a chunk
    pub fn get(&self, chunk_id: &str) -> Result<Option<Vec<f32>>> {
        let inner = self.inner.read().map_err(|_| IndexError::LockPoisoned)?;
        Ok(inner
            .positions
            .get(chunk_id)
            .map(|&pos| inner.entries[pos].embedding.clone()))
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Write a snapshot if anything changed since the last save
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }

        let path = path.as_ref();
        let inner = self.inner.read().map_err(|_| IndexError::LockPoisoned)?;
        let data = SnapshotRef {
            dimension: self.dimension,
            entries: &inner.entries,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let file = std::fs::File::create(&tmp_path)?;
            let writer = std::io::BufWriter::new(file);
            bincode::serialize_into(writer, &data)
                .map_err(|e| IndexError::Serialization(e.to_string()))?;
        }
        std::fs::rename(&tmp_path, path)?;

        self.dirty.store(false, Ordering::Release);
        debug!("Saved {} vectors to {:?}", inner.entries.len(), path);
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let data: Snapshot = bincode::deserialize_from(reader)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let positions = data
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.chunk_id.clone(), pos))
            .collect();

        Ok(Self {
            inner: RwLock::new(Entries {
                entries: data.entries,
                positions,
            }),
            dimension: data.dimension,
            dirty: AtomicBool::new(false),
        })
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    dimension: usize,
    entries: &'a [VectorEntry],
}

#[derive(Deserialize)]
struct Snapshot {
    dimension: usize,
    entries: Vec<VectorEntry>,
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
