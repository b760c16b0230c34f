//! Reciprocal Rank Fusion and MMR diversification
//!
//! Dense and sparse candidate lists are merged with weighted RRF, then the fused list
//! is thinned with Maximal Marginal Relevance so near-duplicate chunks do not crowd
//! out the reranker's budget.

use crate::config::RetrievalConfig;
use crate::provider::ScoredChunk;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Per-list evidence for a fused candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    /// 1-based rank in the dense list
    pub dense_rank: Option<usize>,
    /// 1-based rank in the sparse list
    pub sparse_rank: Option<usize>,
    /// Raw dense score
    pub dense_score: Option<f64>,
    /// Raw sparse score
    pub sparse_score: Option<f64>,
}

impl Signals {
    /// Best rank across lists
    pub fn best_rank(&self) -> usize {
        match (self.dense_rank, self.sparse_rank) {
            (Some(d), Some(s)) => d.min(s),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => usize::MAX,
        }
    }
}

/// A candidate after fusion
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub chunk_id: String,
    /// Sum of weighted RRF contributions
    pub fused_score: f64,
    pub signals: Signals,
    /// Cross-encoder score, set by a model-backed reranker
    pub rerank_score: Option<f32>,
}

/// Fusion parameters
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF constant K
    pub k: f64,
    pub dense_weight: f64,
    pub sparse_weight: f64,
    /// MMR trade-off, 1.0 ranks by relevance only
    pub lambda: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for FusionConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k: config.rrf_k,
            dense_weight: config.dense_weight,
            sparse_weight: config.sparse_weight,
            lambda: config.mmr_lambda,
        }
    }
}

#[derive(Default)]
struct FusedCandidateBuilder {
    fused_score: f64,
    signals: Signals,
}

impl FusedCandidateBuilder {
    fn add_dense(&mut self, rank: usize, score: f64, contribution: f64) {
        if self.signals.dense_rank.is_none() {
            self.signals.dense_rank = Some(rank);
            self.signals.dense_score = Some(score);
            self.fused_score += contribution;
        }
    }

    fn add_sparse(&mut self, rank: usize, score: f64, contribution: f64) {
        if self.signals.sparse_rank.is_none() {
            self.signals.sparse_rank = Some(rank);
            self.signals.sparse_score = Some(score);
            self.fused_score += contribution;
        }
    }

    fn build(self, chunk_id: String) -> FusedCandidate {
        FusedCandidate {
            chunk_id,
            fused_score: self.fused_score,
            signals: self.signals,
            rerank_score: None,
        }
    }
}

/// RRF + MMR
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse ranked dense and sparse lists
    ///
    /// A chunk at 1-based rank `r` contributes `weight / (K + r)`. Output is ordered by
    /// fused score, then best individual rank, then chunk id. A chunk repeated within
    /// one list only counts at its first position.
    ///
    /// # Examples
    ///
    /// ```
    /// use ragline_core::fusion::FusionEngine;
    /// use ragline_core::provider::ScoredChunk;
    ///
    /// let engine = FusionEngine::default();
    /// let dense = vec![ScoredChunk::new("c3", 0.95), ScoredChunk::new("c1", 0.88)];
    /// let sparse = vec![ScoredChunk::new("c1", 10.5), ScoredChunk::new("c2", 8.2)];
    ///
    /// let fused = engine.fuse(&dense, &sparse);
    ///
    /// // c1 appears in both lists
    /// assert_eq!(fused[0].chunk_id, "c1");
    /// assert_eq!(fused.len(), 3);
    /// ```
    pub fn fuse(&self, dense: &[ScoredChunk], sparse: &[ScoredChunk]) -> Vec<FusedCandidate> {
        let mut builders: HashMap<&str, FusedCandidateBuilder> = HashMap::new();

        for (idx, hit) in dense.iter().enumerate() {
            let rank = idx + 1;
            let contribution = self.config.dense_weight / (self.config.k + rank as f64);
            builders
                .entry(hit.chunk_id.as_str())
                .or_default()
                .add_dense(rank, hit.score, contribution);
        }

        for (idx, hit) in sparse.iter().enumerate() {
            let rank = idx + 1;
            let contribution = self.config.sparse_weight / (self.config.k + rank as f64);
            builders
                .entry(hit.chunk_id.as_str())
                .or_default()
                .add_sparse(rank, hit.score, contribution);
        }

        let mut fused: Vec<FusedCandidate> = builders
            .into_iter()
            .map(|(chunk_id, b)| b.build(chunk_id.to_string()))
            .collect();

        fused.sort_by(compare_fused);
        fused
    }

    /// Select up to `top_n` candidates with Maximal Marginal Relevance
    ///
    /// Relevance is the fused score divided by the best fused score; similarity is
    /// the cosine between stored dense embeddings (0 when either is missing).
    pub fn diversify(
        &self,
        fused: Vec<FusedCandidate>,
        embeddings: &HashMap<String, Vec<f32>>,
        top_n: usize,
    ) -> Vec<FusedCandidate> {
        if fused.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let lambda = self.config.lambda;
        let max_score = fused
            .iter()
            .map(|c| c.fused_score)
            .fold(f64::NEG_INFINITY, f64::max);
        let relevance: Vec<f64> = fused
            .iter()
            .map(|c| {
                if max_score > 0.0 {
                    c.fused_score / max_score
                } else {
                    0.0
                }
            })
            .collect();

        let mut remaining: Vec<usize> = (0..fused.len()).collect();
        let mut selected: Vec<usize> = Vec::with_capacity(top_n.min(fused.len()));

        while selected.len() < top_n && !remaining.is_empty() {
            let mut best_pos = 0;
            let mut best_value = f64::NEG_INFINITY;

            for (pos, &idx) in remaining.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|&s| similarity(embeddings, &fused[idx].chunk_id, &fused[s].chunk_id))
                    .fold(0.0, f64::max);
                let value = lambda * relevance[idx] - (1.0 - lambda) * redundancy;
                if value > best_value {
                    best_value = value;
                    best_pos = pos;
                }
            }

            selected.push(remaining.remove(best_pos));
        }

        let mut slots: Vec<Option<FusedCandidate>> = fused.into_iter().map(Some).collect();
        selected
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }
}

fn compare_fused(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| a.signals.best_rank().cmp(&b.signals.best_rank()))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

fn similarity(embeddings: &HashMap<String, Vec<f32>>, a: &str, b: &str) -> f64 {
    match (embeddings.get(a), embeddings.get(b)) {
        (Some(x), Some(y)) => cosine_similarity(x, y) as f64,
        _ => 0.0,
    }
}

/// Cosine similarity, 0 for empty, mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
