//! Scripted providers for testing pipelines without a model server

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{EmbeddingProvider, Error, RelevanceScorer, Result};

/// A relevance scorer that returns a predefined list of scores
///
/// The list is returned as-is on every call, so a list whose length differs
/// from the number of passages exercises the reranker's mismatch fallback.
#[derive(Debug, Default)]
pub struct FixedScorer {
    scores: Vec<f32>,
    calls: AtomicUsize,
}

impl FixedScorer {
    /// Create a scorer with predefined scores
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `score` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceScorer for FixedScorer {
    async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }

    fn name(&self) -> &str {
        "fixed-scorer"
    }
}

/// A relevance scorer whose every call fails
#[derive(Debug, Clone)]
pub struct FailingScorer {
    message: String,
}

impl FailingScorer {
    /// Create a scorer failing with `message`
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingScorer {
    fn default() -> Self {
        Self::new("503 Service Unavailable")
    }
}

#[async_trait]
impl RelevanceScorer for FailingScorer {
    async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
        Err(Error::provider_unavailable(self.name(), self.message.clone()))
    }

    fn name(&self) -> &str {
        "failing-scorer"
    }
}

/// An embedding provider whose every call fails
#[derive(Debug, Clone)]
pub struct FailingEmbedder {
    dimension: usize,
}

impl FailingEmbedder {
    /// Create an embedder advertising `dimension`
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn encode_query(&self, _query: &str) -> Result<Vec<f32>> {
        Err(Error::provider_unavailable(self.name(), "connection refused"))
    }

    async fn encode_passages(&self, _passages: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::provider_unavailable(self.name(), "connection refused"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "failing-embedder"
    }
}
