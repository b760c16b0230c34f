//! Cross-encoder reranking with a passthrough fallback

use crate::error::{Error, Result};
use crate::fusion::FusedCandidate;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Scores (query, passage) pairs, higher is more relevant
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// One score per passage, in input order
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;

    /// Scorer name for logs
    fn name(&self) -> &str;
}

/// Final-stage reranker
#[derive(Clone, Default)]
pub enum Reranker {
    /// Reorder candidates by an external relevance model
    ModelBacked(Arc<dyn RelevanceScorer>),
    /// Keep fused order, truncate to `top_k`
    #[default]
    Passthrough,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelBacked(scorer) => write!(f, "Reranker::ModelBacked({})", scorer.name()),
            Self::Passthrough => f.write_str("Reranker::Passthrough"),
        }
    }
}

impl Reranker {
    pub fn model(scorer: impl RelevanceScorer + 'static) -> Self {
        Self::ModelBacked(Arc::new(scorer))
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough)
    }

    /// Rerank `candidates` and keep the best `top_k`
    ///
    /// `passages` holds the chunk text of each candidate, in the same order. A scorer
    /// failure, timeout or score-count mismatch degrades to passthrough.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<FusedCandidate>,
        passages: &[String],
        top_k: usize,
        timeout: Duration,
    ) -> Vec<FusedCandidate> {
        if candidates.is_empty() {
            return candidates;
        }

        let scorer = match self {
            Self::Passthrough => return passthrough(candidates, top_k),
            Self::ModelBacked(scorer) => scorer,
        };

        let scores = match tokio::time::timeout(timeout, scorer.score(query, passages)).await {
            Ok(Ok(scores)) if scores.len() == candidates.len() => scores,
            Ok(Ok(scores)) => {
                warn!(
                    scorer = scorer.name(),
                    expected = candidates.len(),
                    got = scores.len(),
                    "Reranker returned wrong number of scores, keeping fused order"
                );
                return passthrough(candidates, top_k);
            }
            Ok(Err(e)) => {
                warn!(scorer = scorer.name(), "Reranker failed, keeping fused order: {}", e);
                return passthrough(candidates, top_k);
            }
            Err(_) => {
                let err = Error::ProviderTimeout {
                    provider: scorer.name().to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                };
                warn!("Reranker failed, keeping fused order: {}", err);
                return passthrough(candidates, top_k);
            }
        };

        let mut scored: Vec<FusedCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(mut candidate, score)| {
                candidate.rerank_score = Some(score);
                candidate
            })
            .collect();

        // Stable: equal scores keep fused order
        scored.sort_by(|a, b| {
            let a = a.rerank_score.unwrap_or(f32::NEG_INFINITY);
            let b = b.rerank_score.unwrap_or(f32::NEG_INFINITY);
            b.total_cmp(&a)
        });
        scored.truncate(top_k);

        debug!(scorer = scorer.name(), kept = scored.len(), "Reranked candidates");
        scored
    }
}

fn passthrough(mut candidates: Vec<FusedCandidate>, top_k: usize) -> Vec<FusedCandidate> {
    candidates.truncate(top_k);
    candidates
}
