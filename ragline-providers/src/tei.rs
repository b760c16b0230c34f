//! Cross-encoder reranking via text-embeddings-inference
//!
//! TEI's `/rerank` endpoint returns `[{index, score}]` sorted by score. The
//! scorer maps them back to input order, which is what
//! [`Reranker`](ragline_core::rerank::Reranker) expects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{check_status, normalize_base_url, transport_error, Error, HttpConfig, RelevanceScorer, Result};

const PROVIDER: &str = "tei-reranker";

/// Client for a TEI server hosting a cross-encoder model
pub struct TeiReranker {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

impl TeiReranker {
    /// Create a client for the TEI server at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(base_url, &HttpConfig::default())
    }

    /// Create with a custom HTTP configuration
    pub fn with_config(base_url: impl Into<String>, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: http.build_client()?,
            base_url: normalize_base_url(base_url),
            timeout_secs: http.timeout_secs,
        })
    }
}

/// Place ranked scores back at their input positions
fn scores_in_input_order(ranked: Vec<RankedText>, expected: usize) -> Result<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for item in ranked {
        let slot = scores.get_mut(item.index).ok_or_else(|| {
            Error::provider_unavailable(
                PROVIDER,
                format!("index {} out of range for {} texts", item.index, expected),
            )
        })?;
        *slot = Some(item.score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, score)| {
            score.ok_or_else(|| {
                Error::provider_unavailable(PROVIDER, format!("no score returned for text {}", i))
            })
        })
        .collect()
}

#[async_trait]
impl RelevanceScorer for TeiReranker {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&RerankRequest {
                query,
                texts: passages,
                raw_scores: false,
            })
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout_secs, e))?;
        let response = check_status(PROVIDER, response).await?;

        let ranked: Vec<RankedText> = response.json().await.map_err(|e| {
            Error::provider_unavailable(PROVIDER, format!("Failed to parse rerank response: {}", e))
        })?;
        debug!(count = ranked.len(), "TEI rerank scores received");

        scores_in_input_order(ranked, passages.len())
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_restored_to_input_order() {
        let ranked: Vec<RankedText> = serde_json::from_str(
            r#"[{"index":2,"score":0.9},{"index":0,"score":0.5},{"index":1,"score":0.1}]"#,
        )
        .unwrap();

        let scores = scores_in_input_order(ranked, 3).unwrap();
        assert_eq!(scores, vec![0.5, 0.1, 0.9]);
    }

    #[test]
    fn test_incomplete_response_rejected() {
        let missing = vec![RankedText { index: 0, score: 0.4 }];
        assert!(scores_in_input_order(missing, 2).is_err());

        let out_of_range = vec![RankedText { index: 5, score: 0.4 }];
        assert!(scores_in_input_order(out_of_range, 1).is_err());
    }

    #[test]
    fn test_request_shape() {
        let texts = vec!["a".to_string()];
        let body = serde_json::to_value(RerankRequest {
            query: "q",
            texts: &texts,
            raw_scores: false,
        })
        .unwrap();
        assert_eq!(body["query"], "q");
        assert_eq!(body["texts"][0], "a");
        assert_eq!(body["raw_scores"], false);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_provider_failure() {
        let reranker = TeiReranker::new("http://127.0.0.1:9/").unwrap();
        assert_eq!(reranker.base_url, "http://127.0.0.1:9");
        let err = reranker
            .score("q", &["text".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
    }
}
