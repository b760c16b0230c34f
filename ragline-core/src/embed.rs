//! Local feature-hashing embedder
//!
//! Deterministic, dependency-free embeddings: every term and character trigram is
//! hashed into a signed bucket and the result is L2-normalized. Lexically similar
//! texts land close together, which is enough for offline use and tests.

use crate::error::{Error, Result};
use crate::provider::EmbeddingProvider;
use crate::text::terms;
use async_trait::async_trait;
use rayon::prelude::*;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed one text synchronously
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for term in terms(text) {
            self.add_feature(&mut vector, term.as_bytes(), 1.0);

            let padded: Vec<char> = format!("#{term}#").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, trigram.as_bytes(), 0.5);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        if query.trim().is_empty() {
            return Err(Error::invalid_input("cannot embed empty query"));
        }
        Ok(self.embed(query))
    }

    async fn encode_passages(&self, passages: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(passages.par_iter().map(|p| self.embed(p)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Role: Engineer");
        let b = embedder.embed("Role: Engineer");

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_are_closer() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("engineer role");
        let near = embedder.embed("Role: Engineer");
        let far = embedder.embed("Quarterly revenue grew in Europe");

        assert!(cosine_similarity(&query, &near) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed("  ").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_provider_interface() {
        let embedder = HashingEmbedder::new(32);
        let passages = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = embedder.encode_passages(&passages).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed("alpha"));
        assert_eq!(embedder.dimension(), 32);
        assert!(embedder.encode_query("").await.is_err());
    }
}
