//! Provider traits for the external collaborators of the pipeline
//!
//! Embedding models and candidate indexes are injected behind these traits so the
//! pipeline can run against in-process backends, HTTP services or test doubles.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A candidate returned by a dense or sparse index
///
/// Scores are only comparable within one index; fusion uses ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Chunk identifier
    pub chunk_id: String,
    /// Raw index score, higher is better
    pub score: f64,
}

impl ScoredChunk {
    /// Create a new scored chunk
    pub fn new(chunk_id: impl Into<String>, score: f64) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            score,
        }
    }
}

/// Produces unit-normalized vectors for queries and passages
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one (already framed) query
    async fn encode_query(&self, query: &str) -> Result<Vec<f32>>;

    /// Embed a batch of (already framed) passages, one vector per input
    async fn encode_passages(&self, passages: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimension
    fn dimension(&self) -> usize;

    /// Query/passage framing the model was trained with
    fn family(&self) -> EmbeddingFamily {
        EmbeddingFamily::Generic
    }

    /// Provider name for logs and errors
    fn name(&self) -> &str;
}

/// Nearest-neighbour search over passage embeddings
#[async_trait]
pub trait DenseIndex: Send + Sync {
    /// Top-`k` chunks by similarity, best first
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Insert or replace the vector of a chunk
    async fn upsert(&self, chunk_id: &str, embedding: Vec<f32>) -> Result<()>;

    /// Stored vectors for the given chunks, `None` where unknown
    async fn fetch(&self, chunk_ids: &[String]) -> Result<Vec<Option<Vec<f32>>>>;

    /// Index name for logs and errors
    fn name(&self) -> &str;
}

/// Lexical search over chunk text
#[async_trait]
pub trait SparseIndex: Send + Sync {
    /// Top-`k` chunks by lexical relevance, best first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    /// Index (or re-index) the text of a chunk
    async fn index(&self, chunk_id: &str, text: &str) -> Result<()>;

    /// Index name for logs and errors
    fn name(&self) -> &str;
}

/// Embedding model family
///
/// Asymmetric retrieval models expect their queries and passages framed with the
/// prefixes they were trained on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingFamily {
    /// BGE models: instruction prefix on queries only
    Bge,
    /// E5 models: `query: ` / `passage: `
    E5,
    /// Symmetric models: no framing
    #[default]
    Generic,
}

const BGE_QUERY_INSTRUCTION: &str = "Represent this query for retrieving relevant documents: ";

impl EmbeddingFamily {
    /// Guess the family from a model name such as `BAAI/bge-small-en-v1.5`
    pub fn from_model_name(model: &str) -> Self {
        let lower = model.to_lowercase();
        if lower.contains("bge") {
            Self::Bge
        } else if lower.contains("e5") {
            Self::E5
        } else {
            Self::Generic
        }
    }

    /// Frame a query for embedding
    pub fn frame_query(&self, query: &str) -> String {
        match self {
            Self::Bge => format!("{BGE_QUERY_INSTRUCTION}{query}"),
            Self::E5 => format!("query: {query}"),
            Self::Generic => query.to_string(),
        }
    }

    /// Frame a passage for embedding
    pub fn frame_passage(&self, passage: &str) -> String {
        match self {
            Self::E5 => format!("passage: {passage}"),
            Self::Bge | Self::Generic => passage.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_detection() {
        assert_eq!(
            EmbeddingFamily::from_model_name("BAAI/bge-small-en-v1.5"),
            EmbeddingFamily::Bge
        );
        assert_eq!(
            EmbeddingFamily::from_model_name("intfloat/multilingual-E5-base"),
            EmbeddingFamily::E5
        );
        assert_eq!(
            EmbeddingFamily::from_model_name("all-MiniLM-L6-v2"),
            EmbeddingFamily::Generic
        );
    }

    #[test]
    fn test_framing() {
        let bge = EmbeddingFamily::Bge;
        assert_eq!(
            bge.frame_query("rust"),
            "Represent this query for retrieving relevant documents: rust"
        );
        assert_eq!(bge.frame_passage("rust"), "rust");

        let e5 = EmbeddingFamily::E5;
        assert_eq!(e5.frame_query("rust"), "query: rust");
        assert_eq!(e5.frame_passage("rust"), "passage: rust");

        assert_eq!(EmbeddingFamily::Generic.frame_query("rust"), "rust");
    }
}
