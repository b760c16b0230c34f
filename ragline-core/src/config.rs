//! Pipeline configuration
//!
//! Every field has a default, so a YAML file only needs the values it overrides:
//!
//! ```rust
//! use ragline_core::config::RagConfig;
//!
//! let config = RagConfig::from_yaml_str("retrieval:\n  mmr_lambda: 0.5\n").unwrap();
//! assert_eq!(config.retrieval.mmr_lambda, 0.5);
//! assert_eq!(config.retrieval.dense_k, 24);
//! ```

use crate::error::{Error, Result};
use crate::provider::EmbeddingFamily;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default refusal text returned by the grounding guard
pub const DEFAULT_REFUSAL: &str = "I don't know based on the indexed documents.";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Chunker settings
    pub chunking: ChunkingConfig,
    /// Candidate retrieval, fusion and rerank settings
    pub retrieval: RetrievalConfig,
    /// Answer synthesis settings
    pub synthesis: SynthesisConfig,
    /// Query/passage framing for the embedding provider
    pub embedding: EmbeddingConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// How chunk token counts are estimated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// `cl100k_base` BPE via tiktoken
    #[default]
    Cl100k,
    /// 1.3 tokens per whitespace-separated word
    Heuristic,
}

/// Chunker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens
    pub target_tokens: usize,
    /// Trailing context carried into the next chunk of the same run
    pub overlap_tokens: usize,
    /// Character cap for a single key:value field or table cell
    pub max_field_chars: usize,
    /// Character cap for a chunk body; longer bodies are cut
    pub max_chunk_chars: usize,
    /// Lines in the sliding window used for row-burst detection
    pub row_window: usize,
    /// Share of rows in the window that switches to row mode
    pub row_density: f64,
    /// Maximum rows per row chunk
    pub max_rows_per_chunk: usize,
    /// Occurrences after which a repeated line is treated as boilerplate
    pub boilerplate_repeat: usize,
    /// Token estimator
    pub tokenizer: TokenizerKind,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: 180,
            overlap_tokens: 30,
            max_field_chars: 500,
            max_chunk_chars: 1500,
            row_window: 20,
            row_density: 0.5,
            max_rows_per_chunk: 30,
            boilerplate_repeat: 3,
            tokenizer: TokenizerKind::Cl100k,
        }
    }
}

/// Retrieval, fusion and rerank settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Dense candidates requested from the vector index
    pub dense_k: usize,
    /// Sparse candidates requested from the lexical index
    pub sparse_k: usize,
    /// RRF constant K
    pub rrf_k: f64,
    /// Weight of each dense contribution
    pub dense_weight: f64,
    /// Weight of each sparse contribution
    pub sparse_weight: f64,
    /// MMR relevance/novelty trade-off (1.0 = relevance only)
    pub mmr_lambda: f64,
    /// Candidates kept by MMR
    pub mmr_top_n: usize,
    /// Candidates kept after reranking
    pub rerank_top_k: usize,
    /// Deadline for each provider call
    pub provider_timeout_ms: u64,
    /// Longest accepted query
    pub max_query_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_k: 24,
            sparse_k: 50,
            rrf_k: 60.0,
            dense_weight: 1.0,
            sparse_weight: 1.0,
            mmr_lambda: 0.7,
            mmr_top_n: 8,
            rerank_top_k: 3,
            provider_timeout_ms: 10_000,
            max_query_chars: 2_000,
        }
    }
}

/// Answer synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Top reranked chunks sentences are extracted from
    pub chunks_considered: usize,
    /// Sentences extracted per chunk
    pub sentences_per_chunk: usize,
    /// Word cap of the answer body
    pub max_words: usize,
    /// Shared meaningful query terms required in strict mode
    pub min_grounding_overlap: usize,
    /// Text returned when the grounding guard refuses
    pub refusal_text: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            chunks_considered: 2,
            sentences_per_chunk: 2,
            max_words: 60,
            min_grounding_overlap: 2,
            refusal_text: DEFAULT_REFUSAL.to_string(),
        }
    }
}

/// Embedding framing settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model family, selects the query/passage prefixes; the embedding
    /// provider's own family when unset
    pub family: Option<EmbeddingFamily>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level, overridden by `RUST_LOG`
    pub level: String,
    /// Directory for daily-rotated log files; stdout only when unset
    pub directory: Option<String>,
    /// Log file prefix
    pub filename_prefix: String,
    /// JSON lines on stdout instead of compact text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            filename_prefix: "ragline.log".to_string(),
            json: false,
        }
    }
}

impl RagConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: RagConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.target_tokens == 0 {
            return Err(Error::Config("chunking.target_tokens must be > 0".into()));
        }
        if c.overlap_tokens >= c.target_tokens {
            return Err(Error::Config(format!(
                "chunking.overlap_tokens ({}) must be smaller than target_tokens ({})",
                c.overlap_tokens, c.target_tokens
            )));
        }
        if c.max_field_chars == 0 || c.row_window == 0 || c.max_rows_per_chunk == 0 {
            return Err(Error::Config(
                "chunking.max_field_chars, row_window and max_rows_per_chunk must be > 0".into(),
            ));
        }
        if c.max_chunk_chars < c.max_field_chars {
            return Err(Error::Config(format!(
                "chunking.max_chunk_chars ({}) must be at least max_field_chars ({})",
                c.max_chunk_chars, c.max_field_chars
            )));
        }
        if !(c.row_density > 0.0 && c.row_density <= 1.0) {
            return Err(Error::Config("chunking.row_density must be in (0, 1]".into()));
        }

        let r = &self.retrieval;
        if r.dense_k == 0 || r.sparse_k == 0 || r.mmr_top_n == 0 || r.rerank_top_k == 0 {
            return Err(Error::Config(
                "retrieval.dense_k, sparse_k, mmr_top_n and rerank_top_k must be > 0".into(),
            ));
        }
        if r.rrf_k <= 0.0 {
            return Err(Error::Config("retrieval.rrf_k must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&r.mmr_lambda) {
            return Err(Error::Config("retrieval.mmr_lambda must be in [0, 1]".into()));
        }
        if r.dense_weight < 0.0 || r.sparse_weight < 0.0 {
            return Err(Error::Config("retrieval weights must be >= 0".into()));
        }
        if r.provider_timeout_ms == 0 || r.max_query_chars == 0 {
            return Err(Error::Config(
                "retrieval.provider_timeout_ms and max_query_chars must be > 0".into(),
            ));
        }

        let s = &self.synthesis;
        if s.chunks_considered == 0 || s.sentences_per_chunk == 0 || s.max_words == 0 {
            return Err(Error::Config(
                "synthesis.chunks_considered, sentences_per_chunk and max_words must be > 0"
                    .into(),
            ));
        }
        if s.refusal_text.trim().is_empty() {
            return Err(Error::Config("synthesis.refusal_text must not be empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.target_tokens, 180);
        assert_eq!(config.chunking.overlap_tokens, 30);
        assert_eq!(config.chunking.max_chunk_chars, 1500);
        assert_eq!(config.retrieval.sparse_k, 50);
        assert_eq!(config.retrieval.mmr_lambda, 0.7);
        assert_eq!(config.synthesis.min_grounding_overlap, 2);
        assert_eq!(config.synthesis.refusal_text, DEFAULT_REFUSAL);
        assert_eq!(config.embedding.family, None);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
chunking:
  target_tokens: 120
  tokenizer: heuristic
synthesis:
  min_grounding_overlap: 3
embedding:
  family: e5
"#;
        let config = RagConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.chunking.target_tokens, 120);
        assert_eq!(config.chunking.overlap_tokens, 30);
        assert_eq!(config.chunking.tokenizer, TokenizerKind::Heuristic);
        assert_eq!(config.synthesis.min_grounding_overlap, 3);
        assert_eq!(config.embedding.family, Some(EmbeddingFamily::E5));
        assert_eq!(config.retrieval, RetrievalConfig::default());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let overlap = "chunking:\n  target_tokens: 20\n  overlap_tokens: 20\n";
        assert!(matches!(
            RagConfig::from_yaml_str(overlap),
            Err(Error::Config(_))
        ));

        let chunk_cap = "chunking:\n  max_chunk_chars: 100\n";
        assert!(matches!(
            RagConfig::from_yaml_str(chunk_cap),
            Err(Error::Config(_))
        ));

        let lambda = "retrieval:\n  mmr_lambda: 1.5\n";
        assert!(matches!(
            RagConfig::from_yaml_str(lambda),
            Err(Error::Config(_))
        ));

        assert!(matches!(
            RagConfig::from_yaml_str("retrieval: [1, 2"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragline.yaml");
        std::fs::write(&path, "retrieval:\n  rerank_top_k: 5\n").unwrap();

        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.retrieval.rerank_top_k, 5);
        assert!(RagConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
