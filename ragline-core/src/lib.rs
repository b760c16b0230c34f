//! # ragline-core: hybrid retrieval with grounded extractive answers
//!
//! This crate provides:
//! - Structure-aware chunking (`chunker`) - headings, key:value records, table rows, prose
//! - Provider traits (`provider`) - embedding model, dense index, sparse index
//! - Fusion (`fusion`) - weighted Reciprocal Rank Fusion and MMR diversification
//! - Reranking (`rerank`) - cross-encoder scorer with passthrough fallback
//! - Synthesis (`synth`) - extractive answers with citations and a grounding guard
//! - Mode guard (`mode`) - strict / chatty handling of small talk
//! - Engine (`engine`) - ingestion and query entry points
//!
//! With the default `index` feature the engine runs fully in-process on
//! `ragline-index` backends and the local hashing embedder.

pub mod catalog;
pub mod chunker;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod logging;
pub mod mode;
pub mod provider;
pub mod rerank;
pub mod synth;
pub mod text;

#[cfg(feature = "index")]
mod adapters;

#[cfg(feature = "index")]
pub use ragline_index;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::chunker::{Chunk, Chunker};
    pub use crate::config::RagConfig;
    pub use crate::embed::HashingEmbedder;
    pub use crate::engine::{EngineStats, IngestRequest, IngestResponse, RagEngine, RagEngineBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::fusion::{FusedCandidate, FusionEngine};
    pub use crate::mode::{Mode, ModeGuard, QueryIntent, Route, SmallTalkKind};
    pub use crate::provider::{DenseIndex, EmbeddingFamily, EmbeddingProvider, ScoredChunk, SparseIndex};
    pub use crate::rerank::{RelevanceScorer, Reranker};
    pub use crate::synth::{Answer, AnswerKind, Citation, Synthesizer};
}
