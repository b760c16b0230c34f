//! Retrieval pipeline entry points
//!
//! ```text
//! query ─► mode guard ─► embed ─┬─► dense top-k ──┐
//!                               └─► sparse top-k ─┴─► RRF ─► MMR ─► rerank ─► synthesize
//! ```
//!
//! # Example
//!
//! ```rust
//! use ragline_core::engine::RagEngine;
//!
//! # async fn run() -> ragline_core::error::Result<()> {
//! let engine = RagEngine::builder().build().await?;
//! engine.ingest_chunks("d1", "Bio", "Name: A\nRole: Engineer").await?;
//!
//! let answer = engine.query("What is A's role?", true).await?;
//! assert!(answer.text.contains("Engineer"));
//! # Ok(())
//! # }
//! ```

use crate::catalog::ChunkCatalog;
use crate::chunker::{Chunk, Chunker};
use crate::config::RagConfig;
use crate::embed::HashingEmbedder;
use crate::error::{Error, Result};
use crate::fusion::{FusionConfig, FusionEngine};
use crate::mode::{Mode, ModeGuard, Route};
use crate::provider::{DenseIndex, EmbeddingFamily, EmbeddingProvider, ScoredChunk, SparseIndex};
use crate::rerank::Reranker;
use crate::synth::{Answer, Synthesizer};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "index")]
use ragline_index::{ChunkLog, FlatVectorStore, LexicalIndex, LoggedChunk};
#[cfg(feature = "index")]
use std::path::PathBuf;

const INLINE_TITLE: &str = "Inline Document";

/// Several texts ingested under one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    pub texts: Vec<String>,
    /// Generated (UUID v4) when absent
    pub doc_id: Option<String>,
    /// Defaults to the doc id, or "Inline Document" for a generated id
    pub title: Option<String>,
}

/// Result of [`RagEngine::ingest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub doc_id: String,
    pub chunks: Vec<Chunk>,
}

/// Index size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Hybrid retrieval and grounded answering over ingested documents
///
/// Queries may run concurrently. Ingestion is serialized; a query works on the
/// catalog snapshot it started with.
pub struct RagEngine {
    config: RagConfig,
    chunker: Chunker,
    fusion: FusionEngine,
    synthesizer: Synthesizer,
    reranker: Reranker,
    family: EmbeddingFamily,
    embedder: Arc<dyn EmbeddingProvider>,
    dense: Arc<dyn DenseIndex>,
    sparse: Arc<dyn SparseIndex>,
    catalog: RwLock<Arc<ChunkCatalog>>,
    ingest_lock: tokio::sync::Mutex<()>,
    #[cfg(feature = "index")]
    chunk_log: Option<ChunkLog>,
}

impl RagEngine {
    /// Create a builder
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::new()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Current catalog snapshot
    pub fn snapshot(&self) -> Arc<ChunkCatalog> {
        Arc::clone(&self.catalog.read())
    }

    pub fn stats(&self) -> EngineStats {
        let snapshot = self.snapshot();
        EngineStats {
            documents: snapshot.documents(),
            chunks: snapshot.len(),
        }
    }

    /// Chunk, embed and index one text
    ///
    /// Re-ingesting a doc id appends chunks after the existing ones. Whitespace-only
    /// text is accepted and produces no chunks.
    #[instrument(skip(self, raw), fields(raw_len = raw.len()))]
    pub async fn ingest_chunks(&self, doc_id: &str, title: &str, raw: &str) -> Result<Vec<Chunk>> {
        let doc_id = doc_id.trim();
        if doc_id.is_empty() {
            return Err(Error::invalid_input("doc_id must not be empty"));
        }
        let title = match title.trim() {
            "" => doc_id,
            t => t,
        };

        let _guard = self.ingest_lock.lock().await;
        let snapshot = self.snapshot();

        let chunks = self
            .chunker
            .chunk_document(doc_id, title, raw, snapshot.next_seq(doc_id));
        if chunks.is_empty() {
            debug!("No chunks produced");
            return Ok(chunks);
        }

        self.index_chunks(&chunks).await?;

        #[cfg(feature = "index")]
        if let Some(log) = &self.chunk_log {
            let now = chrono::Utc::now();
            let records: Vec<LoggedChunk> = chunks
                .iter()
                .map(|c| LoggedChunk {
                    chunk_id: c.chunk_id.clone(),
                    doc_id: c.doc_id.clone(),
                    seq: c.seq,
                    section: c.section.clone(),
                    text: c.text.clone(),
                    token_count: c.token_count,
                    ingested_at: now,
                })
                .collect();
            log.append(&records)?;
        }

        *self.catalog.write() = Arc::new(snapshot.with_chunks(&chunks));

        info!(chunks = chunks.len(), "Ingested document");
        Ok(chunks)
    }

    /// Ingest several texts under one document
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse> {
        if request.texts.iter().all(|t| t.trim().is_empty()) {
            return Err(Error::invalid_input("ingest request has no text"));
        }

        let (doc_id, generated) = match request.doc_id.as_deref().map(str::trim) {
            Some("") => return Err(Error::invalid_input("doc_id must not be empty")),
            Some(id) => (id.to_string(), false),
            None => (uuid::Uuid::new_v4().to_string(), true),
        };
        let title = match request.title.filter(|t| !t.trim().is_empty()) {
            Some(title) => title,
            None if generated => INLINE_TITLE.to_string(),
            None => doc_id.clone(),
        };

        let mut chunks = Vec::new();
        for text in &request.texts {
            chunks.extend(self.ingest_chunks(&doc_id, &title, text).await?);
        }

        Ok(IngestResponse { doc_id, chunks })
    }

    /// Answer a question from the indexed documents
    ///
    /// `strict` enables the grounding guard and disables small-talk shortcuts.
    /// Provider failures and timeouts are returned as errors.
    #[instrument(skip(self, text))]
    pub async fn query(&self, text: &str, strict: bool) -> Result<Answer> {
        let query = text.trim();
        if query.is_empty() {
            return Err(Error::invalid_input("query must not be empty"));
        }
        let max_chars = self.config.retrieval.max_query_chars;
        if query.chars().count() > max_chars {
            return Err(Error::invalid_input(format!(
                "query exceeds {max_chars} characters"
            )));
        }

        if let Route::Reply(kind) = ModeGuard::route(Mode::from_strict(strict), query) {
            debug!(?kind, "Small talk, skipping retrieval");
            return Ok(Answer::small_talk(kind.reply(), strict));
        }

        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            debug!("Empty index");
            return Ok(self.synthesizer.synthesize(query, &[], strict));
        }

        let chunks = self.retrieve(query, &snapshot).await?;
        let answer = self.synthesizer.synthesize(query, &chunks, strict);

        info!(
            kind = ?answer.kind,
            candidates = chunks.len(),
            citations = answer.citations.len(),
            "Answered query"
        );
        Ok(answer)
    }

    /// Dense + sparse retrieval, fusion, diversification and rerank
    async fn retrieve(&self, query: &str, snapshot: &ChunkCatalog) -> Result<Vec<Chunk>> {
        let r = &self.config.retrieval;
        let framed = self.family.frame_query(query);

        let embedding = self
            .call(self.embedder.name(), self.embedder.encode_query(&framed))
            .await?;

        let (dense_hits, sparse_hits) = tokio::try_join!(
            self.call(self.dense.name(), self.dense.search(&embedding, r.dense_k)),
            self.call(self.sparse.name(), self.sparse.search(query, r.sparse_k)),
        )?;
        let dense_hits = known(dense_hits, snapshot);
        let sparse_hits = known(sparse_hits, snapshot);
        debug!(
            dense = dense_hits.len(),
            sparse = sparse_hits.len(),
            "Retrieved candidates"
        );

        let fused = self.fusion.fuse(&dense_hits, &sparse_hits);
        if fused.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = fused.iter().map(|c| c.chunk_id.clone()).collect();
        let vectors = self
            .call(self.dense.name(), self.dense.fetch(&ids))
            .await?;
        let embeddings: HashMap<String, Vec<f32>> = ids
            .into_iter()
            .zip(vectors)
            .filter_map(|(id, v)| v.map(|v| (id, v)))
            .collect();

        let diversified = self.fusion.diversify(fused, &embeddings, r.mmr_top_n);
        let passages: Vec<String> = diversified
            .iter()
            .map(|c| {
                snapshot
                    .get(&c.chunk_id)
                    .map(|chunk| chunk.text.clone())
                    .unwrap_or_default()
            })
            .collect();

        let reranked = self
            .reranker
            .rerank(query, diversified, &passages, r.rerank_top_k, self.timeout())
            .await;

        Ok(reranked
            .iter()
            .filter_map(|c| snapshot.get(&c.chunk_id).cloned())
            .collect())
    }

    /// Embed chunk texts and write them to both indexes
    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let passages: Vec<String> = chunks
            .iter()
            .map(|c| self.family.frame_passage(&c.text))
            .collect();

        let vectors = self
            .call(self.embedder.name(), self.embedder.encode_passages(&passages))
            .await?;
        if vectors.len() != chunks.len() {
            return Err(Error::provider_unavailable(
                self.embedder.name(),
                format!("expected {} embeddings, got {}", chunks.len(), vectors.len()),
            ));
        }

        for (chunk, vector) in chunks.iter().zip(vectors) {
            self.call(self.dense.name(), self.dense.upsert(&chunk.chunk_id, vector))
                .await?;
            self.call(self.sparse.name(), self.sparse.index(&chunk.chunk_id, &chunk.text))
                .await?;
        }
        Ok(())
    }

    /// Rebuild indexes and catalog from the chunk log
    #[cfg(feature = "index")]
    async fn replay(&self) -> Result<()> {
        let Some(log) = &self.chunk_log else {
            return Ok(());
        };

        let mut latest: HashMap<String, Chunk> = HashMap::new();
        for record in log.load()? {
            latest.insert(
                record.chunk_id.clone(),
                Chunk {
                    chunk_id: record.chunk_id,
                    doc_id: record.doc_id,
                    seq: record.seq,
                    section: record.section,
                    text: record.text,
                    token_count: record.token_count,
                },
            );
        }
        if latest.is_empty() {
            return Ok(());
        }

        let mut chunks: Vec<Chunk> = latest.into_values().collect();
        chunks.sort_by(|a, b| a.doc_id.cmp(&b.doc_id).then(a.seq.cmp(&b.seq)));

        self.index_chunks(&chunks).await?;
        *self.catalog.write() = Arc::new(ChunkCatalog::new().with_chunks(&chunks));

        info!(
            path = %log.path().display(),
            chunks = chunks.len(),
            "Replayed chunk log"
        );
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.retrieval.provider_timeout_ms)
    }

    /// Await a provider call under the configured deadline
    async fn call<T>(&self, provider: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.config.retrieval.provider_timeout_ms;
                warn!(provider, timeout_ms, "Provider call timed out");
                Err(Error::ProviderTimeout {
                    provider: provider.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}

/// Drop hits outside the snapshot and keep list order
fn known(hits: Vec<ScoredChunk>, snapshot: &ChunkCatalog) -> Vec<ScoredChunk> {
    hits.into_iter()
        .filter(|h| snapshot.contains(&h.chunk_id))
        .collect()
}

/// Builder for [`RagEngine`]
#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    dense: Option<Arc<dyn DenseIndex>>,
    sparse: Option<Arc<dyn SparseIndex>>,
    reranker: Option<Reranker>,
    #[cfg(feature = "index")]
    chunk_log: Option<PathBuf>,
}

impl RagEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn dense_index(mut self, index: Arc<dyn DenseIndex>) -> Self {
        self.dense = Some(index);
        self
    }

    pub fn sparse_index(mut self, index: Arc<dyn SparseIndex>) -> Self {
        self.sparse = Some(index);
        self
    }

    pub fn reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Persist chunk metadata to a JSONL log and replay it on build
    #[cfg(feature = "index")]
    pub fn chunk_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.chunk_log = Some(path.into());
        self
    }

    /// Validate the configuration, fill in default backends and replay the chunk log
    pub async fn build(self) -> Result<RagEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedder: Arc<dyn EmbeddingProvider> = match self.embedder {
            Some(embedder) => embedder,
            None => Arc::new(HashingEmbedder::default()),
        };

        #[cfg(feature = "index")]
        let dense: Arc<dyn DenseIndex> = match self.dense {
            Some(dense) => dense,
            None => Arc::new(FlatVectorStore::new(embedder.dimension())),
        };
        #[cfg(feature = "index")]
        let sparse: Arc<dyn SparseIndex> = match self.sparse {
            Some(sparse) => sparse,
            None => Arc::new(LexicalIndex::in_memory()?),
        };

        #[cfg(not(feature = "index"))]
        let dense = self
            .dense
            .ok_or_else(|| Error::Config("a dense index is required".into()))?;
        #[cfg(not(feature = "index"))]
        let sparse = self
            .sparse
            .ok_or_else(|| Error::Config("a sparse index is required".into()))?;

        let reranker = self.reranker.unwrap_or_default();
        let family = config
            .embedding
            .family
            .unwrap_or_else(|| embedder.family());

        info!(
            embedder = embedder.name(),
            ?family,
            dense = dense.name(),
            sparse = sparse.name(),
            reranker = ?reranker,
            "Building retrieval engine"
        );

        let engine = RagEngine {
            chunker: Chunker::new(config.chunking.clone()),
            fusion: FusionEngine::new(FusionConfig::from(&config.retrieval)),
            synthesizer: Synthesizer::new(config.synthesis.clone()),
            reranker,
            family,
            embedder,
            dense,
            sparse,
            catalog: RwLock::new(Arc::new(ChunkCatalog::new())),
            ingest_lock: tokio::sync::Mutex::new(()),
            #[cfg(feature = "index")]
            chunk_log: self.chunk_log.map(ChunkLog::open).transpose()?,
            config,
        };

        #[cfg(feature = "index")]
        engine.replay().await?;

        Ok(engine)
    }
}
