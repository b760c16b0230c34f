//! # ragline-index: storage backends for the ragline pipeline
//!
//! - **Lexical index**: SQLite FTS5 with porter stemming and BM25 ranking
//! - **Flat vector store**: exact cosine search with bincode snapshots
//! - **HNSW vector store** (`hnsw` feature): approximate search over u8-quantized vectors
//! - **Chunk log**: append-only JSONL record of every ingested chunk
//!
//! ```rust
//! use ragline_index::{FlatVectorStore, LexicalIndex};
//!
//! # fn main() -> ragline_index::Result<()> {
//! let lexical = LexicalIndex::in_memory()?;
//! lexical.index("bio#0", "Bio\nName: A\nRole: Engineer")?;
//! assert_eq!(lexical.search("role", 10)?[0].chunk_id, "bio#0");
//!
//! let vectors = FlatVectorStore::new(2);
//! vectors.upsert("bio#0", vec![1.0, 0.0])?;
//! assert_eq!(vectors.search(&[1.0, 0.0], 24)?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod chunk_log;
pub mod error;
pub mod lexical;
pub mod vector_store;

#[cfg(feature = "hnsw")]
pub mod hnsw_store;

pub use chunk_log::{ChunkLog, LoggedChunk};
pub use error::{IndexError, Result};
pub use lexical::{build_match_query, LexicalHit, LexicalIndex};
pub use vector_store::{FlatVectorStore, VectorEntry, VectorHit};

#[cfg(feature = "hnsw")]
pub use hnsw_store::HnswVectorStore;
