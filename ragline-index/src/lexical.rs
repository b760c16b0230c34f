//! Lexical chunk index backed by SQLite FTS5
//!
//! Every chunk is stored once in a plain `chunks` table; triggers mirror the body into
//! an FTS5 table tokenized with `porter unicode61`, so queries match stemmed terms.
//! Relevance is the negated FTS5 `bm25()` value (higher is better).

use crate::error::{IndexError, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

/// A lexical search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub score: f64,
}

/// FTS5 lexical index over chunk text
pub struct LexicalIndex {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl LexicalIndex {
    /// Create or open a lexical index at the given path
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        info!("Opening lexical index at: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL")?;

        let index = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        index.init_schema()?;
        Ok(index)
    }

    /// Create a private in-memory index
    pub fn in_memory() -> Result<Self> {
        let index = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        index.init_schema()?;
        Ok(index)
    }

    fn init_schema(&self) -> Result<()> {
        debug!("Initializing lexical index schema");
        let conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk_id TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                body,
                tokenize = 'porter unicode61'
            )",
            [],
        )?;

        conn.execute_batch(
            "CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
                INSERT INTO chunks_fts(rowid, body) VALUES (new.id, new.body);
             END;
             CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
                DELETE FROM chunks_fts WHERE rowid = old.id;
             END;",
        )?;

        Ok(())
    }

    /// Index (or replace) the text of a chunk
    pub fn index(&self, chunk_id: &str, text: &str) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE chunk_id = ?1", params![chunk_id])?;
        tx.execute(
            "INSERT INTO chunks (chunk_id, body) VALUES (?1, ?2)",
            params![chunk_id, text],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Top-`limit` chunks by BM25 relevance
    ///
    /// Query terms are OR-ed so partial matches still rank. A query without any
    /// indexable term returns no hits.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let Some(match_expr) = build_match_query(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT c.chunk_id, bm25(chunks_fts) AS score
             FROM chunks_fts
             JOIN chunks c ON c.id = chunks_fts.rowid
             WHERE chunks_fts MATCH ?1
             ORDER BY score, c.id
             LIMIT ?2",
        )?;

        let hits = stmt
            .query_map(params![match_expr, limit as i64], |row| {
                Ok(LexicalHit {
                    chunk_id: row.get(0)?,
                    score: -row.get::<_, f64>(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Lexical search '{}' matched {} chunks", match_expr, hits.len());
        Ok(hits)
    }

    /// Number of indexed chunks
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT count(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Database path, `None` for in-memory indexes
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }
}

/// Turn free text into an FTS5 MATCH expression
///
/// Every alphanumeric run becomes a quoted term and terms are OR-joined, which keeps
/// user punctuation (quotes, `*`, `:`, `-`) from being parsed as FTS5 syntax.
pub fn build_match_query(query: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in query.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        let term = raw.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    if terms.is_empty() {
        return None;
    }

    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}
