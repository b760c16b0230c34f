//! Append-only chunk metadata log (JSONL)
//!
//! One JSON object per line. The log is the storage layer's record of every chunk
//! ever ingested; it is never rewritten in place.

use crate::error::{IndexError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A chunk metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub seq: usize,
    pub section: String,
    pub text: String,
    pub token_count: usize,
    pub ingested_at: DateTime<Utc>,
}

/// JSONL chunk log
pub struct ChunkLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ChunkLog {
    /// Open (or prepare to create) a log at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records and flush them to disk
    pub fn append(&self, records: &[LoggedChunk]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().map_err(|_| IndexError::LockPoisoned)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;

        debug!("Appended {} records to {:?}", records.len(), self.path);
        Ok(())
    }

    /// Read every record in append order
    ///
    /// A missing file is an empty log. Lines that fail to parse (for example a torn
    /// final write) are skipped with a warning.
    pub fn load(&self) -> Result<Vec<LoggedChunk>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(std::fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LoggedChunk>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed chunk log line {}: {}", line_no + 1, e),
            }
        }
        Ok(records)
    }
}
