use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
