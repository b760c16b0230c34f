//! Error types for ragline

use thiserror::Error;

/// Result type alias using ragline's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ragline
///
/// A grounding refusal is not an error: it is returned as a normal
/// [`Answer`](crate::synth::Answer). A degraded reranker is recovered inside the
/// pipeline and only logged.
#[derive(Debug, Error)]
pub enum Error {
    // ============ Input Errors ============
    /// Empty or invalid query / ingestion payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ============ Provider Errors ============
    /// Embedding or index provider call failed
    #[error("Provider unavailable: {provider} - {message}")]
    ProviderUnavailable {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Provider call exceeded its deadline
    #[error("Provider timeout: {provider} after {timeout_ms}ms")]
    ProviderTimeout {
        /// Provider name
        provider: String,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    // ============ Configuration Errors ============
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    // ============ Storage Errors ============
    /// Built-in index backend failure
    #[cfg(feature = "index")]
    #[error("Index error: {0}")]
    Index(#[from] ragline_index::IndexError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ============ Generic Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new provider unavailable error
    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from an external provider call
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::ProviderTimeout { .. }
        )
    }

    /// Check if this error is retryable
    ///
    /// The pipeline never retries on its own; this tells the caller whether a retry
    /// can succeed with unchanged input.
    pub fn is_retryable(&self) -> bool {
        self.is_provider_failure()
    }
}
