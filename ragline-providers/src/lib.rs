//! # ragline-providers
//!
//! Network-backed providers for the ragline pipeline:
//! - [`ollama::OllamaEmbeddings`] - dense embeddings from an Ollama server
//! - [`tei::TeiReranker`] - cross-encoder scores from text-embeddings-inference
//! - [`mock`] - scripted providers for downstream tests

#![warn(missing_docs)]

// Re-export core types for convenience
pub use ragline_core::error::{Error, Result};
pub use ragline_core::provider::EmbeddingProvider;
pub use ragline_core::rerank::RelevanceScorer;

pub mod mock;
pub mod ollama;
pub mod tei;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection pool idle timeout
    pub pool_idle_timeout_secs: u64,
    /// Max idle connections per host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpConfig {
    /// Build a reqwest client
    pub fn build_client(&self) -> Result<reqwest::Client> {
        use std::time::Duration;

        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Map a transport failure to the provider error the pipeline propagates
pub(crate) fn transport_error(provider: &str, timeout_secs: u64, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::ProviderTimeout {
            provider: provider.to_string(),
            timeout_ms: timeout_secs.saturating_mul(1000),
        }
    } else {
        Error::provider_unavailable(provider, err.to_string())
    }
}

/// Turn a non-success HTTP response into a provider error
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(Error::provider_unavailable(
        provider,
        format!("HTTP {}: {}", status, text),
    ))
}

/// Trim a trailing slash so endpoint paths can be appended
pub(crate) fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_builds() {
        assert!(HttpConfig::default().build_client().is_ok());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:11434/"),
            "http://localhost:11434"
        );
        assert_eq!(normalize_base_url("http://tei:8080"), "http://tei:8080");
    }
}
