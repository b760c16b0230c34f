//! Ollama embedding provider
//!
//! Calls the native `/api/embed` endpoint, which accepts a batch of inputs and
//! returns one vector per input. Vectors are re-normalized to unit length so
//! dense scores stay cosine similarities regardless of the served model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{check_status, normalize_base_url, transport_error, EmbeddingProvider, Error, HttpConfig, Result};
use ragline_core::provider::EmbeddingFamily;

/// Default local Ollama server
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// BGE small English v1.5 - 384 dimensions
pub const BGE_SMALL_EN: &str = "bge-small-en-v1.5";
/// Nomic embed text - 768 dimensions
pub const NOMIC_EMBED_TEXT: &str = "nomic-embed-text";
/// mxbai embed large - 1024 dimensions
pub const MXBAI_EMBED_LARGE: &str = "mxbai-embed-large";

const PROVIDER: &str = "ollama";

/// Ollama embeddings client
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
    family: EmbeddingFamily,
    dimension: usize,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddings {
    /// Create a client for `model` served at `base_url`
    ///
    /// `dimension` is the model's output size; responses of any other size are
    /// rejected.
    ///
    /// # Example
    /// ```no_run
    /// use ragline_providers::ollama::{OllamaEmbeddings, BGE_SMALL_EN};
    ///
    /// let embedder = OllamaEmbeddings::new("http://localhost:11434", BGE_SMALL_EN, 384).unwrap();
    /// ```
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Result<Self> {
        Self::with_config(base_url, model, dimension, &HttpConfig::default())
    }

    /// Create with a custom HTTP configuration
    pub fn with_config(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        http: &HttpConfig,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config("embedding dimension must be at least 1".into()));
        }
        let model = model.into();
        Ok(Self {
            client: http.build_client()?,
            base_url: normalize_base_url(base_url),
            family: EmbeddingFamily::from_model_name(&model),
            model,
            dimension,
            timeout_secs: http.timeout_secs,
        })
    }

    /// Create from the environment
    ///
    /// Reads `OLLAMA_BASE_URL` (default `http://localhost:11434`),
    /// `OLLAMA_EMBED_MODEL` (default [`BGE_SMALL_EN`]) and `OLLAMA_EMBED_DIM`
    /// (default 384).
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| BGE_SMALL_EN.to_string());
        let dimension = match std::env::var("OLLAMA_EMBED_DIM") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("OLLAMA_EMBED_DIM is not a number: {raw}")))?,
            Err(_) => 384,
        };
        Self::new(base_url, model, dimension)
    }

    /// The served model name
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout_secs, e))?;
        let response = check_status(PROVIDER, response).await?;

        let body: EmbedResponse = response.json().await.map_err(|e| {
            Error::provider_unavailable(PROVIDER, format!("Failed to parse embed response: {}", e))
        })?;
        debug!(model = %self.model, count = body.embeddings.len(), "Ollama embeddings received");

        self.validate(inputs.len(), body.embeddings)
    }

    fn validate(&self, expected: usize, embeddings: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
        if embeddings.len() != expected {
            return Err(Error::provider_unavailable(
                PROVIDER,
                format!("expected {} embeddings, got {}", expected, embeddings.len()),
            ));
        }
        embeddings
            .into_iter()
            .map(|vector| {
                if vector.len() != self.dimension {
                    return Err(Error::provider_unavailable(
                        PROVIDER,
                        format!(
                            "model {} returned {} dimensions, expected {}",
                            self.model,
                            vector.len(),
                            self.dimension
                        ),
                    ));
                }
                Ok(unit_length(vector))
            })
            .collect()
    }
}

/// Scale a vector to unit length; a zero vector is returned unchanged
fn unit_length(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::provider_unavailable(PROVIDER, "No embedding returned"))
    }

    async fn encode_passages(&self, passages: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_batch(passages).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn family(&self) -> EmbeddingFamily {
        self.family
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_creation() {
        let embedder = OllamaEmbeddings::new("http://localhost:11434/", BGE_SMALL_EN, 384).unwrap();
        assert_eq!(embedder.base_url, "http://localhost:11434");
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.model(), BGE_SMALL_EN);
    }

    #[test]
    fn test_family_follows_model() {
        let bge = OllamaEmbeddings::new(DEFAULT_BASE_URL, BGE_SMALL_EN, 384).unwrap();
        assert_eq!(bge.family(), EmbeddingFamily::Bge);

        let nomic = OllamaEmbeddings::new(DEFAULT_BASE_URL, NOMIC_EMBED_TEXT, 768).unwrap();
        assert_eq!(nomic.family(), EmbeddingFamily::Generic);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = OllamaEmbeddings::new(DEFAULT_BASE_URL, BGE_SMALL_EN, 0)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_response_is_normalized() {
        let body: EmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[3.0,4.0],[0.0,0.0]]}"#).unwrap();
        let embedder = OllamaEmbeddings::new(DEFAULT_BASE_URL, "m", 2).unwrap();

        let vectors = embedder.validate(2, body.embeddings).unwrap();
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
        assert!((vectors[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(vectors[1], vec![0.0, 0.0]);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let embedder = OllamaEmbeddings::new(DEFAULT_BASE_URL, "m", 3).unwrap();

        let short = embedder.validate(1, vec![vec![1.0, 0.0]]).unwrap_err();
        assert!(matches!(short, Error::ProviderUnavailable { .. }));

        let missing = embedder.validate(2, vec![vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert!(missing.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = OllamaEmbeddings::new("http://127.0.0.1:9", "m", 3).unwrap();
        assert!(embedder.encode_passages(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_provider_failure() {
        let embedder = OllamaEmbeddings::new("http://127.0.0.1:9", "m", 3).unwrap();
        let err = embedder.encode_query("hello").await.unwrap_err();
        assert!(err.is_provider_failure());
    }
}
