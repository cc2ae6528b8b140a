//! Embedding client for OpenAI-compatible embedding endpoints.
//!
//! One query produces one vector; nothing is cached across queries. The
//! empty-query short-circuit belongs to the caller, and so do retries —
//! this layer reports upstream failure and stops.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::RetrievalError;

/// A fixed-dimension embedding vector.
pub type EmbeddingVector = Vec<f32>;

/// Trait for embedding backends.
///
/// Implementations handle the transport layer for a specific embedding
/// service while presenting a uniform interface to the pipeline.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single text into a fixed-dimension vector.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Embedding`] when the service reports a
    /// non-success status or returns no vector.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, RetrievalError>;
}

/// Embedding client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    /// Default API base when no override is configured.
    const DEFAULT_BASE: &'static str = "https://api.openai.com/v1";

    /// Builds a new embedding client from pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Embedding`] if the API key is not a valid
    /// header value or the HTTP client cannot be constructed.
    pub fn new(config: &PipelineConfig) -> Result<Self, RetrievalError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| RetrievalError::Embedding {
                message: format!("invalid API key: {e}"),
                status: None,
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RetrievalError::Embedding {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
            })?;

        let base = config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE)
            .trim_end_matches('/');

        Ok(Self {
            client,
            endpoint: format!("{base}/embeddings"),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
        })
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, RetrievalError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding {
                message: e.to_string(),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RetrievalError::Embedding {
                message: body,
                status: Some(status.as_u16()),
            });
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| RetrievalError::Embedding {
                message: format!("failed to parse embedding response: {e}"),
                status: Some(status.as_u16()),
            })?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RetrievalError::Embedding {
                message: "service returned no embedding vector".to_string(),
                status: Some(status.as_u16()),
            })?;

        Ok(vector)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> PipelineConfig {
        PipelineConfig::builder()
            .api_key("test-key")
            .search_endpoint("https://search.example.com")
            .search_api_key("k")
            .ticket_api_url("https://t.example.com")
            .ticket_api_token("t")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_endpoint_from_default_base() {
        let embedder = OpenAiEmbedder::new(&test_config()).unwrap_or_else(|_| unreachable!());
        assert_eq!(embedder.endpoint, "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn test_endpoint_from_base_override() {
        let config = PipelineConfig::builder()
            .api_key("test-key")
            .base_url("https://proxy.example.com/v1/")
            .search_endpoint("https://search.example.com")
            .search_api_key("k")
            .ticket_api_url("https://t.example.com")
            .ticket_api_token("t")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let embedder = OpenAiEmbedder::new(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(embedder.endpoint, "https://proxy.example.com/v1/embeddings");
    }

    #[test]
    fn test_request_serialization_omits_unset_dimensions() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-large",
            input: "hello",
            dimensions: None,
        };
        let json = serde_json::to_string(&request).unwrap_or_default();
        assert!(json.contains("text-embedding-3-large"));
        assert!(!json.contains("dimensions"));
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}],"usage":{"prompt_tokens":2,"total_tokens":2}}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap_or_else(|e| {
            unreachable!("deserialization failed: {e}");
        });
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].embedding.len(), 3);
    }
}
