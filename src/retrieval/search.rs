//! Hybrid search client.
//!
//! Issues one request carrying both a keyword leg (text match over the
//! searchable fields) and a k-NN vector leg over the embedding field. The
//! search engine fuses and re-ranks the two signals itself; this client
//! supplies the signals and a re-rank mode selector, and treats the
//! returned ordering as authoritative. No local re-ranking.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::RetrievalError;

/// Search API version pinned for the request URL.
const SEARCH_API_VERSION: &str = "2024-07-01";
/// Fields matched by the keyword leg.
const SEARCH_FIELDS: &str = "description,filename";
/// Fields returned per hit.
const SELECT_FIELDS: &str = "document_id,description,chunk_index,total_chunks,filename,file_url";
/// Vector field holding chunk embeddings.
const VECTOR_FIELD: &str = "embedding";

/// One ranked knowledge-base chunk returned by the search engine.
///
/// Immutable once returned; the assembler consumes candidates in the
/// order they arrive here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchCandidate {
    /// Index document identifier.
    #[serde(default)]
    pub document_id: String,
    /// Source file name, possibly empty for unattributed chunks.
    #[serde(default)]
    pub filename: String,
    /// Source file URL, possibly empty.
    #[serde(default)]
    pub file_url: String,
    /// Raw chunk text.
    #[serde(default)]
    pub description: String,
    /// Position of this chunk within its source document.
    #[serde(default)]
    pub chunk_index: u32,
    /// Total chunk count for the source document.
    #[serde(default)]
    pub total_chunks: u32,
    /// Fused relevance score assigned by the engine.
    #[serde(rename = "@search.score", default)]
    pub score: f64,
}

/// Trait for search index backends.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Runs one hybrid query and returns candidates in fused rank order.
    ///
    /// An empty result list is success, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Search`] on transport or auth failure.
    async fn search(
        &self,
        query_text: &str,
        query_vector: &[f32],
    ) -> Result<Vec<SearchCandidate>, RetrievalError>;
}

/// HTTP client for the hosted search service.
pub struct HybridSearchClient {
    client: reqwest::Client,
    endpoint: String,
    top_k: usize,
}

impl HybridSearchClient {
    /// Builds a new search client from pipeline configuration.
    ///
    /// `search_top_k` is fixed per deployment and applies to the vector leg.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Search`] if the API key is not a valid
    /// header value or the HTTP client cannot be constructed.
    pub fn new(config: &PipelineConfig) -> Result<Self, RetrievalError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(&config.search_api_key).map_err(|e| RetrievalError::Search {
                message: format!("invalid search API key: {e}"),
                status: None,
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RetrievalError::Search {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
            })?;

        let endpoint = format!(
            "{}/indexes/{}/docs/search?api-version={SEARCH_API_VERSION}",
            config.search_endpoint.trim_end_matches('/'),
            config.search_index,
        );

        Ok(Self {
            client,
            endpoint,
            top_k: config.search_top_k,
        })
    }

    fn build_body<'a>(&self, query_text: &'a str, query_vector: &'a [f32]) -> SearchBody<'a> {
        SearchBody {
            search: query_text,
            search_fields: SEARCH_FIELDS,
            select: SELECT_FIELDS,
            vector_queries: vec![VectorQuery {
                kind: "vector",
                fields: VECTOR_FIELD,
                k: self.top_k,
                vector: query_vector,
            }],
            vector_filter_mode: "preFilter",
            query_type: "semantic",
            top: self.top_k,
        }
    }
}

impl std::fmt::Debug for HybridSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchClient")
            .field("endpoint", &self.endpoint)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchIndex for HybridSearchClient {
    async fn search(
        &self,
        query_text: &str,
        query_vector: &[f32],
    ) -> Result<Vec<SearchCandidate>, RetrievalError> {
        let body = self.build_body(query_text, query_vector);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Search {
                message: e.to_string(),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RetrievalError::Search {
                message: body,
                status: Some(status.as_u16()),
            });
        }

        let parsed: SearchResponse =
            response.json().await.map_err(|e| RetrievalError::Search {
                message: format!("failed to parse search response: {e}"),
                status: Some(status.as_u16()),
            })?;

        debug!(hits = parsed.value.len(), "hybrid search complete");
        Ok(parsed.value)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    search: &'a str,
    search_fields: &'a str,
    select: &'a str,
    vector_queries: Vec<VectorQuery<'a>>,
    vector_filter_mode: &'a str,
    query_type: &'a str,
    top: usize,
}

#[derive(Serialize)]
struct VectorQuery<'a> {
    kind: &'a str,
    fields: &'a str,
    k: usize,
    vector: &'a [f32],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchCandidate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> HybridSearchClient {
        let config = PipelineConfig::builder()
            .api_key("k")
            .search_endpoint("https://search.example.com/")
            .search_index("kb-chunks")
            .search_api_key("search-key")
            .search_top_k(48)
            .ticket_api_url("https://t.example.com")
            .ticket_api_token("t")
            .build()
            .unwrap_or_else(|_| unreachable!());
        HybridSearchClient::new(&config).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_endpoint_construction() {
        let client = test_client();
        assert_eq!(
            client.endpoint,
            format!(
                "https://search.example.com/indexes/kb-chunks/docs/search?api-version={SEARCH_API_VERSION}"
            )
        );
    }

    #[test]
    fn test_body_carries_both_legs() {
        let client = test_client();
        let vector = vec![0.1_f32, 0.2, 0.3];
        let body = client.build_body("printer offline", &vector);
        let json = serde_json::to_value(&body).unwrap_or_default();

        assert_eq!(json["search"], "printer offline");
        assert_eq!(json["searchFields"], SEARCH_FIELDS);
        assert_eq!(json["queryType"], "semantic");
        assert_eq!(json["vectorQueries"][0]["k"], 48);
        assert_eq!(json["vectorQueries"][0]["fields"], VECTOR_FIELD);
        let sent: Vec<f32> = json["vectorQueries"][0]["vector"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(serde_json::Value::as_f64)
                    .map(|v| v as f32)
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(sent, vector);
    }

    #[test]
    fn test_candidate_deserialization() {
        let raw = r#"{
            "value": [
                {
                    "@search.score": 2.5,
                    "document_id": "doc-1_0",
                    "description": "Restart the print spooler.",
                    "chunk_index": 0,
                    "total_chunks": 3,
                    "filename": "printers.pdf",
                    "file_url": "https://kb.example.com/printers.pdf"
                }
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap_or_else(|e| {
            unreachable!("deserialization failed: {e}");
        });
        assert_eq!(parsed.value.len(), 1);
        let hit = &parsed.value[0];
        assert_eq!(hit.filename, "printers.pdf");
        assert_eq!(hit.total_chunks, 3);
        assert!((hit.score - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_result_is_success() {
        let parsed: SearchResponse =
            serde_json::from_str(r#"{"value":[]}"#).unwrap_or_else(|e| {
                unreachable!("deserialization failed: {e}");
            });
        assert!(parsed.value.is_empty());
    }
}
