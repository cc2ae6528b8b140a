//! Composition root and caller-facing contract.
//!
//! A [`Pipeline`] owns one explicitly constructed instance of every
//! client and hands shared references into each stage. There is no
//! module-level state: lifetime is owned by whoever built the pipeline,
//! and concurrent queries share only these read-only clients — every
//! query gets its own transcript and context bundle.

use std::sync::Arc;

use tracing::debug;

use crate::agent::{ApiExecutor, ChatModel, OpenAiChatModel, TicketAgentLoop};
use crate::config::PipelineConfig;
use crate::error::{AgentError, PipelineError, RetrievalError};
use crate::retrieval::{
    ContextBundle, Embedder, HybridSearchClient, OpenAiEmbedder, SearchIndex, TiktokenTokenizer,
    Tokenizer, assemble,
};

/// The assembled retrieval and agent pipeline.
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn SearchIndex>,
    tokenizer: Arc<dyn Tokenizer>,
    model: Arc<dyn ChatModel>,
    executor: ApiExecutor,
    agent: TicketAgentLoop,
}

impl Pipeline {
    /// Builds a pipeline with production clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any client fails to construct
    /// (invalid key material, missing credential, tokenizer load failure).
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self::new(
            Arc::new(OpenAiEmbedder::new(config)?),
            Arc::new(HybridSearchClient::new(config)?),
            Arc::new(TiktokenTokenizer::new()?),
            Arc::new(OpenAiChatModel::new(config)),
            ApiExecutor::new(config)?,
            TicketAgentLoop::new(config),
        ))
    }

    /// Builds a pipeline over explicit client instances.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn SearchIndex>,
        tokenizer: Arc<dyn Tokenizer>,
        model: Arc<dyn ChatModel>,
        executor: ApiExecutor,
        agent: TicketAgentLoop,
    ) -> Self {
        Self {
            embedder,
            search,
            tokenizer,
            model,
            executor,
            agent,
        }
    }

    /// Retrieves knowledge-base context for a query, bounded by `max_tokens`.
    ///
    /// A blank query short-circuits to an empty bundle without touching
    /// the embedding or search services.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] from the failing stage; errors are never
    /// converted into an empty successful result, except that zero search
    /// hits is a documented success.
    pub async fn get_context(
        &self,
        query: &str,
        max_tokens: usize,
    ) -> Result<ContextBundle, RetrievalError> {
        if query.trim().is_empty() {
            debug!("blank query, returning empty context bundle");
            return Ok(ContextBundle::default());
        }

        let vector = self.embedder.embed(query).await?;
        let candidates = self.search.search(query, &vector).await?;
        assemble(&candidates, self.tokenizer.as_ref(), max_tokens)
    }

    /// Answers a ticket-system question through the tool-calling agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the loop reaches its `Failed` state;
    /// the caller decides what user-facing fallback to render.
    pub async fn answer_via_tools(&self, query: &str) -> Result<String, AgentError> {
        self.agent
            .run(self.model.as_ref(), &self.executor, query)
            .await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::executor::{HttpResponsePayload, HttpTransport};
    use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
    use crate::retrieval::SearchCandidate;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    struct StubEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5; 4])
        }
    }

    struct StubSearch {
        candidates: Vec<SearchCandidate>,
    }

    #[async_trait]
    impl SearchIndex for StubSearch {
        async fn search(
            &self,
            _query_text: &str,
            _query_vector: &[f32],
        ) -> Result<Vec<SearchCandidate>, RetrievalError> {
            Ok(self.candidates.clone())
        }
    }

    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn count_tokens(&self, text: &str) -> Result<usize, RetrievalError> {
            Ok(text.split_whitespace().count())
        }
    }

    struct StubModel;

    #[async_trait]
    impl ChatModel for StubModel {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: "answer".to_string(),
                usage: TokenUsage::default(),
                tool_calls: Vec::new(),
            })
        }
    }

    struct NoopTransport;

    #[async_trait]
    impl HttpTransport for NoopTransport {
        async fn send(
            &self,
            _method: crate::agent::HttpMethod,
            _url: &str,
            _headers: &HashMap<String, String>,
            _body: Option<&serde_json::Value>,
        ) -> Result<HttpResponsePayload, AgentError> {
            Ok(HttpResponsePayload {
                status: 200,
                body: "{}".to_string(),
            })
        }
    }

    fn pipeline(embedder: Arc<StubEmbedder>, candidates: Vec<SearchCandidate>) -> Pipeline {
        let config = PipelineConfig::builder()
            .api_key("k")
            .search_endpoint("https://search.example.com")
            .search_api_key("k")
            .ticket_api_url("https://tickets.example.com/api")
            .ticket_api_token("token")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let executor = ApiExecutor::with_transport(
            Arc::new(NoopTransport),
            "https://tickets.example.com/api",
            "token",
            false,
        )
        .unwrap_or_else(|e| unreachable!("with_transport failed: {e}"));

        Pipeline::new(
            embedder,
            Arc::new(StubSearch { candidates }),
            Arc::new(WordTokenizer),
            Arc::new(StubModel),
            executor,
            TicketAgentLoop::new(&config),
        )
    }

    fn candidate(description: &str) -> SearchCandidate {
        SearchCandidate {
            document_id: "doc-1".to_string(),
            filename: "guide.pdf".to_string(),
            file_url: "https://kb.example.com/guide.pdf".to_string(),
            description: description.to_string(),
            chunk_index: 0,
            total_chunks: 1,
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn test_blank_query_short_circuits() {
        let embedder = Arc::new(StubEmbedder {
            calls: AtomicUsize::new(0),
        });
        let p = pipeline(Arc::clone(&embedder), vec![candidate("alpha")]);

        let bundle = p
            .get_context("   ", 100)
            .await
            .unwrap_or_else(|e| unreachable!("get_context failed: {e}"));
        assert_eq!(bundle, ContextBundle::default());
        // Neither the embedder nor the search index was touched.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_context_runs_full_chain() {
        let embedder = Arc::new(StubEmbedder {
            calls: AtomicUsize::new(0),
        });
        let p = pipeline(Arc::clone(&embedder), vec![candidate("reset your password")]);

        let bundle = p
            .get_context("password reset", 200)
            .await
            .unwrap_or_else(|e| unreachable!("get_context failed: {e}"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert!(bundle.output_text.contains("reset your password"));
        assert_eq!(bundle.source.filename, "guide.pdf");
        assert!(bundle.token_count <= 200);
    }

    #[tokio::test]
    async fn test_no_hits_is_empty_success() {
        let embedder = Arc::new(StubEmbedder {
            calls: AtomicUsize::new(0),
        });
        let p = pipeline(embedder, Vec::new());

        let bundle = p
            .get_context("nothing matches this", 100)
            .await
            .unwrap_or_else(|e| unreachable!("get_context failed: {e}"));
        assert_eq!(bundle.token_count, 0);
        assert!(!bundle.truncated);
    }

    #[tokio::test]
    async fn test_answer_via_tools_returns_model_text() {
        let embedder = Arc::new(StubEmbedder {
            calls: AtomicUsize::new(0),
        });
        let p = pipeline(embedder, Vec::new());

        let answer = p
            .answer_via_tools("my tickets")
            .await
            .unwrap_or_else(|e| unreachable!("answer_via_tools failed: {e}"));
        assert_eq!(answer, "answer");
    }
}
