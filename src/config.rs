//! Pipeline configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! Secrets (model API key, search key, ticket API token) are always
//! environment-supplied in deployments; the builder setters exist for tests
//! and embedding callers.

use std::time::Duration;

use crate::error::ConfigError;

/// Default chat model deployment.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
/// Default embedding model deployment.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
/// Default number of nearest neighbours requested on the vector leg.
const DEFAULT_SEARCH_TOP_K: usize = 48;
/// Default search index name.
const DEFAULT_SEARCH_INDEX: &str = "kb-chunks";
/// Default maximum tool rounds before the forced synthesis call.
const DEFAULT_MAX_TOOL_ROUNDS: usize = 1;
/// Default maximum tokens for model answers.
const DEFAULT_ANSWER_MAX_TOKENS: u32 = 1024;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for the retrieval and agent pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// API key for the chat-completion and embedding services.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Chat model deployment name.
    pub chat_model: String,
    /// Embedding model deployment name.
    pub embedding_model: String,
    /// Fixed output dimensionality requested from the embedding service.
    pub embedding_dimensions: Option<usize>,
    /// Base URL of the search service.
    pub search_endpoint: String,
    /// Index queried for knowledge-base chunks.
    pub search_index: String,
    /// API key for the search service.
    pub search_api_key: String,
    /// Nearest-neighbour count for the vector leg of hybrid queries.
    pub search_top_k: usize,
    /// Base URL of the external ticket API.
    pub ticket_api_url: String,
    /// Long-lived credential for the ticket API, injected by the executor.
    pub ticket_api_token: String,
    /// Maximum model↔tool round trips before the forced synthesis call.
    pub max_tool_rounds: usize,
    /// Maximum tokens for model answers.
    pub answer_max_tokens: u32,
    /// Whether the tool may issue POST/PUT/DELETE calls.
    ///
    /// Off by default: the model can only read from the ticket API unless
    /// the deployment explicitly opts in to mutating calls.
    pub allow_mutating_calls: bool,
    /// Request timeout applied to every outbound HTTP call.
    pub timeout: Duration,
}

impl PipelineConfig {
    /// Creates a new builder for `PipelineConfig`.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] if a required secret or
    /// endpoint is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    chat_model: Option<String>,
    embedding_model: Option<String>,
    embedding_dimensions: Option<usize>,
    search_endpoint: Option<String>,
    search_index: Option<String>,
    search_api_key: Option<String>,
    search_top_k: Option<usize>,
    ticket_api_url: Option<String>,
    ticket_api_token: Option<String>,
    max_tool_rounds: Option<usize>,
    answer_max_tokens: Option<u32>,
    allow_mutating_calls: Option<bool>,
    timeout: Option<Duration>,
}

impl PipelineConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("DESKRAG_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("DESKRAG_BASE_URL"))
                .ok();
        }
        if self.chat_model.is_none() {
            self.chat_model = std::env::var("DESKRAG_CHAT_MODEL").ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("DESKRAG_EMBEDDING_MODEL").ok();
        }
        if self.search_endpoint.is_none() {
            self.search_endpoint = std::env::var("DESKRAG_SEARCH_ENDPOINT").ok();
        }
        if self.search_index.is_none() {
            self.search_index = std::env::var("DESKRAG_SEARCH_INDEX").ok();
        }
        if self.search_api_key.is_none() {
            self.search_api_key = std::env::var("DESKRAG_SEARCH_API_KEY").ok();
        }
        if self.search_top_k.is_none() {
            self.search_top_k = std::env::var("DESKRAG_SEARCH_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.ticket_api_url.is_none() {
            self.ticket_api_url = std::env::var("DESKRAG_TICKET_API_URL").ok();
        }
        if self.ticket_api_token.is_none() {
            self.ticket_api_token = std::env::var("DESKRAG_TICKET_API_TOKEN").ok();
        }
        if self.max_tool_rounds.is_none() {
            self.max_tool_rounds = std::env::var("DESKRAG_MAX_TOOL_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.allow_mutating_calls.is_none() {
            self.allow_mutating_calls = std::env::var("DESKRAG_ALLOW_MUTATING_CALLS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        self
    }

    /// Sets the model API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override for the model services.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the chat model deployment.
    #[must_use]
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    /// Sets the embedding model deployment.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the requested embedding dimensionality.
    #[must_use]
    pub const fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.embedding_dimensions = Some(dims);
        self
    }

    /// Sets the search service endpoint.
    #[must_use]
    pub fn search_endpoint(mut self, url: impl Into<String>) -> Self {
        self.search_endpoint = Some(url.into());
        self
    }

    /// Sets the search index name.
    #[must_use]
    pub fn search_index(mut self, index: impl Into<String>) -> Self {
        self.search_index = Some(index.into());
        self
    }

    /// Sets the search service API key.
    #[must_use]
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self
    }

    /// Sets the vector-leg nearest-neighbour count.
    #[must_use]
    pub const fn search_top_k(mut self, k: usize) -> Self {
        self.search_top_k = Some(k);
        self
    }

    /// Sets the ticket API base URL.
    #[must_use]
    pub fn ticket_api_url(mut self, url: impl Into<String>) -> Self {
        self.ticket_api_url = Some(url.into());
        self
    }

    /// Sets the ticket API credential.
    #[must_use]
    pub fn ticket_api_token(mut self, token: impl Into<String>) -> Self {
        self.ticket_api_token = Some(token.into());
        self
    }

    /// Sets the maximum tool rounds.
    #[must_use]
    pub const fn max_tool_rounds(mut self, n: usize) -> Self {
        self.max_tool_rounds = Some(n);
        self
    }

    /// Sets the answer max tokens.
    #[must_use]
    pub const fn answer_max_tokens(mut self, n: u32) -> Self {
        self.answer_max_tokens = Some(n);
        self
    }

    /// Allows or forbids mutating (POST/PUT/DELETE) tool calls.
    #[must_use]
    pub const fn allow_mutating_calls(mut self, allow: bool) -> Self {
        self.allow_mutating_calls = Some(allow);
        self
    }

    /// Sets the outbound request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Builds the [`PipelineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] if the model API key, search
    /// endpoint, search key, ticket API URL, or ticket API token is unset.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let api_key = self.api_key.ok_or(ConfigError::MissingSetting {
            name: "OPENAI_API_KEY",
        })?;
        let search_endpoint = self.search_endpoint.ok_or(ConfigError::MissingSetting {
            name: "DESKRAG_SEARCH_ENDPOINT",
        })?;
        let search_api_key = self.search_api_key.ok_or(ConfigError::MissingSetting {
            name: "DESKRAG_SEARCH_API_KEY",
        })?;
        let ticket_api_url = self.ticket_api_url.ok_or(ConfigError::MissingSetting {
            name: "DESKRAG_TICKET_API_URL",
        })?;
        let ticket_api_token = self.ticket_api_token.ok_or(ConfigError::MissingSetting {
            name: "DESKRAG_TICKET_API_TOKEN",
        })?;

        Ok(PipelineConfig {
            api_key,
            base_url: self.base_url,
            chat_model: self
                .chat_model
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimensions: self.embedding_dimensions,
            search_endpoint,
            search_index: self
                .search_index
                .unwrap_or_else(|| DEFAULT_SEARCH_INDEX.to_string()),
            search_api_key,
            search_top_k: self.search_top_k.unwrap_or(DEFAULT_SEARCH_TOP_K),
            ticket_api_url,
            ticket_api_token,
            max_tool_rounds: self.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
            answer_max_tokens: self.answer_max_tokens.unwrap_or(DEFAULT_ANSWER_MAX_TOKENS),
            allow_mutating_calls: self.allow_mutating_calls.unwrap_or(false),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        })
    }
}
