//! Error types for the retrieval and agent layers.
//!
//! Errors are scoped per layer: retrieval failures (embedding, search,
//! assembly) propagate to the caller untouched, agent failures collapse
//! into a terminal `Failed` outcome with a reason code. No error here is
//! fatal to the process; every failure is scoped to one in-flight query.

use thiserror::Error;

/// Errors from the retrieval pipeline (embedding, search, assembly).
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding service returned a non-success status or no vector.
    #[error("embedding request failed: {message}")]
    Embedding {
        /// Upstream error detail.
        message: String,
        /// HTTP status, if the request reached the service.
        status: Option<u16>,
    },

    /// The search service could not be reached or rejected the request.
    #[error("search request failed: {message}")]
    Search {
        /// Upstream error detail.
        message: String,
        /// HTTP status, if the request reached the service.
        status: Option<u16>,
    },

    /// Tokenizing or formatting the context bundle failed.
    ///
    /// Partial bundles are never returned alongside this error.
    #[error("context assembly failed: {message}")]
    Assembly {
        /// What went wrong while tokenizing or formatting.
        message: String,
    },
}

/// Errors from the tool-calling agent loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Transport or API failure calling the chat model.
    #[error("model call failed: {message}")]
    ModelCall {
        /// Upstream error detail.
        message: String,
    },

    /// The model proposed a tool call whose arguments fail schema validation.
    ///
    /// The call is never dispatched; this is terminal for the query.
    #[error("invalid tool arguments for '{tool}': {message}")]
    ToolArgument {
        /// Name of the proposed tool.
        tool: String,
        /// Validation failure detail.
        message: String,
    },

    /// The ticket API returned a non-2xx response or could not be reached.
    ///
    /// The body is preserved for diagnostics; the loop decides how much
    /// of it is surfaced back to the model.
    #[error("ticket API call failed: {body}")]
    ApiCall {
        /// HTTP status code, if the request reached the service.
        status: Option<u16>,
        /// Raw response body or transport error detail.
        body: String,
    },

    /// The model kept proposing tool calls past the round bound.
    #[error("agent loop exhausted after {max_rounds} tool rounds")]
    LoopExhausted {
        /// Configured maximum tool rounds.
        max_rounds: usize,
    },

    /// No credential is configured for the ticket API.
    #[error("ticket API credential is not configured")]
    MissingCredential,
}

/// Top-level error for building and running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A retrieval stage failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// The agent loop failed.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Configuration errors raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting has no explicit value and no environment fallback.
    #[error("missing required setting: {name}")]
    MissingSetting {
        /// Name of the missing setting (env var name).
        name: &'static str,
    },

    /// A setting was present but could not be parsed.
    #[error("invalid value for {name}: {message}")]
    InvalidSetting {
        /// Name of the offending setting.
        name: &'static str,
        /// Parse failure detail.
        message: String,
    },
}
