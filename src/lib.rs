//! Hybrid-search retrieval and tool-calling agent pipeline for helpdesk
//! question answering.
//!
//! Two caller-facing operations, both request-scoped:
//!
//! - [`Pipeline::get_context`] — embed the query, run one hybrid
//!   (keyword + vector) search, and fold the ranked chunks into a
//!   token-bounded, citation-bearing [`retrieval::ContextBundle`].
//! - [`Pipeline::answer_via_tools`] — hand the query to a bounded
//!   tool-calling loop in which the chat model may issue REST calls
//!   against the external ticket API and then synthesize a final answer
//!   in a schema-free second phase.
//!
//! All clients are constructed explicitly at the composition root and
//! injected; nothing is cached across queries.

pub mod agent;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod retrieval;

pub use config::PipelineConfig;
pub use error::{AgentError, ConfigError, PipelineError, RetrievalError};
pub use pipeline::Pipeline;
