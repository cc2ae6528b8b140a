//! Tool-calling agent for ticket-system questions.
//!
//! Lets the chat model request REST calls against the external ticket API
//! and synthesize a grounded answer from the results:
//!
//! ```text
//! query → TicketAgentLoop
//!   ├── phase 1: model call with the make_api_call schema
//!   │     └── validated proposal → ApiExecutor → result appended as data
//!   └── phase 2: schema-free model call → final answer
//! ```
//!
//! The synthesis phase carries no tool schema, so the loop terminates
//! within a fixed number of model round trips by construction.

pub mod executor;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod ticket_loop;
pub mod tool;

// Re-export key types
pub use executor::{ApiExecutor, HttpResponsePayload, HttpTransport, ReqwestTransport};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use provider::ChatModel;
pub use providers::OpenAiChatModel;
pub use ticket_loop::TicketAgentLoop;
pub use tool::{ApiCallArgs, HttpMethod, ToolCall, ToolDefinition, ToolResult, make_api_call_tool};
