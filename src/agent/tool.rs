//! Tool contract for the ticket-API agent.
//!
//! One callable tool is declared to the model: `make_api_call`, a generic
//! REST invocation against the external ticket API. Proposed arguments are
//! deserialized into a typed, schema-validated structure before any
//! dispatch; anything malformed is a typed error, never a silent best-effort
//! call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the model.
const MAX_TOOL_ARGS_LEN: usize = 100_000;
/// Hard cap on the `max_results` clamp a model may request.
pub(crate) const MAX_RESULTS_CAP: usize = 100;

/// A tool definition that can be sent to a model for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the dispatch check in the loop).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call proposed by the model. Never self-issued by the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call, fed back to the model as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (response payload on success, error detail on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// HTTP method accepted by `make_api_call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Read a resource.
    Get,
    /// Create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Delete a resource.
    Delete,
}

impl HttpMethod {
    /// Whether this method can change state on the target system.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }

    /// Method name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Validated arguments for one `make_api_call` invocation.
///
/// `method`, `url`, and `headers` are required; a proposal missing any of
/// them fails validation before reaching the network.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCallArgs {
    /// HTTP method to use.
    pub method: HttpMethod,
    /// Target URL or path, resolved against the configured API base.
    pub url: String,
    /// Request headers proposed by the model. The executor overrides the
    /// authentication header regardless of what appears here.
    pub headers: HashMap<String, String>,
    /// Optional JSON request body.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Optional clamp on the number of array elements returned to the model.
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl ApiCallArgs {
    /// Parses and validates raw tool-call arguments.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolArgument`] if the payload is oversized,
    /// is not valid JSON, or is missing a required field.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        if raw.len() > MAX_TOOL_ARGS_LEN {
            return Err(AgentError::ToolArgument {
                tool: "make_api_call".to_string(),
                message: format!(
                    "arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    raw.len()
                ),
            });
        }

        let args: Self = serde_json::from_str(raw).map_err(|e| AgentError::ToolArgument {
            tool: "make_api_call".to_string(),
            message: e.to_string(),
        })?;

        if args.url.trim().is_empty() {
            return Err(AgentError::ToolArgument {
                tool: "make_api_call".to_string(),
                message: "url must not be empty".to_string(),
            });
        }

        Ok(args)
    }

    /// The effective result clamp, capped at [`MAX_RESULTS_CAP`].
    #[must_use]
    pub fn effective_max_results(&self) -> Option<usize> {
        self.max_results.map(|n| n.clamp(1, MAX_RESULTS_CAP))
    }
}

/// Defines the single `make_api_call` tool exposed to the model.
#[must_use]
pub fn make_api_call_tool() -> ToolDefinition {
    ToolDefinition {
        name: "make_api_call".to_string(),
        description: "Issue one REST call against the ticket API and return the raw \
                       JSON response. Authentication is handled by the system; do not \
                       supply credentials."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "DELETE"],
                    "description": "HTTP method for the call."
                },
                "url": {
                    "type": "string",
                    "description": "Path relative to the ticket API base, including any query string."
                },
                "headers": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Request headers. Authentication headers are ignored."
                },
                "data": {
                    "description": "JSON request body for POST/PUT calls."
                },
                "max_results": {
                    "type": "integer",
                    "description": "Limit the number of array elements returned."
                }
            },
            "required": ["method", "url", "headers"],
            "additionalProperties": false
        }),
    }
}
