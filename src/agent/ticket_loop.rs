//! Bounded two-phase tool-calling loop for ticket questions.
//!
//! Drives the model ↔ ticket-API round trip: the tool phase attaches the
//! `make_api_call` schema and executes at most `max_tool_rounds` proposals;
//! the synthesis phase re-asks the model without any tools attached, so it
//! cannot propose another call and the loop terminates within a fixed
//! number of model round trips.
//!
//! Tool execution failures are fed back to the model as data — the model
//! gets to see the error and adapt its answer. Only model transport errors
//! and argument-validation failures terminate the loop early.

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::AgentError;

use super::executor::ApiExecutor;
use super::message::{
    ChatMessage, ChatRequest, assistant_tool_calls_message, system_message, tool_message,
    user_message,
};
use super::prompt::{SYNTHESIS_SYSTEM_PROMPT, TOOL_PHASE_SYSTEM_PROMPT};
use super::provider::ChatModel;
use super::tool::{ApiCallArgs, ToolCall, ToolResult, make_api_call_tool};

/// States of the agent loop, traced on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    /// Waiting for the model's next turn.
    AwaitingModelTurn,
    /// Dispatching a validated tool call.
    ExecutingTool,
    /// Schema-free final answer call.
    Synthesizing,
}

/// The bounded agent loop over one query's transcript.
///
/// Holds only per-deployment settings; all per-query state lives in the
/// transcript built inside [`Self::run`], so concurrent queries share
/// nothing.
#[derive(Debug, Clone)]
pub struct TicketAgentLoop {
    model: String,
    max_tokens: u32,
    max_tool_rounds: usize,
}

impl TicketAgentLoop {
    /// Creates a loop from pipeline configuration.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            model: config.chat_model.clone(),
            max_tokens: config.answer_max_tokens,
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    /// Runs the loop for one query and returns the final answer text.
    ///
    /// # Errors
    ///
    /// - [`AgentError::ModelCall`] if a model call fails in transport.
    /// - [`AgentError::ToolArgument`] if a proposal fails validation; the
    ///   proposal is never dispatched.
    /// - [`AgentError::LoopExhausted`] if the model still will not produce
    ///   free-form content in the schema-free synthesis call.
    pub async fn run(
        &self,
        model: &dyn ChatModel,
        executor: &ApiExecutor,
        query: &str,
    ) -> Result<String, AgentError> {
        let mut transcript = vec![
            system_message(TOOL_PHASE_SYSTEM_PROMPT),
            user_message(query),
        ];
        let mut state = LoopState::AwaitingModelTurn;

        for round in 0..self.max_tool_rounds {
            debug!(round, ?state, "tool phase model call");
            let request = ChatRequest {
                model: self.model.clone(),
                messages: transcript.clone(),
                temperature: Some(0.0),
                max_tokens: Some(self.max_tokens),
                tools: vec![make_api_call_tool()],
            };
            let response = model.chat(&request).await?;

            if response.tool_calls.is_empty() {
                // Free-form content instead of a tool call: final answer.
                if response.content.trim().is_empty() {
                    return Err(AgentError::ModelCall {
                        message: "model returned neither content nor a tool call".to_string(),
                    });
                }
                debug!(round, "model answered without tool use");
                return Ok(response.content);
            }

            state = LoopState::ExecutingTool;
            debug!(round, tool_count = response.tool_calls.len(), ?state, "executing tool calls");
            transcript.push(assistant_tool_calls_message(
                &response.content,
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let result = dispatch(executor, call).await?;
                transcript.push(tool_message(&result.tool_call_id, &result.content));
            }
            state = LoopState::AwaitingModelTurn;
        }

        state = LoopState::Synthesizing;
        debug!(?state, "schema-free synthesis call");
        let response = model.chat(&self.synthesis_request(transcript)).await?;

        if !response.tool_calls.is_empty() || response.content.trim().is_empty() {
            warn!("model kept proposing tool calls past the round bound");
            return Err(AgentError::LoopExhausted {
                max_rounds: self.max_tool_rounds,
            });
        }

        Ok(response.content)
    }

    /// Builds the synthesis request: same transcript, synthesis system
    /// prompt, no tool schema attached.
    fn synthesis_request(&self, transcript: Vec<ChatMessage>) -> ChatRequest {
        let mut messages = vec![system_message(SYNTHESIS_SYSTEM_PROMPT)];
        messages.extend(transcript.into_iter().skip(1));
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            tools: Vec::new(),
        }
    }
}

/// Validates and dispatches one tool-call proposal.
///
/// Validation failures propagate (terminal for the query); API failures
/// become an error-flagged [`ToolResult`] for the model to interpret.
async fn dispatch(executor: &ApiExecutor, call: &ToolCall) -> Result<ToolResult, AgentError> {
    if call.name != "make_api_call" {
        return Err(AgentError::ToolArgument {
            tool: call.name.clone(),
            message: "unknown tool".to_string(),
        });
    }

    let args = ApiCallArgs::parse(&call.arguments)?;

    match executor.execute(&args).await {
        Ok(body) => Ok(ToolResult {
            tool_call_id: call.id.clone(),
            content: body,
            is_error: false,
        }),
        Err(AgentError::ApiCall { status, body }) => {
            warn!(?status, "ticket API call failed; surfacing to model");
            let detail = status.map_or_else(
                || format!("API call failed before reaching the service: {body}"),
                |s| format!("API call failed with status {s}: {body}"),
            );
            Ok(ToolResult {
                tool_call_id: call.id.clone(),
                content: detail,
                is_error: true,
            })
        }
        Err(other) => Err(other),
    }
}
