//! Ticket-API executor for validated tool calls.
//!
//! Owns the trust boundary between the model and the external ticket
//! system: the long-lived credential is resolved from configuration and
//! injected into every outgoing call, overriding anything the model put
//! in the authentication header. Model-supplied URLs are resolved against
//! the configured API base and rejected if they point elsewhere.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::AgentError;

use super::tool::{ApiCallArgs, HttpMethod};

/// Header the executor always overwrites with the injected credential.
const AUTH_HEADER: &str = "authorization";

/// Raw response from the ticket API.
#[derive(Debug, Clone)]
pub struct HttpResponsePayload {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

/// Trait for the HTTP transport under the executor.
///
/// Separated so tests can count calls and inspect outgoing headers
/// without a network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one HTTP request and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiCall`] with `status: None` when the
    /// request never reaches the service.
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponsePayload, AgentError>;
}

/// Transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiCall`] if the HTTP client cannot be built.
    pub fn new(config: &PipelineConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::ApiCall {
                status: None,
                body: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponsePayload, AgentError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::try_from(name.as_str()).map_err(|e| AgentError::ApiCall {
                status: None,
                body: format!("invalid header name '{name}': {e}"),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| AgentError::ApiCall {
                status: None,
                body: format!("invalid header value for '{name}': {e}"),
            })?;
            header_map.insert(name, value);
        }

        let reqwest_method = match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut request = self.client.request(reqwest_method, url).headers(header_map);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| AgentError::ApiCall {
            status: None,
            body: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());

        Ok(HttpResponsePayload { status, body })
    }
}

/// Executes validated `make_api_call` invocations against the ticket API.
pub struct ApiExecutor {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: String,
    allow_mutating_calls: bool,
}

impl ApiExecutor {
    /// Builds an executor with a `reqwest` transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::MissingCredential`] if the ticket API token
    /// is empty, or [`AgentError::ApiCall`] if the transport cannot be built.
    pub fn new(config: &PipelineConfig) -> Result<Self, AgentError> {
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Self::with_transport(
            transport,
            &config.ticket_api_url,
            &config.ticket_api_token,
            config.allow_mutating_calls,
        )
    }

    /// Builds an executor over an explicit transport.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::MissingCredential`] if `token` is empty.
    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        token: &str,
        allow_mutating_calls: bool,
    ) -> Result<Self, AgentError> {
        if token.trim().is_empty() {
            return Err(AgentError::MissingCredential);
        }
        Ok(Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            allow_mutating_calls,
        })
    }

    /// Checks the method policy for a validated proposal.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolArgument`] for mutating methods when the
    /// deployment has not opted in to them.
    pub fn check_policy(&self, args: &ApiCallArgs) -> Result<(), AgentError> {
        if args.method.is_mutating() && !self.allow_mutating_calls {
            return Err(AgentError::ToolArgument {
                tool: "make_api_call".to_string(),
                message: format!(
                    "{} calls are disabled; only GET is permitted",
                    args.method.as_str()
                ),
            });
        }
        Ok(())
    }

    /// Executes one validated API call.
    ///
    /// Returns the response body, clamped to `max_results` elements when
    /// the body is a JSON array and a clamp was requested.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolArgument`] on a policy or URL violation
    /// (no network call is made) and [`AgentError::ApiCall`] on transport
    /// failure or a non-2xx response.
    pub async fn execute(&self, args: &ApiCallArgs) -> Result<String, AgentError> {
        self.check_policy(args)?;
        let url = self.resolve_url(&args.url)?;
        let headers = self.inject_credential(&args.headers);

        debug!(method = args.method.as_str(), url = %url, "executing ticket API call");

        let response = self
            .transport
            .send(args.method, &url, &headers, args.data.as_ref())
            .await?;

        if !(200..300).contains(&response.status) {
            warn!(
                status = response.status,
                "ticket API returned non-success status"
            );
            return Err(AgentError::ApiCall {
                status: Some(response.status),
                body: response.body,
            });
        }

        Ok(clamp_array_results(
            response.body,
            args.effective_max_results(),
        ))
    }

    /// Resolves a model-supplied URL against the configured API base.
    ///
    /// Absolute URLs pointing outside the base are rejected: the base is
    /// environment-supplied, never model-supplied.
    fn resolve_url(&self, url: &str) -> Result<String, AgentError> {
        let url = url.trim();
        if let Some(rest) = url.strip_prefix(&self.base_url) {
            // A bare prefix match is not containment: a sibling path like
            // `{base}-private/x` shares the prefix but is a different API.
            if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
                return Ok(url.to_string());
            }
        }
        if url.contains("://") {
            Err(AgentError::ToolArgument {
                tool: "make_api_call".to_string(),
                message: format!("url '{url}' is outside the configured ticket API"),
            })
        } else if url.starts_with('/') {
            Ok(format!("{}{url}", self.base_url))
        } else {
            Ok(format!("{}/{url}", self.base_url))
        }
    }

    /// Merges model-supplied headers with the injected credential.
    ///
    /// The credential always wins on collision, whatever the casing of
    /// the model-supplied header name.
    fn inject_credential(&self, headers: &HashMap<String, String>) -> HashMap<String, String> {
        let mut merged: HashMap<String, String> = headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(AUTH_HEADER))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        merged.insert("Authorization".to_string(), format!("Bearer {}", self.token));
        merged
    }
}

impl std::fmt::Debug for ApiExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiExecutor")
            .field("base_url", &self.base_url)
            .field("allow_mutating_calls", &self.allow_mutating_calls)
            .finish_non_exhaustive()
    }
}

/// Truncates a JSON array body to at most `max` elements.
///
/// Non-array bodies pass through unchanged.
fn clamp_array_results(body: String, max: Option<usize>) -> String {
    let Some(max) = max else {
        return body;
    };
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Array(mut items)) if items.len() > max => {
            items.truncate(max);
            serde_json::Value::Array(items).to_string()
        }
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport stub that records calls and returns a canned response.
    struct StubTransport {
        call_count: AtomicUsize,
        seen_headers: Mutex<Option<HashMap<String, String>>>,
        seen_url: Mutex<Option<String>>,
        response: HttpResponsePayload,
    }

    impl StubTransport {
        fn returning(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                call_count: AtomicUsize::new(0),
                seen_headers: Mutex::new(None),
                seen_url: Mutex::new(None),
                response: HttpResponsePayload {
                    status,
                    body: body.to_string(),
                },
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn send(
            &self,
            _method: HttpMethod,
            url: &str,
            headers: &HashMap<String, String>,
            _body: Option<&serde_json::Value>,
        ) -> Result<HttpResponsePayload, AgentError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut guard) = self.seen_headers.lock() {
                *guard = Some(headers.clone());
            }
            if let Ok(mut guard) = self.seen_url.lock() {
                *guard = Some(url.to_string());
            }
            Ok(self.response.clone())
        }
    }

    fn executor(transport: Arc<StubTransport>, allow_mutating: bool) -> ApiExecutor {
        ApiExecutor::with_transport(
            transport,
            "https://tickets.example.com/api/",
            "real-token",
            allow_mutating,
        )
        .unwrap_or_else(|e| unreachable!("with_transport failed: {e}"))
    }

    fn get_args(url: &str) -> ApiCallArgs {
        ApiCallArgs::parse(&format!(r#"{{"method":"GET","url":"{url}","headers":{{}}}}"#))
            .unwrap_or_else(|e| unreachable!("parse failed: {e}"))
    }

    #[test]
    fn test_empty_token_is_missing_credential() {
        let transport = StubTransport::returning(200, "{}");
        let result = ApiExecutor::with_transport(transport, "https://t.example.com", "  ", false);
        assert!(matches!(result, Err(AgentError::MissingCredential)));
    }

    #[tokio::test]
    async fn test_forged_authorization_header_is_overridden() {
        let transport = StubTransport::returning(200, "{}");
        let exec = executor(Arc::clone(&transport), false);

        let args = ApiCallArgs::parse(
            r#"{"method":"GET","url":"/tickets","headers":{"authorization":"Bearer forged","X-Trace":"abc"}}"#,
        )
        .unwrap_or_else(|e| unreachable!("parse failed: {e}"));

        exec.execute(&args)
            .await
            .unwrap_or_else(|e| unreachable!("execute failed: {e}"));

        let seen = transport
            .seen_headers
            .lock()
            .ok()
            .and_then(|g| g.clone())
            .unwrap_or_default();
        assert_eq!(seen.get("Authorization").map(String::as_str), Some("Bearer real-token"));
        assert_eq!(seen.get("X-Trace").map(String::as_str), Some("abc"));
        assert!(!seen.values().any(|v| v.contains("forged")));
    }

    #[tokio::test]
    async fn test_relative_url_joined_to_base() {
        let transport = StubTransport::returning(200, "{}");
        let exec = executor(Arc::clone(&transport), false);

        exec.execute(&get_args("/tickets?status=open"))
            .await
            .unwrap_or_else(|e| unreachable!("execute failed: {e}"));

        let seen = transport
            .seen_url
            .lock()
            .ok()
            .and_then(|g| g.clone())
            .unwrap_or_default();
        assert_eq!(seen, "https://tickets.example.com/api/tickets?status=open");
    }

    #[tokio::test]
    async fn test_foreign_url_rejected_without_network_call() {
        let transport = StubTransport::returning(200, "{}");
        let exec = executor(Arc::clone(&transport), false);

        let result = exec.execute(&get_args("https://evil.example.com/steal")).await;
        assert!(matches!(result, Err(AgentError::ToolArgument { .. })));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_sibling_path_sharing_base_prefix_rejected() {
        let transport = StubTransport::returning(200, "{}");
        let exec = executor(Arc::clone(&transport), false);

        let result = exec
            .execute(&get_args("https://tickets.example.com/api-private/steal"))
            .await;
        assert!(matches!(result, Err(AgentError::ToolArgument { .. })));
        assert_eq!(transport.calls(), 0);

        // An absolute URL genuinely under the base still passes.
        exec.execute(&get_args("https://tickets.example.com/api/tickets"))
            .await
            .unwrap_or_else(|e| unreachable!("execute failed: {e}"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_mutating_call_rejected_by_default() {
        let transport = StubTransport::returning(200, "{}");
        let exec = executor(Arc::clone(&transport), false);

        let args =
            ApiCallArgs::parse(r#"{"method":"DELETE","url":"/tickets/7","headers":{}}"#)
                .unwrap_or_else(|e| unreachable!("parse failed: {e}"));
        let result = exec.execute(&args).await;
        assert!(matches!(result, Err(AgentError::ToolArgument { .. })));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_mutating_call_allowed_when_configured() {
        let transport = StubTransport::returning(201, r#"{"id":7}"#);
        let exec = executor(Arc::clone(&transport), true);

        let args = ApiCallArgs::parse(
            r#"{"method":"POST","url":"/tickets","headers":{},"data":{"title":"vpn down"}}"#,
        )
        .unwrap_or_else(|e| unreachable!("parse failed: {e}"));
        let body = exec
            .execute(&args)
            .await
            .unwrap_or_else(|e| unreachable!("execute failed: {e}"));
        assert_eq!(body, r#"{"id":7}"#);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_call_error() {
        let transport = StubTransport::returning(404, r#"{"error":"not found"}"#);
        let exec = executor(transport, false);

        let result = exec.execute(&get_args("/tickets/999")).await;
        match result {
            Err(AgentError::ApiCall { status, body }) => {
                assert_eq!(status, Some(404));
                assert!(body.contains("not found"));
            }
            other => unreachable!("expected ApiCall error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_max_results_clamps_array_body() {
        let transport = StubTransport::returning(200, r#"[{"id":1},{"id":2},{"id":3}]"#);
        let exec = executor(transport, false);

        let args = ApiCallArgs::parse(
            r#"{"method":"GET","url":"/tickets","headers":{},"max_results":2}"#,
        )
        .unwrap_or_else(|e| unreachable!("parse failed: {e}"));
        let body = exec
            .execute(&args)
            .await
            .unwrap_or_else(|e| unreachable!("execute failed: {e}"));
        assert_eq!(body, r#"[{"id":1},{"id":2}]"#);
    }

    #[test]
    fn test_clamp_passes_non_array_through() {
        let body = r#"{"tickets":[1,2,3]}"#.to_string();
        assert_eq!(clamp_array_results(body.clone(), Some(1)), body);
    }
}
