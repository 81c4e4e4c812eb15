// crates/cap-router-executors/src/http.rs
// ============================================================================
// Module: HTTP Tool Executor
// Description: Outbound tool calls over HTTP with two abort sources.
// Purpose: Drive http endpoints under per-tool and overall deadlines.
// Dependencies: cap-router-core, reqwest, tokio, tokio-util
// ============================================================================

//! ## Overview
//! The HTTP executor POSTs the request input as a JSON body to the tool's
//! declared endpoint. Two abort sources cover every call: the endpoint's own
//! `timeout_ms` (default 3000 when the declaration omits one) and the
//! planner's overall deadline token; whichever fires first cancels the
//! outstanding request. Protocol outcomes are returned as values
//! (`HTTP_<status>`, `timeout`, `overall-timeout`); the executor never
//! returns `Err` for them. Redirects are not followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use cap_router_core::DEFAULT_TOOL_TIMEOUT_MS;
use cap_router_core::Endpoint;
use cap_router_core::ExecutionResult;
use cap_router_core::ExecutorError;
use cap_router_core::OVERALL_TIMEOUT;
use cap_router_core::Tool;
use cap_router_core::ToolExecutor;
use reqwest::Client;
use reqwest::redirect::Policy;
use serde_json::Map;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Failure code for tools without an endpoint declaration.
pub const NO_ENDPOINT: &str = "NO_ENDPOINT";
/// Failure code for endpoint variants this executor cannot drive.
pub const ENDPOINT_UNSUPPORTED: &str = "ENDPOINT_UNSUPPORTED";
/// Failure code for connection-level transport errors.
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
/// Failure code for responses that are not JSON objects.
pub const BAD_RESPONSE: &str = "BAD_RESPONSE";
/// Timeout reason for the per-tool deadline.
pub const TOOL_TIMEOUT: &str = "timeout";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP executor.
///
/// # Invariants
/// - `default_timeout_ms` applies only when the endpoint omits `timeout_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpExecutorConfig {
    /// User agent string for outbound requests.
    pub user_agent: String,
    /// Per-tool timeout when the endpoint omits one.
    pub default_timeout_ms: u64,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            user_agent: "cap-router/0.1".to_string(),
            default_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Tool executor for `http` endpoints.
///
/// # Invariants
/// - Redirects are not followed.
/// - Protocol errors are expressed as [`ExecutionResult`] values.
pub struct HttpExecutor {
    /// Executor configuration.
    config: HttpExecutorConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpExecutor {
    /// Creates a new HTTP executor.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] when the HTTP client cannot be built.
    pub fn new(config: HttpExecutorConfig) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| ExecutorError::Fault(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            client,
        })
    }
}

#[async_trait]
impl ToolExecutor for HttpExecutor {
    async fn execute(
        &self,
        tool: &Tool,
        input: &Map<String, Value>,
        overall: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutorError> {
        let started = Instant::now();

        let (url, timeout_ms) = match &tool.endpoint {
            Some(Endpoint::Http {
                url,
                timeout_ms,
            }) => (url.clone(), *timeout_ms),
            Some(Endpoint::Rpa {
                ..
            }) => {
                return Ok(failure(ENDPOINT_UNSUPPORTED, started));
            }
            None => return Ok(failure(NO_ENDPOINT, started)),
        };
        let per_tool =
            Duration::from_millis(timeout_ms.unwrap_or(self.config.default_timeout_ms));

        let call = async {
            let response = self
                .client
                .post(&url)
                .json(&Value::Object(input.clone()))
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok::<(reqwest::StatusCode, Vec<u8>), reqwest::Error>((status, body))
        };

        tokio::select! {
            () = overall.cancelled() => Ok(timeout(OVERALL_TIMEOUT, started)),
            outcome = tokio::time::timeout(per_tool, call) => match outcome {
                Err(_elapsed) => Ok(timeout(TOOL_TIMEOUT, started)),
                Ok(Err(_transport)) => Ok(failure(TRANSPORT_ERROR, started)),
                Ok(Ok((status, body))) => {
                    if !status.is_success() {
                        return Ok(failure(&format!("HTTP_{}", status.as_u16()), started));
                    }
                    Ok(success_from_body(&body, started))
                }
            },
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns elapsed wall time in whole milliseconds.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Builds a failure outcome with the observed latency.
fn failure(error: &str, started: Instant) -> ExecutionResult {
    ExecutionResult::Failure {
        error: error.to_string(),
        latency_ms: Some(elapsed_ms(started)),
    }
}

/// Builds a timeout outcome with the observed latency.
fn timeout(error: &str, started: Instant) -> ExecutionResult {
    ExecutionResult::Timeout {
        error: error.to_string(),
        latency_ms: Some(elapsed_ms(started)),
    }
}

/// Builds the success outcome from a 2xx response body. Empty bodies carry no
/// output; non-object bodies fail closed.
fn success_from_body(body: &[u8], started: Instant) -> ExecutionResult {
    if body.is_empty() {
        return ExecutionResult::Success {
            latency_ms: elapsed_ms(started),
            output: None,
        };
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(output)) => ExecutionResult::Success {
            latency_ms: elapsed_ms(started),
            output: Some(output),
        },
        Ok(_) | Err(_) => failure(BAD_RESPONSE, started),
    }
}
