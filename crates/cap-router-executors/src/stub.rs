// crates/cap-router-executors/src/stub.rs
// ============================================================================
// Module: Stub Tool Executor
// Description: Deterministic scripted executor for tests and examples.
// Purpose: Provide a predictable executor implementation without I/O.
// Dependencies: cap-router-core, tokio
// ============================================================================

//! ## Overview
//! This module provides a deterministic implementation of [`ToolExecutor`]
//! for tests and local demos. Outcomes are scripted per tool identifier; an
//! optional artificial delay honors the overall abort token the way a real
//! transport would. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use async_trait::async_trait;
use cap_router_core::ExecutionResult;
use cap_router_core::ExecutorError;
use cap_router_core::OVERALL_TIMEOUT;
use cap_router_core::Tool;
use cap_router_core::ToolExecutor;
use cap_router_core::ToolId;
use serde_json::Map;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Stub Executor
// ============================================================================

/// Deterministic scripted executor.
///
/// # Invariants
/// - Tools without a scripted outcome succeed with no output.
/// - The attempt log preserves invocation order.
#[derive(Debug, Default)]
pub struct StubExecutor {
    /// Scripted outcomes keyed by tool identifier.
    outcomes: Mutex<HashMap<ToolId, ExecutionResult>>,
    /// Artificial delay before resolving, honoring the overall abort.
    delay: Option<Duration>,
    /// Tool identifiers in invocation order.
    calls: Mutex<Vec<ToolId>>,
}

impl StubExecutor {
    /// Creates a stub where every tool succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome returned for a tool.
    #[must_use]
    pub fn with_outcome(self, tool_id: impl Into<ToolId>, outcome: ExecutionResult) -> Self {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tool_id.into(), outcome);
        self
    }

    /// Adds an artificial delay before each outcome resolves.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the tool identifiers invoked so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ToolId> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ToolExecutor for StubExecutor {
    async fn execute(
        &self,
        tool: &Tool,
        _input: &Map<String, Value>,
        overall: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(tool.id.clone());

        if let Some(delay) = self.delay {
            tokio::select! {
                () = overall.cancelled() => {
                    return Ok(ExecutionResult::Timeout {
                        error: OVERALL_TIMEOUT.to_string(),
                        latency_ms: None,
                    });
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tool.id)
            .cloned()
            .unwrap_or(ExecutionResult::Success {
                latency_ms: 1,
                output: None,
            });
        Ok(outcome)
    }
}
