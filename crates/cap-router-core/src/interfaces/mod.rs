// crates/cap-router-core/src/interfaces/mod.rs
// ============================================================================
// Module: Router Interfaces
// Description: Backend-agnostic interfaces for registry, scoring, execution.
// Purpose: Define the contract surfaces consumed by the planner.
// Dependencies: crate::core, async-trait, tokio-util
// ============================================================================

//! ## Overview
//! Interfaces define how the planner integrates with external systems without
//! embedding backend-specific details. Implementations are constructor
//! injected; the planner never reaches for process-wide collaborators beyond
//! the metrics registry and the process environment.
//!
//! Executors must express protocol outcomes as [`ExecutionResult`] values;
//! `Err` is reserved for infrastructure faults and is normalized by the
//! planner.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::identifiers::CapabilityName;
use crate::core::plan::ExecutionResult;
use crate::core::registry::RegistryView;
use crate::core::tool::Tool;

// ============================================================================
// SECTION: Registry Service
// ============================================================================

/// Read interface over the current registry snapshot.
///
/// # Invariants
/// - `list` reflects one atomic snapshot; callers hold the returned tools for
///   the duration of a decision.
/// - Returned values must not be mutated.
pub trait RegistryService: Send + Sync {
    /// Returns the tools of the current snapshot in document order.
    fn list(&self) -> Vec<Arc<Tool>>;

    /// Returns the serializable registry view (tools plus `updatedAt`).
    fn registry(&self) -> RegistryView;
}

// ============================================================================
// SECTION: Scorer
// ============================================================================

/// Scoring request passed to the scorer for each candidate.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    /// Requested capability.
    pub capability: &'a CapabilityName,
    /// Structured request input.
    pub input: &'a Map<String, Value>,
}

/// Maps a `(tool, request)` pair to a scalar bid.
pub trait Scorer: Send + Sync {
    /// Returns the bid for executing `tool` against the request. Non-finite
    /// results are treated as negative infinity by the planner.
    fn score(&self, tool: &Tool, request: &ScoreRequest<'_>) -> f64;
}

// ============================================================================
// SECTION: Tool Executor
// ============================================================================

/// Executor infrastructure faults.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Protocol-level outcomes (HTTP errors, timeouts) are not faults; they are
///   returned as [`ExecutionResult`] values.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Executor infrastructure fault outside the outcome contract.
    #[error("executor fault: {0}")]
    Fault(String),
}

/// Performs one outbound tool call.
///
/// Implementations must honor `overall` (the request-level abort), apply
/// their own per-tool timeout from the endpoint declaration, and return
/// every protocol outcome as an [`ExecutionResult`].
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Executes the tool against the request input.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] only for infrastructure faults; the planner
    /// normalizes such faults into timeout or failure outcomes.
    async fn execute(
        &self,
        tool: &Tool,
        input: &Map<String, Value>,
        overall: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutorError>;
}

// ============================================================================
// SECTION: Shared Wrappers
// ============================================================================

impl<T: RegistryService + ?Sized> RegistryService for Arc<T> {
    fn list(&self) -> Vec<Arc<Tool>> {
        self.as_ref().list()
    }

    fn registry(&self) -> RegistryView {
        self.as_ref().registry()
    }
}

impl<T: Scorer + ?Sized> Scorer for Arc<T> {
    fn score(&self, tool: &Tool, request: &ScoreRequest<'_>) -> f64 {
        self.as_ref().score(tool, request)
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(
        &self,
        tool: &Tool,
        input: &Map<String, Value>,
        overall: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.as_ref().execute(tool, input, overall).await
    }
}
