// crates/cap-router-core/src/core/plan.rs
// ============================================================================
// Module: Plan Request and Result Model
// Description: Request envelope, scored candidates, and execution outcomes.
// Purpose: Define the typed decision surface produced by the planner.
// Dependencies: crate::core::{identifiers, tool}, serde, serde_json
// ============================================================================

//! ## Overview
//! A plan call carries a request envelope ([`PlanContext`]) through the
//! decision pipeline and produces a [`PlanResult`]: ranked candidates, the
//! selected tool when execution succeeded, and a tagged
//! [`ExecutionResult`] outcome. Domain errors are values, never panics or
//! `Err` returns; consumers must match outcomes exhaustively.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::CapabilityName;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::ToolId;
use crate::core::identifiers::TraceId;
use crate::core::tool::Tool;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable error code surfaced when no tool declares the capability or none
/// survives the precondition gate.
pub const NO_CANDIDATES: &str = "NO_CANDIDATES";
/// Stable error code surfaced when every candidate failed recoverably.
pub const ALL_CANDIDATES_FAILED: &str = "ALL_CANDIDATES_FAILED";
/// Stable error code surfaced when the request is malformed at plan entry.
pub const INPUT_INVALID: &str = "INPUT_INVALID";
/// Stable error code surfaced when an executor faulted outside its contract.
pub const EXECUTOR_ERROR: &str = "EXECUTOR_ERROR";
/// Stable timeout reason surfaced when the overall deadline expires.
pub const OVERALL_TIMEOUT: &str = "overall-timeout";

// ============================================================================
// SECTION: Plan Context
// ============================================================================

/// Request envelope for one decision.
///
/// # Invariants
/// - `timeout_ms` of zero is treated as unset.
/// - `execute = false` selects plan-only mode: no executor is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanContext {
    /// Optional tenant scoping policy resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantId>,
    /// Requested capability.
    pub capability: CapabilityName,
    /// Structured request input forwarded to the executor.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Overall deadline in milliseconds covering all attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Whether to execute the selected candidate (default true).
    #[serde(default = "default_execute")]
    pub execute: bool,
}

const fn default_execute() -> bool {
    true
}

impl PlanContext {
    /// Creates a plan-and-execute context for a capability.
    #[must_use]
    pub fn new(capability: impl Into<CapabilityName>) -> Self {
        Self {
            tenant: None,
            capability: capability.into(),
            input: Map::new(),
            timeout_ms: None,
            execute: true,
        }
    }

    /// Returns the effective overall deadline, normalizing zero to unset.
    #[must_use]
    pub fn overall_timeout_ms(&self) -> Option<u64> {
        self.timeout_ms.filter(|ms| *ms > 0)
    }
}

// ============================================================================
// SECTION: Candidates and Selection
// ============================================================================

/// A tool that passed the capability and precondition gates, with its bid.
///
/// # Invariants
/// - `score` is finite or negative infinity; negative infinity sorts last.
/// - `tool` is the snapshot entry the score was computed from.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// Tool under consideration.
    pub tool: Arc<Tool>,
    /// Scalar bid for this request.
    pub score: f64,
}

impl ScoredCandidate {
    /// Returns the candidate's tool identifier.
    #[must_use]
    pub fn tool_id(&self) -> &ToolId {
        &self.tool.id
    }
}

/// Serializable candidate entry in a plan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    /// Tool identifier.
    #[serde(rename = "toolId")]
    pub tool_id: ToolId,
    /// Scalar bid for this request.
    pub score: f64,
}

impl From<&ScoredCandidate> for CandidateEntry {
    fn from(candidate: &ScoredCandidate) -> Self {
        Self {
            tool_id: candidate.tool.id.clone(),
            score: candidate.score,
        }
    }
}

/// Selected tool reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Identifier of the selected tool.
    #[serde(rename = "toolId")]
    pub tool_id: ToolId,
}

// ============================================================================
// SECTION: Execution Result
// ============================================================================

/// Terminal outcome of a plan's execution phase.
///
/// # Invariants
/// - Exactly one variant describes each decision; consumers must match
///   exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// A candidate executed and passed the post-check.
    Success {
        /// Attempt latency in milliseconds.
        latency_ms: u64,
        /// Structured tool output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Map<String, Value>>,
    },
    /// The decision failed terminally with a stable error code.
    Failure {
        /// Stable error code (e.g. `HTTP_500`, `ALL_CANDIDATES_FAILED`).
        error: String,
        /// Attempt latency in milliseconds when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latency_ms: Option<u64>,
    },
    /// A per-tool or overall deadline expired.
    Timeout {
        /// Timeout reason string.
        error: String,
        /// Attempt latency in milliseconds when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latency_ms: Option<u64>,
    },
}

impl ExecutionResult {
    /// Returns true for the success variant.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the attempt latency when the outcome recorded one.
    #[must_use]
    pub const fn latency_ms(&self) -> Option<u64> {
        match self {
            Self::Success {
                latency_ms, ..
            } => Some(*latency_ms),
            Self::Failure {
                latency_ms, ..
            }
            | Self::Timeout {
                latency_ms, ..
            } => *latency_ms,
        }
    }
}

// ============================================================================
// SECTION: Plan Result
// ============================================================================

/// Result of one plan call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    /// Trace identifier resolving to the decision's event log.
    #[serde(rename = "traceId")]
    pub trace_id: TraceId,
    /// Echoed capability from the request.
    pub capability: CapabilityName,
    /// Candidates in descending score order (stable on ties).
    pub candidates: Vec<CandidateEntry>,
    /// Selected tool, set on execution success or plan-only top rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<Selection>,
    /// Execution outcome when the decision reached or bypassed execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
}
