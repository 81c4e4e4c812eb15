// crates/cap-router-core/src/runtime/planner.rs
// ============================================================================
// Module: Planner
// Description: Filter, score, and execute-with-fallback under two deadlines.
// Purpose: Drive the decision pipeline from request to terminal outcome.
// Dependencies: crate::{core, interfaces, metrics, policy, runtime}
// ============================================================================

//! ## Overview
//! The planner is the single canonical decision path: it creates the trace,
//! applies policy pre-checks, reads one registry snapshot, gates candidates
//! by capability and preconditions, ranks them by scalar bid, and executes
//! best-first with typed-outcome fallback. Outcome semantics are strict:
//! success is terminal, a tool-reported timeout is terminal, the overall
//! deadline is terminal, a failure or post-check failure advances to the
//! next candidate.
//!
//! Domain errors never surface as `Err`; every decision produces a
//! [`PlanResult`] and a trace whose first event is `request`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use crate::core::identifiers::ToolId;
use crate::core::plan::ALL_CANDIDATES_FAILED;
use crate::core::plan::CandidateEntry;
use crate::core::plan::EXECUTOR_ERROR;
use crate::core::plan::ExecutionResult;
use crate::core::plan::INPUT_INVALID;
use crate::core::plan::NO_CANDIDATES;
use crate::core::plan::OVERALL_TIMEOUT;
use crate::core::plan::PlanContext;
use crate::core::plan::PlanResult;
use crate::core::plan::ScoredCandidate;
use crate::core::plan::Selection;
use crate::core::tool::Tool;
use crate::interfaces::RegistryService;
use crate::interfaces::ScoreRequest;
use crate::interfaces::Scorer;
use crate::interfaces::ToolExecutor;
use crate::metrics::MetricsRegistry;
use crate::policy::PolicyService;
use crate::policy::PostDecision;
use crate::policy::PreDecision;
use crate::runtime::deadline::DeadlineGuard;
use crate::runtime::trace::TraceEventKind;
use crate::runtime::trace::TraceStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable whose presence marks the process offline, nulling
/// candidates that require network access.
pub const OFFLINE_ENV: &str = "OFFLINE";

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Decision planner over injected collaborator implementations.
pub struct Planner<R, S, E> {
    /// Registry read interface.
    registry: R,
    /// Candidate scorer.
    scorer: S,
    /// Outbound tool executor.
    executor: E,
    /// Optional policy service; post-checks run only when present.
    policy: Option<PolicyService>,
    /// Trace store shared with the inspection surface.
    traces: Arc<TraceStore>,
    /// Process metrics registry.
    metrics: Arc<MetricsRegistry>,
}

impl<R, S, E> Planner<R, S, E>
where
    R: RegistryService,
    S: Scorer,
    E: ToolExecutor,
{
    /// Creates a new planner.
    pub const fn new(
        registry: R,
        scorer: S,
        executor: E,
        policy: Option<PolicyService>,
        traces: Arc<TraceStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            registry,
            scorer,
            executor,
            policy,
            traces,
            metrics,
        }
    }

    /// Runs one decision from request to terminal outcome.
    pub async fn plan(&self, ctx: PlanContext) -> PlanResult {
        let mut decision = Decision::begin(self, &ctx);

        if ctx.capability.is_empty() {
            return decision.terminal_failure(INPUT_INVALID, None);
        }

        if let Some(policy) = &self.policy {
            let verdict =
                policy.pre_check(ctx.tenant.as_ref(), &ctx.capability, &ctx.input, None);
            if let PreDecision::Deny {
                code,
                detail,
            } = verdict
            {
                return decision.terminal_failure(code.as_str(), detail);
            }
        }

        // One snapshot per decision; reloads are not observed mid-plan.
        let tools = self.registry.list();
        let offline = std::env::var_os(OFFLINE_ENV).is_some();
        let candidates: Vec<Arc<Tool>> = tools
            .into_iter()
            .filter(|tool| tool.declares(&ctx.capability))
            .filter(|tool| preconditions_met(tool, offline))
            .collect();

        if candidates.is_empty() {
            decision.record(TraceEventKind::NoCandidates, json!({}));
            decision.result.execution = Some(ExecutionResult::Failure {
                error: NO_CANDIDATES.to_string(),
                latency_ms: None,
            });
            return decision.result;
        }

        let ranked = self.rank(&ctx, candidates);
        decision.record_scores(&ranked);

        if !ctx.execute {
            decision.result.selected = ranked.first().map(|candidate| Selection {
                tool_id: candidate.tool.id.clone(),
            });
            return decision.result;
        }

        self.execute_ranked(&ctx, ranked, decision).await
    }

    /// Scores and sorts candidates: descending bid, stable on ties,
    /// non-finite bids last.
    fn rank(&self, ctx: &PlanContext, candidates: Vec<Arc<Tool>>) -> Vec<ScoredCandidate> {
        let request = ScoreRequest {
            capability: &ctx.capability,
            input: &ctx.input,
        };
        let mut ranked: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|tool| {
                let raw = self.scorer.score(&tool, &request);
                let score = if raw.is_finite() { raw } else { f64::NEG_INFINITY };
                self.metrics.incr_bid(ctx.capability.as_str(), tool.id.as_str());
                ScoredCandidate {
                    tool,
                    score,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Best-first execution loop with typed-outcome fallback.
    async fn execute_ranked(
        &self,
        ctx: &PlanContext,
        ranked: Vec<ScoredCandidate>,
        mut decision: Decision<'_>,
    ) -> PlanResult {
        let deadline = DeadlineGuard::start(ctx.overall_timeout_ms());
        let total = ranked.len();

        for (rank, candidate) in ranked.iter().enumerate() {
            let tool = &candidate.tool;
            decision.record(
                TraceEventKind::Attempt,
                json!({ "toolId": tool.id.as_str(), "rank": rank }),
            );

            let attempt =
                self.executor.execute(tool, &ctx.input, deadline.token()).await;
            let outcome = match attempt {
                Ok(outcome) => outcome,
                Err(_fault) => normalize_fault(deadline.expired()),
            };

            match outcome {
                // A success racing the overall deadline still wins.
                ExecutionResult::Success {
                    latency_ms,
                    output,
                } => match self.post_check(ctx, &output) {
                    PostDecision::Pass => {
                        return decision.terminal_success(tool, latency_ms, output);
                    }
                    PostDecision::Fail {
                        code,
                        detail,
                    } => {
                        self.metrics.incr_fallback(ctx.capability.as_str());
                        decision.record(
                            TraceEventKind::PostFallback,
                            json!({
                                "toolId": tool.id.as_str(),
                                "error": code.as_str(),
                                "detail": detail,
                            }),
                        );
                        if deadline.expired() {
                            return decision.terminal_timeout(Some(tool.id.clone()));
                        }
                    }
                },
                ExecutionResult::Timeout {
                    error,
                    latency_ms,
                } => {
                    decision.record(
                        TraceEventKind::Timeout,
                        json!({ "toolId": tool.id.as_str(), "error": error }),
                    );
                    decision.result.execution = Some(ExecutionResult::Timeout {
                        error,
                        latency_ms,
                    });
                    return decision.result;
                }
                ExecutionResult::Failure {
                    error,
                    latency_ms: _,
                } => {
                    if deadline.expired() {
                        return decision.terminal_timeout(Some(tool.id.clone()));
                    }
                    if rank + 1 < total {
                        self.metrics.incr_fallback(ctx.capability.as_str());
                        decision.record(
                            TraceEventKind::Fallback,
                            json!({ "toolId": tool.id.as_str(), "error": error }),
                        );
                    }
                }
            }
        }

        decision.terminal_failure(ALL_CANDIDATES_FAILED, None)
    }

    /// Runs the post-check when a policy service is configured.
    fn post_check(
        &self,
        ctx: &PlanContext,
        output: &Option<serde_json::Map<String, Value>>,
    ) -> PostDecision {
        let Some(policy) = &self.policy else {
            return PostDecision::Pass;
        };
        let empty = serde_json::Map::new();
        let output = output.as_ref().unwrap_or(&empty);
        policy.post_check(ctx.tenant.as_ref(), &ctx.capability, output)
    }
}

// ============================================================================
// SECTION: Decision State
// ============================================================================

/// Per-call decision state carrying the trace handle and result under
/// construction.
struct Decision<'a> {
    /// Trace store handle.
    traces: &'a TraceStore,
    /// Metrics registry handle.
    metrics: &'a MetricsRegistry,
    /// Result under construction.
    result: PlanResult,
}

impl<'a> Decision<'a> {
    /// Creates the trace and records the request event.
    fn begin<R, S, E>(planner: &'a Planner<R, S, E>, ctx: &PlanContext) -> Self {
        let trace_id = planner.traces.create();
        planner.metrics.incr_trace_created();

        let mut decision = Self {
            traces: planner.traces.as_ref(),
            metrics: planner.metrics.as_ref(),
            result: PlanResult {
                trace_id,
                capability: ctx.capability.clone(),
                candidates: Vec::new(),
                selected: None,
                execution: None,
            },
        };
        decision.record(
            TraceEventKind::Request,
            json!({
                "tenant": ctx.tenant.as_ref().map(|tenant| tenant.as_str().to_string()),
                "capability": ctx.capability.as_str(),
                "input": ctx.input.clone(),
                "timeoutMs": ctx.overall_timeout_ms(),
                "execute": ctx.execute,
            }),
        );
        decision
    }

    /// Appends a trace event and counts it.
    fn record(&mut self, kind: TraceEventKind, data: Value) {
        self.traces.record(&self.result.trace_id, kind, data);
        self.metrics.incr_trace_events();
    }

    /// Records the scored candidate list into the trace and the result.
    fn record_scores(&mut self, ranked: &[ScoredCandidate]) {
        self.result.candidates = ranked.iter().map(CandidateEntry::from).collect();
        let scores: Vec<Value> = self
            .result
            .candidates
            .iter()
            .map(|entry| json!({ "toolId": entry.tool_id.as_str(), "score": entry.score }))
            .collect();
        self.record(TraceEventKind::Scores, json!({ "scores": scores }));
    }

    /// Finishes the decision with a terminal success.
    fn terminal_success(
        mut self,
        tool: &Tool,
        latency_ms: u64,
        output: Option<serde_json::Map<String, Value>>,
    ) -> PlanResult {
        self.metrics.incr_selection(self.result.capability.as_str(), tool.id.as_str());
        self.metrics.observe_execution_latency(tool.id.as_str(), latency_ms);
        self.record(TraceEventKind::Selected, json!({ "toolId": tool.id.as_str() }));
        self.record(
            TraceEventKind::Success,
            json!({ "toolId": tool.id.as_str(), "latencyMs": latency_ms }),
        );
        self.result.selected = Some(Selection {
            tool_id: tool.id.clone(),
        });
        self.result.execution = Some(ExecutionResult::Success {
            latency_ms,
            output,
        });
        self.result
    }

    /// Finishes the decision with a terminal failure code.
    fn terminal_failure(mut self, error: &str, detail: Option<String>) -> PlanResult {
        self.record(
            TraceEventKind::Failure,
            json!({ "error": error, "detail": detail }),
        );
        self.result.execution = Some(ExecutionResult::Failure {
            error: error.to_string(),
            latency_ms: None,
        });
        self.result
    }

    /// Finishes the decision with an overall-deadline timeout.
    fn terminal_timeout(mut self, tool_id: Option<ToolId>) -> PlanResult {
        self.record(
            TraceEventKind::Timeout,
            json!({
                "toolId": tool_id.as_ref().map(|id| id.as_str().to_string()),
                "error": OVERALL_TIMEOUT,
            }),
        );
        self.result.execution = Some(ExecutionResult::Timeout {
            error: OVERALL_TIMEOUT.to_string(),
            latency_ms: None,
        });
        self.result
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when a tool's preconditions hold for this decision.
fn preconditions_met(tool: &Tool, offline: bool) -> bool {
    let Some(preconditions) = &tool.preconditions else {
        return true;
    };
    if preconditions.requires_network && offline {
        return false;
    }
    preconditions.env.iter().all(|key| std::env::var_os(key).is_some())
}

/// Normalizes an executor fault into the outcome taxonomy.
fn normalize_fault(overall_expired: bool) -> ExecutionResult {
    if overall_expired {
        ExecutionResult::Timeout {
            error: OVERALL_TIMEOUT.to_string(),
            latency_ms: None,
        }
    } else {
        ExecutionResult::Failure {
            error: EXECUTOR_ERROR.to_string(),
            latency_ms: None,
        }
    }
}
