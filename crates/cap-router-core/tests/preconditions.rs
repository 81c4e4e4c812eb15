// crates/cap-router-core/tests/preconditions.rs
// ============================================================================
// Module: Precondition Gate Tests
// Description: Environment and offline-indicator candidate gating.
// Purpose: Validate that preconditions filter candidates per decision.
// Dependencies: cap-router-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Validates the precondition gate: required environment variables must be
//! present, and the offline indicator nullifies network-requiring
//! candidates. The offline test mutates the process environment, so it is
//! the only test in this binary that does.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
#![allow(unsafe_code, reason = "Environment mutation requires unsafe in edition 2024.")]

use std::collections::BTreeSet;
use std::sync::Arc;

use cap_router_core::CapabilityDecl;
use cap_router_core::CapabilityName;
use cap_router_core::ExecutionResult;
use cap_router_core::MetricsRegistry;
use cap_router_core::OFFLINE_ENV;
use cap_router_core::PlanContext;
use cap_router_core::Planner;
use cap_router_core::Preconditions;
use cap_router_core::RegistryService;
use cap_router_core::RegistrySnapshot;
use cap_router_core::RegistryView;
use cap_router_core::Tool;
use cap_router_core::ToolId;
use cap_router_core::TraceStore;
use cap_router_core::WeightedScorer;
use chrono::Utc;

mod support {
    //! Minimal always-succeeding executor.

    use async_trait::async_trait;
    use cap_router_core::ExecutionResult;
    use cap_router_core::ExecutorError;
    use cap_router_core::Tool;
    use cap_router_core::ToolExecutor;
    use serde_json::Map;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    pub struct SucceedingExecutor;

    #[async_trait]
    impl ToolExecutor for SucceedingExecutor {
        async fn execute(
            &self,
            _tool: &Tool,
            _input: &Map<String, Value>,
            _overall: &CancellationToken,
        ) -> Result<ExecutionResult, ExecutorError> {
            Ok(ExecutionResult::Success {
                latency_ms: 1,
                output: None,
            })
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn gated_tool(id: &str, preconditions: Preconditions) -> Tool {
    Tool {
        id: ToolId::new(id),
        name: id.to_string(),
        version: "1.0.0".to_string(),
        description: None,
        capabilities: vec![CapabilityDecl {
            name: CapabilityName::new("patient.search"),
            inputs: Default::default(),
            outputs: Default::default(),
        }],
        cost_estimate: None,
        sla: None,
        preconditions: Some(preconditions),
        endpoint: None,
    }
}

struct StaticRegistry {
    snapshot: RegistrySnapshot,
}

impl RegistryService for StaticRegistry {
    fn list(&self) -> Vec<Arc<Tool>> {
        self.snapshot.tools.clone()
    }

    fn registry(&self) -> RegistryView {
        RegistryView::from(&self.snapshot)
    }
}

fn planner(tools: Vec<Tool>) -> Planner<StaticRegistry, WeightedScorer, support::SucceedingExecutor> {
    Planner::new(
        StaticRegistry {
            snapshot: RegistrySnapshot::new(tools, Utc::now()),
        },
        WeightedScorer::new(),
        support::SucceedingExecutor,
        None,
        Arc::new(TraceStore::with_defaults()),
        Arc::new(MetricsRegistry::new()),
    )
}

fn env_set(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|key| (*key).to_string()).collect()
}

// ============================================================================
// SECTION: Environment Presence
// ============================================================================

#[tokio::test]
async fn missing_required_env_filters_the_candidate() {
    let planner = planner(vec![gated_tool(
        "gated",
        Preconditions {
            requires_network: false,
            requires_vpn: false,
            env: env_set(&["CAP_ROUTER_TEST_UNSET_VARIABLE"]),
        },
    )]);

    let result = planner.plan(PlanContext::new("patient.search")).await;
    match result.execution.as_ref().unwrap() {
        ExecutionResult::Failure {
            error, ..
        } => assert_eq!(error, "NO_CANDIDATES"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn present_required_env_admits_the_candidate() {
    // PATH is present in any test environment.
    let planner = planner(vec![gated_tool(
        "gated",
        Preconditions {
            requires_network: false,
            requires_vpn: false,
            env: env_set(&["PATH"]),
        },
    )]);

    let result = planner.plan(PlanContext::new("patient.search")).await;
    assert!(matches!(result.execution, Some(ExecutionResult::Success { .. })));
}

// ============================================================================
// SECTION: Offline Indicator
// ============================================================================

#[tokio::test]
async fn offline_indicator_nullifies_network_candidates() {
    let tools = vec![
        gated_tool(
            "networked",
            Preconditions {
                requires_network: true,
                requires_vpn: false,
                env: BTreeSet::new(),
            },
        ),
        gated_tool("local", Preconditions::default()),
    ];

    // Without the indicator both candidates survive and the network tool is
    // attempted; with it only the local tool remains.
    let planner_online = planner(tools.clone());
    let online = planner_online.plan(PlanContext::new("patient.search")).await;
    assert_eq!(online.candidates.len(), 2);

    unsafe { std::env::set_var(OFFLINE_ENV, "1") };
    let planner_offline = planner(tools);
    let offline = planner_offline.plan(PlanContext::new("patient.search")).await;
    unsafe { std::env::remove_var(OFFLINE_ENV) };

    assert_eq!(offline.candidates.len(), 1);
    assert_eq!(offline.candidates[0].tool_id.as_str(), "local");
    assert_eq!(offline.selected.as_ref().unwrap().tool_id.as_str(), "local");
}
