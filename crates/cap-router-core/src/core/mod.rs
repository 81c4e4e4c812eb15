// crates/cap-router-core/src/core/mod.rs
// ============================================================================
// Module: Core Model
// Description: Identifiers, tool records, snapshots, and plan surfaces.
// Purpose: Group the data-model half of the decision pipeline.
// Dependencies: crate::core::{identifiers, plan, registry, tool}
// ============================================================================

//! ## Overview
//! The data-model half of the router: strongly typed identifiers, the tool
//! catalog record, the immutable registry snapshot, and the plan
//! request/result surface.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod plan;
pub mod registry;
pub mod tool;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::CapabilityName;
pub use identifiers::TenantId;
pub use identifiers::ToolId;
pub use identifiers::TraceId;
pub use plan::ALL_CANDIDATES_FAILED;
pub use plan::CandidateEntry;
pub use plan::EXECUTOR_ERROR;
pub use plan::ExecutionResult;
pub use plan::INPUT_INVALID;
pub use plan::NO_CANDIDATES;
pub use plan::OVERALL_TIMEOUT;
pub use plan::PlanContext;
pub use plan::PlanResult;
pub use plan::ScoredCandidate;
pub use plan::Selection;
pub use registry::RegistrySnapshot;
pub use registry::RegistryView;
pub use tool::CapabilityDecl;
pub use tool::DEFAULT_TOOL_TIMEOUT_MS;
pub use tool::Endpoint;
pub use tool::Preconditions;
pub use tool::SlaSpec;
pub use tool::Tool;
pub use tool::ToolError;
