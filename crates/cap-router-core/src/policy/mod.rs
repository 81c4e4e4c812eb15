// crates/cap-router-core/src/policy/mod.rs
// ============================================================================
// Module: Policy
// Description: Tenant-scoped policy document and evaluation service.
// Purpose: Group policy model, window matching, and the decision service.
// Dependencies: crate::policy::{document, service, windows}
// ============================================================================

//! ## Overview
//! Policy groups the tenant-scoped rule document, the time-window matcher,
//! and the service evaluating pre- and post-decision checks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod document;
pub mod service;
mod windows;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use document::PolicyDocument;
pub use document::PolicyDocumentError;
pub use document::TenantPolicy;
pub use document::TimeWindows;
pub use service::PolicyCode;
pub use service::PolicyService;
pub use service::PostDecision;
pub use service::PreDecision;
