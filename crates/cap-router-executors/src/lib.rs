// crates/cap-router-executors/src/lib.rs
// ============================================================================
// Module: Capability Router Executors
// Description: Built-in tool executors aligned with the router core.
// Purpose: Drive declared endpoints under the two-deadline contract.
// Dependencies: cap-router-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! This crate ships the built-in tool executors: an HTTP executor driving
//! `http` endpoints and a deterministic stub for tests and demos. Executors
//! honor the overall abort token, apply the per-tool endpoint timeout, and
//! express every protocol outcome as an `ExecutionResult` value.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;
pub mod stub;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::HttpExecutor;
pub use http::HttpExecutorConfig;
pub use stub::StubExecutor;
