// crates/cap-router-core/src/core/tool.rs
// ============================================================================
// Module: Tool Catalog Model
// Description: Declarative tool documents with capabilities, SLA, and endpoint.
// Purpose: Define canonical tool records with validation helpers.
// Dependencies: crate::core::identifiers, serde, thiserror
// ============================================================================

//! ## Overview
//! Tools are declarative catalog entries: a stable identity, the capabilities
//! the tool implements, optional cost and SLA hints consumed by the scorer,
//! optional preconditions gated before execution, and an optional endpoint
//! describing how executors reach the tool. Documents are validated at load
//! time to enforce invariants such as non-empty identity and positive
//! endpoint timeouts.
//!
//! Tool documents are untrusted inputs; validation fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::CapabilityName;
use crate::core::identifiers::ToolId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Per-tool execution timeout applied when the endpoint omits one.
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 3_000;

// ============================================================================
// SECTION: Tool Record
// ============================================================================

/// Canonical tool catalog record.
///
/// # Invariants
/// - `id` is non-empty and unique within a registry snapshot.
/// - `capabilities` contains at least one declaration.
/// - `cost_estimate` is non-negative when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tool {
    /// Tool identifier.
    pub id: ToolId,
    /// Human-readable tool name.
    pub name: String,
    /// Tool version string.
    pub version: String,
    /// Optional description for catalog listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Capabilities the tool implements.
    pub capabilities: Vec<CapabilityDecl>,
    /// Optional relative cost estimate consumed by the scorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
    /// Optional service-level declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla: Option<SlaSpec>,
    /// Optional execution preconditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconditions: Option<Preconditions>,
    /// Optional endpoint describing the outbound transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
}

impl Tool {
    /// Returns true when the tool declares the given capability.
    #[must_use]
    pub fn declares(&self, capability: &CapabilityName) -> bool {
        self.capabilities.iter().any(|decl| &decl.name == capability)
    }

    /// Validates the tool record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when validation fails.
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.id.as_str().is_empty() {
            return Err(ToolError::EmptyId);
        }
        if self.capabilities.is_empty() {
            return Err(ToolError::MissingCapabilities(self.id.clone()));
        }
        for decl in &self.capabilities {
            if decl.name.is_empty() {
                return Err(ToolError::EmptyCapabilityName(self.id.clone()));
            }
        }
        if let Some(cost) = self.cost_estimate
            && !(cost.is_finite() && cost >= 0.0)
        {
            return Err(ToolError::InvalidCost(self.id.clone()));
        }
        if let Some(sla) = &self.sla {
            sla.validate(&self.id)?;
        }
        if let Some(endpoint) = &self.endpoint {
            endpoint.validate(&self.id)?;
        }
        Ok(())
    }
}

/// Capability declaration within a tool record.
///
/// # Invariants
/// - `inputs` and `outputs` are documentation only; they are not enforced at
///   execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityDecl {
    /// Capability name.
    pub name: CapabilityName,
    /// Documented input field types (name to type label).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
    /// Documented output field types (name to type label).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: SLA and Preconditions
// ============================================================================

/// Declared service-level targets consumed by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlaSpec {
    /// Declared p95 latency in milliseconds.
    pub p95_ms: u64,
    /// Minimum acceptable success rate in `[0, 1]`.
    pub success_rate_min: f64,
}

impl SlaSpec {
    /// Validates SLA bounds.
    fn validate(&self, tool_id: &ToolId) -> Result<(), ToolError> {
        if self.p95_ms == 0 {
            return Err(ToolError::InvalidSla(tool_id.clone()));
        }
        if !(self.success_rate_min.is_finite()
            && (0.0..=1.0).contains(&self.success_rate_min))
        {
            return Err(ToolError::InvalidSla(tool_id.clone()));
        }
        Ok(())
    }
}

/// Execution preconditions gated before a tool becomes a candidate.
///
/// # Invariants
/// - `env` names are checked for presence only; values are never read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Preconditions {
    /// Tool requires outbound network access.
    #[serde(default)]
    pub requires_network: bool,
    /// Tool requires an active VPN session.
    #[serde(default)]
    pub requires_vpn: bool,
    /// Environment variable names that must be present.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub env: BTreeSet<String>,
}

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// Outbound endpoint declaration.
///
/// # Invariants
/// - The `type` tag selects the required sub-fields.
/// - `timeout_ms`, when declared, is at least one millisecond; executors
///   apply [`DEFAULT_TOOL_TIMEOUT_MS`] otherwise.
/// - Unknown endpoint fields are rejected at the schema layer; serde cannot
///   enforce `deny_unknown_fields` on internally tagged enums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Endpoint {
    /// HTTP endpoint invoked with the request input as a JSON body.
    Http {
        /// Endpoint URL.
        url: String,
        /// Per-call timeout in milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// RPA script endpoint driven by an external automation runner.
    Rpa {
        /// Script identifier or path understood by the runner.
        script: String,
        /// Per-call timeout in milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

impl Endpoint {
    /// Returns the declared per-call timeout in milliseconds, if any.
    #[must_use]
    pub const fn timeout_ms(&self) -> Option<u64> {
        match self {
            Self::Http {
                timeout_ms, ..
            }
            | Self::Rpa {
                timeout_ms, ..
            } => *timeout_ms,
        }
    }

    /// Validates endpoint invariants.
    fn validate(&self, tool_id: &ToolId) -> Result<(), ToolError> {
        if self.timeout_ms() == Some(0) {
            return Err(ToolError::InvalidEndpointTimeout(tool_id.clone()));
        }
        match self {
            Self::Http {
                url, ..
            } => {
                if url.is_empty() {
                    return Err(ToolError::InvalidEndpoint(tool_id.clone()));
                }
            }
            Self::Rpa {
                script, ..
            } => {
                if script.is_empty() {
                    return Err(ToolError::InvalidEndpoint(tool_id.clone()));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool identifier is empty.
    #[error("tool id must be non-empty")]
    EmptyId,
    /// Tool declares no capabilities.
    #[error("tool {0} must declare at least one capability")]
    MissingCapabilities(ToolId),
    /// A capability declaration has an empty name.
    #[error("tool {0} declares a capability with an empty name")]
    EmptyCapabilityName(ToolId),
    /// Cost estimate is negative or non-finite.
    #[error("tool {0} cost_estimate must be finite and non-negative")]
    InvalidCost(ToolId),
    /// SLA bounds are out of range.
    #[error("tool {0} sla is invalid: p95_ms must be positive and success_rate_min in [0, 1]")]
    InvalidSla(ToolId),
    /// Endpoint sub-fields are invalid.
    #[error("tool {0} endpoint is invalid")]
    InvalidEndpoint(ToolId),
    /// Endpoint timeout is below one millisecond.
    #[error("tool {0} endpoint timeout_ms must be at least 1")]
    InvalidEndpointTimeout(ToolId),
}
