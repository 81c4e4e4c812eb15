// crates/cap-router-core/src/policy/document.rs
// ============================================================================
// Module: Policy Document Model
// Description: Tenant-scoped allow/deny, time-window, and schema policy.
// Purpose: Define the canonical policy document with validation helpers.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A policy document carries the per-tenant rules applied around every
//! decision: capability allow/deny lists, local-time allow windows, and JSON
//! schemas checked against request inputs and tool outputs. Resolution
//! precedence is `tenants[tenant]`, then `default`, then the empty policy.
//!
//! Policy documents are untrusted inputs and are validated fail-closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// The only accepted policy document schema version.
pub const POLICY_SCHEMA_VERSION: &str = "1.0";

// ============================================================================
// SECTION: Document
// ============================================================================

/// Canonical policy document.
///
/// # Invariants
/// - `schema_version` is the literal `"1.0"`.
/// - Tenant resolution is `tenants[tenant] ?? default ?? empty`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyDocument {
    /// Document schema version (literal `"1.0"`).
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Policy applied when a tenant has no dedicated entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<TenantPolicy>,
    /// Per-tenant policy entries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tenants: BTreeMap<String, TenantPolicy>,
}

fn default_schema_version() -> String {
    POLICY_SCHEMA_VERSION.to_string()
}

impl PolicyDocument {
    /// Validates the document invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyDocumentError`] when validation fails.
    pub fn validate(&self) -> Result<(), PolicyDocumentError> {
        if self.schema_version != POLICY_SCHEMA_VERSION {
            return Err(PolicyDocumentError::UnsupportedSchemaVersion(
                self.schema_version.clone(),
            ));
        }
        Ok(())
    }

    /// Resolves the effective policy for a tenant.
    ///
    /// Returns `None` when neither a tenant entry nor a default exists; the
    /// caller treats that as the empty (allow-everything) policy.
    #[must_use]
    pub fn resolve(&self, tenant: Option<&str>) -> Option<&TenantPolicy> {
        tenant
            .and_then(|tenant| self.tenants.get(tenant))
            .or(self.default.as_ref())
    }
}

/// Tenant-scoped policy rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TenantPolicy {
    /// Closed allow-list of capability names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_capabilities: Option<Vec<String>>,
    /// Deny-list of capability names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_capabilities: Option<Vec<String>>,
    /// Local-time allow windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_windows: Option<TimeWindows>,
    /// Request-input schemas keyed by capability name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_schemas: Option<BTreeMap<String, Value>>,
    /// Tool-output schemas keyed by capability name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_schemas: Option<BTreeMap<String, Value>>,
}

/// Time-window configuration for a tenant.
///
/// # Invariants
/// - An empty `allow` list places no time restriction.
/// - Malformed window specs never match (fail closed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindows {
    /// IANA timezone identifier; UTC when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    /// Allow-window specs (`"Mon-Fri 09:00-17:00"` or `"Sat"`).
    #[serde(default)]
    pub allow: Vec<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy document validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PolicyDocumentError {
    /// Document schema version is not supported.
    #[error("unsupported policy schemaVersion: {0} (expected \"1.0\")")]
    UnsupportedSchemaVersion(String),
}
