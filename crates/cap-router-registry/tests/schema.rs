// crates/cap-router-registry/tests/schema.rs
// ============================================================================
// Module: Document Schema Tests
// Description: Verdicts for tool, registry, and policy documents.
// Purpose: Validate strict document shapes and round-trip stability.
// Dependencies: cap-router-registry, cap-router-core, serde_json
// ============================================================================

//! ## Overview
//! Validates the canonical document schemas: required fields, bounds,
//! nested additional-property rejection, endpoint variants, and the
//! validate/serialize/re-validate round trip.

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

use cap_router_core::Tool;
use cap_router_registry::DocumentValidator;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn valid_tool() -> Value {
    json!({
        "id": "ehr-search",
        "name": "EHR Search",
        "version": "1.0.0",
        "description": "Patient lookup against the EHR",
        "capabilities": [
            {
                "name": "patient.search",
                "inputs": { "mrn": "string" },
                "outputs": { "id": "string", "name": "string" }
            }
        ],
        "cost_estimate": 0.1,
        "sla": { "p95_ms": 200, "success_rate_min": 0.99 },
        "preconditions": {
            "requiresNetwork": true,
            "requiresVpn": false,
            "env": ["EHR_API_KEY"]
        },
        "endpoint": { "type": "http", "url": "https://ehr.example.com", "timeout_ms": 1500 }
    })
}

// ============================================================================
// SECTION: Tool Documents
// ============================================================================

#[test]
fn valid_tool_document_passes() {
    let validator = DocumentValidator::new();
    assert!(validator.validate_tool(&valid_tool()).is_ok());
}

#[test]
fn missing_capabilities_fail() {
    let validator = DocumentValidator::new();
    let mut doc = valid_tool();
    doc["capabilities"] = json!([]);
    assert!(validator.validate_tool(&doc).is_err());
}

#[test]
fn empty_id_fails() {
    let validator = DocumentValidator::new();
    let mut doc = valid_tool();
    doc["id"] = json!("");
    assert!(validator.validate_tool(&doc).is_err());
}

#[test]
fn negative_cost_fails() {
    let validator = DocumentValidator::new();
    let mut doc = valid_tool();
    doc["cost_estimate"] = json!(-0.5);
    assert!(validator.validate_tool(&doc).is_err());
}

#[test]
fn success_rate_above_one_fails() {
    let validator = DocumentValidator::new();
    let mut doc = valid_tool();
    doc["sla"] = json!({ "p95_ms": 200, "success_rate_min": 1.5 });
    assert!(validator.validate_tool(&doc).is_err());
}

#[test]
fn nested_additional_properties_are_rejected() {
    let validator = DocumentValidator::new();

    let mut doc = valid_tool();
    doc["capabilities"][0]["extra"] = json!(true);
    assert!(validator.validate_tool(&doc).is_err());

    let mut doc = valid_tool();
    doc["sla"]["extra"] = json!(true);
    assert!(validator.validate_tool(&doc).is_err());

    let mut doc = valid_tool();
    doc["preconditions"]["extra"] = json!(true);
    assert!(validator.validate_tool(&doc).is_err());

    let mut doc = valid_tool();
    doc["endpoint"]["extra"] = json!(true);
    assert!(validator.validate_tool(&doc).is_err());
}

#[test]
fn endpoint_variant_selects_required_fields() {
    let validator = DocumentValidator::new();

    let mut doc = valid_tool();
    doc["endpoint"] = json!({ "type": "rpa", "script": "fax/send", "timeout_ms": 5000 });
    assert!(validator.validate_tool(&doc).is_ok());

    // An http endpoint with rpa fields fails.
    let mut doc = valid_tool();
    doc["endpoint"] = json!({ "type": "http", "script": "fax/send", "timeout_ms": 5000 });
    assert!(validator.validate_tool(&doc).is_err());

    let mut doc = valid_tool();
    doc["endpoint"] = json!({ "type": "carrier-pigeon", "timeout_ms": 5000 });
    assert!(validator.validate_tool(&doc).is_err());
}

#[test]
fn validate_serialize_revalidate_is_stable() {
    let validator = DocumentValidator::new();
    let doc = valid_tool();
    assert!(validator.validate_tool(&doc).is_ok());

    let tool: Tool = serde_json::from_value(doc).unwrap();
    tool.validate().unwrap();
    let round_tripped = serde_json::to_value(&tool).unwrap();
    assert!(validator.validate_tool(&round_tripped).is_ok());
}

// ============================================================================
// SECTION: Registry Documents
// ============================================================================

#[test]
fn registry_document_requires_updated_at() {
    let validator = DocumentValidator::new();
    let doc = json!({ "tools": [valid_tool()] });
    assert!(validator.validate_registry(&doc).is_err());

    let doc = json!({ "tools": [valid_tool()], "updatedAt": "2026-01-10T12:00:00Z" });
    assert!(validator.validate_registry(&doc).is_ok());
}

#[test]
fn registry_document_rejects_extra_fields() {
    let validator = DocumentValidator::new();
    let doc = json!({
        "tools": [],
        "updatedAt": "2026-01-10T12:00:00Z",
        "extra": 1
    });
    assert!(validator.validate_registry(&doc).is_err());
}

// ============================================================================
// SECTION: Policy Documents
// ============================================================================

#[test]
fn policy_document_requires_the_literal_schema_version() {
    let validator = DocumentValidator::new();
    assert!(validator.validate_policy(&json!({ "schemaVersion": "1.0" })).is_ok());
    assert!(validator.validate_policy(&json!({ "schemaVersion": "2.0" })).is_err());
    assert!(validator.validate_policy(&json!({})).is_err());
}

#[test]
fn policy_document_accepts_tenant_rules() {
    let validator = DocumentValidator::new();
    let doc = json!({
        "schemaVersion": "1.0",
        "default": {
            "allowCapabilities": ["patient.search"],
            "timeWindows": { "tz": "America/New_York", "allow": ["Mon-Fri 09:00-17:00"] }
        },
        "tenants": {
            "acme": {
                "denyCapabilities": ["billing.charge"],
                "preSchemas": { "patient.search": { "type": "object" } },
                "postSchemas": { "patient.search": { "type": "object" } }
            }
        }
    });
    assert!(validator.validate_policy(&doc).is_ok());
}

#[test]
fn policy_tenant_rules_reject_unknown_fields() {
    let validator = DocumentValidator::new();
    let doc = json!({
        "schemaVersion": "1.0",
        "default": { "allowEverything": true }
    });
    assert!(validator.validate_policy(&doc).is_err());
}
