// crates/cap-router-registry/src/schema.rs
// ============================================================================
// Module: Document Schemas
// Description: JSON schema builders for tool, registry, and policy documents.
// Purpose: Provide canonical validation schemas for catalog artifacts.
// Dependencies: jsonschema, serde_json
// ============================================================================

//! ## Overview
//! This module defines the JSON Schemas for the documents the router loads
//! from disk: single tool documents, registry documents (`{tools,
//! updatedAt}`), and policy documents. Schemas reject additional properties
//! at the top level and inside `capabilities[*]`, `sla`, `preconditions`,
//! and `endpoint` so a typo fails the document instead of silently dropping
//! a field.
//!
//! Documents are untrusted inputs; validation fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Schema Builders
// ============================================================================

/// Returns the JSON schema for a single tool document.
#[must_use]
pub fn tool_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Tool",
        "type": "object",
        "required": ["id", "name", "version", "capabilities"],
        "properties": {
            "id": { "type": "string", "minLength": 1 },
            "name": { "type": "string" },
            "version": { "type": "string" },
            "description": { "type": "string" },
            "capabilities": {
                "type": "array",
                "minItems": 1,
                "items": capability_schema()
            },
            "cost_estimate": { "type": "number", "minimum": 0 },
            "sla": sla_schema(),
            "preconditions": preconditions_schema(),
            "endpoint": endpoint_schema()
        },
        "additionalProperties": false
    })
}

/// Returns the JSON schema for a registry document.
#[must_use]
pub fn registry_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Registry",
        "type": "object",
        "required": ["tools", "updatedAt"],
        "properties": {
            "tools": {
                "type": "array",
                "items": tool_schema()
            },
            "updatedAt": { "type": "string", "format": "date-time" }
        },
        "additionalProperties": false
    })
}

/// Returns the JSON schema for a policy document.
#[must_use]
pub fn policy_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Policy",
        "type": "object",
        "required": ["schemaVersion"],
        "properties": {
            "schemaVersion": { "const": "1.0" },
            "default": tenant_policy_schema(),
            "tenants": {
                "type": "object",
                "additionalProperties": tenant_policy_schema()
            }
        },
        "additionalProperties": false
    })
}

/// Schema for a capability declaration.
fn capability_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "inputs": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "outputs": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the SLA declaration.
fn sla_schema() -> Value {
    json!({
        "type": "object",
        "required": ["p95_ms", "success_rate_min"],
        "properties": {
            "p95_ms": { "type": "integer", "minimum": 1 },
            "success_rate_min": { "type": "number", "minimum": 0, "maximum": 1 }
        },
        "additionalProperties": false
    })
}

/// Schema for execution preconditions.
fn preconditions_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "requiresNetwork": { "type": "boolean" },
            "requiresVpn": { "type": "boolean" },
            "env": {
                "type": "array",
                "items": { "type": "string", "minLength": 1 }
            }
        },
        "additionalProperties": false
    })
}

/// Schema for the tagged endpoint declaration.
fn endpoint_schema() -> Value {
    json!({
        "oneOf": [
            {
                "type": "object",
                "required": ["type", "url"],
                "properties": {
                    "type": { "const": "http" },
                    "url": { "type": "string", "minLength": 1 },
                    "timeout_ms": { "type": "integer", "minimum": 1 }
                },
                "additionalProperties": false
            },
            {
                "type": "object",
                "required": ["type", "script"],
                "properties": {
                    "type": { "const": "rpa" },
                    "script": { "type": "string", "minLength": 1 },
                    "timeout_ms": { "type": "integer", "minimum": 1 }
                },
                "additionalProperties": false
            }
        ]
    })
}

/// Schema for a tenant policy entry.
fn tenant_policy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "allowCapabilities": {
                "type": "array",
                "items": { "type": "string" }
            },
            "denyCapabilities": {
                "type": "array",
                "items": { "type": "string" }
            },
            "timeWindows": {
                "type": "object",
                "properties": {
                    "tz": { "type": "string" },
                    "allow": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "additionalProperties": false
            },
            "preSchemas": {
                "type": "object",
                "additionalProperties": true
            },
            "postSchemas": {
                "type": "object",
                "additionalProperties": true
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Document Validator
// ============================================================================

/// Schema validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Document failed schema validation.
    #[error("{0}")]
    Invalid(String),
}

/// Compiled validators for the document kinds the loader accepts.
pub struct DocumentValidator {
    /// Compiled tool document validator.
    tool: Validator,
    /// Compiled registry document validator.
    registry: Validator,
    /// Compiled policy document validator.
    policy: Validator,
}

impl DocumentValidator {
    /// Compiles the canonical document schemas.
    ///
    /// # Panics
    ///
    /// The canonical schemas are static and always compile; a failure here is
    /// a programming error.
    #[must_use]
    #[allow(clippy::expect_used, reason = "static schemas compile by construction")]
    pub fn new() -> Self {
        Self {
            tool: compile(&tool_schema()).expect("tool schema compiles"),
            registry: compile(&registry_schema()).expect("registry schema compiles"),
            policy: compile(&policy_schema()).expect("policy schema compiles"),
        }
    }

    /// Validates a single tool document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] listing every violation.
    pub fn validate_tool(&self, document: &Value) -> Result<(), SchemaError> {
        validate(&self.tool, document)
    }

    /// Validates a registry document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] listing every violation.
    pub fn validate_registry(&self, document: &Value) -> Result<(), SchemaError> {
        validate(&self.registry, document)
    }

    /// Validates a policy document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] listing every violation.
    pub fn validate_policy(&self, document: &Value) -> Result<(), SchemaError> {
        validate(&self.policy, document)
    }
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Compiles a JSON schema under Draft 2020-12.
fn compile(schema: &Value) -> Result<Validator, SchemaError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| SchemaError::Invalid(format!("invalid schema: {err}")))
}

/// Runs a compiled validator, collecting every violation.
fn validate(validator: &Validator, document: &Value) -> Result<(), SchemaError> {
    let messages: Vec<String> =
        validator.iter_errors(document).map(|err| err.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Invalid(messages.join("; ")))
    }
}
