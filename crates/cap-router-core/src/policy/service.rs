// crates/cap-router-core/src/policy/service.rs
// ============================================================================
// Module: Policy Service
// Description: Pre- and post-decision checks around every plan call.
// Purpose: Enforce allow/deny, time-window, and schema policy, fail closed.
// Dependencies: crate::policy::{document, windows}, chrono, chrono-tz, jsonschema
// ============================================================================

//! ## Overview
//! The policy service evaluates the resolved tenant policy around a decision.
//! `pre_check` applies rules in a strict order (allow-list, deny-list, time
//! windows, input schema); the first rejecting rule wins. `post_check`
//! validates tool output against the capability's post-schema. Compiled
//! schema validators are cached for the lifetime of the service.
//!
//! Every ambiguous input fails closed: malformed window specs never match,
//! unresolvable timezones deny, and uncompilable schemas deny.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Timelike;
use chrono::Utc;
use chrono_tz::Tz;
use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::CapabilityName;
use crate::core::identifiers::TenantId;
use crate::policy::document::PolicyDocument;
use crate::policy::document::PolicyDocumentError;
use crate::policy::document::TenantPolicy;
use crate::policy::windows::window_matches;

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Closed alphabet of policy decision codes.
///
/// # Invariants
/// - Variants are stable for programmatic handling; the alphabet is part of
///   the external contract even where a variant has no default rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyCode {
    /// Tenant is not permitted.
    TenantDenied,
    /// Capability is outside the allow-list or on the deny-list.
    CapabilityDenied,
    /// The current moment falls outside every allow window.
    TimeDenied,
    /// Request input failed the capability's pre-schema.
    InputInvalid,
    /// Tool output failed the capability's post-schema.
    PostConditionFailed,
}

impl PolicyCode {
    /// Returns the stable string form of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TenantDenied => "TENANT_DENIED",
            Self::CapabilityDenied => "CAPABILITY_DENIED",
            Self::TimeDenied => "TIME_DENIED",
            Self::InputInvalid => "INPUT_INVALID",
            Self::PostConditionFailed => "POST_CONDITION_FAILED",
        }
    }
}

/// Pre-decision outcome.
///
/// # Invariants
/// - `Deny` carries a code from the closed alphabet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreDecision {
    /// The request may proceed.
    Allow,
    /// The request is rejected.
    Deny {
        /// Stable decision code.
        code: PolicyCode,
        /// Optional human-readable detail.
        detail: Option<String>,
    },
}

/// Post-decision outcome.
///
/// # Invariants
/// - `Fail` carries a code from the closed alphabet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostDecision {
    /// The output passed the post-schema (or none was configured).
    Pass,
    /// The output failed the post-schema.
    Fail {
        /// Stable decision code.
        code: PolicyCode,
        /// Optional human-readable detail.
        detail: Option<String>,
    },
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Schema kind used as part of the validator cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SchemaKind {
    /// Request-input schema.
    Pre,
    /// Tool-output schema.
    Post,
}

/// Cached compile outcome; compile failures are cached so a bad schema is
/// diagnosed once and keeps failing closed.
enum CachedValidator {
    /// Compiled validator ready for use.
    Ready(Arc<Validator>),
    /// Schema failed to compile.
    Invalid(String),
}

/// Policy service evaluating tenant policy around decisions.
pub struct PolicyService {
    /// Validated policy document.
    document: PolicyDocument,
    /// Compiled validators keyed by (kind, tenant scope, capability).
    validators: Mutex<HashMap<(SchemaKind, String, String), Arc<CachedValidator>>>,
}

impl PolicyService {
    /// Creates a policy service from a document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyDocumentError`] when the document fails validation.
    pub fn new(document: PolicyDocument) -> Result<Self, PolicyDocumentError> {
        document.validate()?;
        Ok(Self {
            document,
            validators: Mutex::new(HashMap::new()),
        })
    }

    /// Evaluates pre-decision policy in strict order: allow-list, deny-list,
    /// time windows, input schema. The first rejecting rule wins.
    ///
    /// `now` is injectable for deterministic evaluation; wall-clock time is
    /// used when absent.
    #[must_use]
    pub fn pre_check(
        &self,
        tenant: Option<&TenantId>,
        capability: &CapabilityName,
        input: &Map<String, Value>,
        now: Option<DateTime<Utc>>,
    ) -> PreDecision {
        let Some(policy) = self.document.resolve(tenant.map(TenantId::as_str)) else {
            return PreDecision::Allow;
        };

        if let Some(allow) = &policy.allow_capabilities
            && !allow.iter().any(|name| name == capability.as_str())
        {
            return PreDecision::Deny {
                code: PolicyCode::CapabilityDenied,
                detail: Some(format!("capability {capability} not in allow list")),
            };
        }

        if let Some(deny) = &policy.deny_capabilities
            && deny.iter().any(|name| name == capability.as_str())
        {
            return PreDecision::Deny {
                code: PolicyCode::CapabilityDenied,
                detail: Some(format!("capability {capability} is denied")),
            };
        }

        if let Some(windows) = &policy.time_windows
            && !windows.allow.is_empty()
        {
            let now = now.unwrap_or_else(Utc::now);
            if !any_window_open(windows.tz.as_deref(), &windows.allow, now) {
                return PreDecision::Deny {
                    code: PolicyCode::TimeDenied,
                    detail: Some("current time outside allowed windows".to_string()),
                };
            }
        }

        if let Some(schemas) = &policy.pre_schemas
            && let Some(schema) = schemas.get(capability.as_str())
        {
            let scope = tenant_scope(tenant, &self.document);
            let outcome =
                self.validate_against(SchemaKind::Pre, &scope, capability, schema, input);
            if let Err(detail) = outcome {
                return PreDecision::Deny {
                    code: PolicyCode::InputInvalid,
                    detail: Some(detail),
                };
            }
        }

        PreDecision::Allow
    }

    /// Evaluates the post-decision output schema for a capability.
    #[must_use]
    pub fn post_check(
        &self,
        tenant: Option<&TenantId>,
        capability: &CapabilityName,
        output: &Map<String, Value>,
    ) -> PostDecision {
        let Some(policy) = self.document.resolve(tenant.map(TenantId::as_str)) else {
            return PostDecision::Pass;
        };
        let Some(schema) = post_schema(policy, capability) else {
            return PostDecision::Pass;
        };

        let scope = tenant_scope(tenant, &self.document);
        match self.validate_against(SchemaKind::Post, &scope, capability, schema, output) {
            Ok(()) => PostDecision::Pass,
            Err(detail) => PostDecision::Fail {
                code: PolicyCode::PostConditionFailed,
                detail: Some(detail),
            },
        }
    }

    /// Validates a JSON object against a cached compiled schema.
    fn validate_against(
        &self,
        kind: SchemaKind,
        scope: &str,
        capability: &CapabilityName,
        schema: &Value,
        value: &Map<String, Value>,
    ) -> Result<(), String> {
        let validator = self.validator_for(kind, scope, capability, schema);
        match validator.as_ref() {
            CachedValidator::Ready(validator) => {
                let value = Value::Object(value.clone());
                let messages: Vec<String> =
                    validator.iter_errors(&value).map(|err| err.to_string()).collect();
                if messages.is_empty() {
                    Ok(())
                } else {
                    Err(messages.join("; "))
                }
            }
            CachedValidator::Invalid(detail) => Err(format!("schema invalid: {detail}")),
        }
    }

    /// Returns the cached validator for a schema, compiling it on first use.
    fn validator_for(
        &self,
        kind: SchemaKind,
        scope: &str,
        capability: &CapabilityName,
        schema: &Value,
    ) -> Arc<CachedValidator> {
        let key = (kind, scope.to_string(), capability.as_str().to_string());
        let mut cache = self.validators.lock().unwrap_or_else(PoisonError::into_inner);
        cache.entry(key).or_insert_with(|| Arc::new(compile_schema(schema))).clone()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the post-schema configured for a capability, if any.
fn post_schema<'a>(policy: &'a TenantPolicy, capability: &CapabilityName) -> Option<&'a Value> {
    policy.post_schemas.as_ref()?.get(capability.as_str())
}

/// Returns the cache scope label for the resolved policy.
fn tenant_scope(tenant: Option<&TenantId>, document: &PolicyDocument) -> String {
    match tenant {
        Some(tenant) if document.tenants.contains_key(tenant.as_str()) => {
            tenant.as_str().to_string()
        }
        _ => String::new(),
    }
}

/// Compiles a JSON schema for policy validation.
fn compile_schema(schema: &Value) -> CachedValidator {
    match jsonschema::options().with_draft(Draft::Draft202012).build(schema) {
        Ok(validator) => CachedValidator::Ready(Arc::new(validator)),
        Err(err) => CachedValidator::Invalid(err.to_string()),
    }
}

/// Returns true when any allow window contains the given moment in the
/// configured timezone. Unresolvable timezones fail closed.
fn any_window_open(tz: Option<&str>, allow: &[String], now: DateTime<Utc>) -> bool {
    let tz = match tz {
        Some(name) => match Tz::from_str(name) {
            Ok(tz) => tz,
            Err(_) => return false,
        },
        None => Tz::UTC,
    };
    let local = now.with_timezone(&tz);
    let weekday = local.weekday();
    let minute_of_day = local.hour() * 60 + local.minute();
    allow.iter().any(|spec| window_matches(spec, weekday, minute_of_day))
}
