// crates/cap-router-core/tests/policy.rs
// ============================================================================
// Module: Policy Service Tests
// Description: Rule ordering, time windows, and schema check coverage.
// Purpose: Validate fail-closed pre/post policy evaluation.
// Dependencies: cap-router-core, chrono, serde_json
// ============================================================================

//! ## Overview
//! Validates policy evaluation: strict rule order (allow-list, deny-list,
//! time windows, input schema), timezone-aware window matching, schema
//! verdicts, and tenant resolution precedence.

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

use std::collections::BTreeMap;

use cap_router_core::CapabilityName;
use cap_router_core::PolicyCode;
use cap_router_core::PolicyDocument;
use cap_router_core::PolicyService;
use cap_router_core::PostDecision;
use cap_router_core::PreDecision;
use cap_router_core::TenantId;
use cap_router_core::TenantPolicy;
use cap_router_core::TimeWindows;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn service(default: TenantPolicy) -> PolicyService {
    service_with_tenants(Some(default), BTreeMap::new())
}

fn service_with_tenants(
    default: Option<TenantPolicy>,
    tenants: BTreeMap<String, TenantPolicy>,
) -> PolicyService {
    PolicyService::new(PolicyDocument {
        schema_version: "1.0".to_string(),
        default,
        tenants,
    })
    .unwrap()
}

fn check(
    service: &PolicyService,
    capability: &str,
    now: Option<DateTime<Utc>>,
) -> PreDecision {
    service.pre_check(None, &CapabilityName::new(capability), &Map::new(), now)
}

fn deny_code(decision: &PreDecision) -> PolicyCode {
    match decision {
        PreDecision::Deny {
            code, ..
        } => *code,
        PreDecision::Allow => panic!("expected denial, got allow"),
    }
}

/// Monday 2026-03-02 at the given UTC hour/minute.
fn monday_utc(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
}

// ============================================================================
// SECTION: Rule Ordering
// ============================================================================

#[test]
fn empty_policy_allows_everything() {
    let service = service_with_tenants(None, BTreeMap::new());
    assert_eq!(check(&service, "anything.at.all", None), PreDecision::Allow);
}

#[test]
fn allow_list_excludes_unlisted_capabilities() {
    let service = service(TenantPolicy {
        allow_capabilities: Some(vec!["patient.search".to_string()]),
        ..TenantPolicy::default()
    });
    assert_eq!(check(&service, "patient.search", None), PreDecision::Allow);
    assert_eq!(deny_code(&check(&service, "billing.charge", None)), PolicyCode::CapabilityDenied);
}

#[test]
fn deny_list_rejects_listed_capabilities() {
    let service = service(TenantPolicy {
        deny_capabilities: Some(vec!["billing.charge".to_string()]),
        ..TenantPolicy::default()
    });
    assert_eq!(check(&service, "patient.search", None), PreDecision::Allow);
    assert_eq!(deny_code(&check(&service, "billing.charge", None)), PolicyCode::CapabilityDenied);
}

#[test]
fn allow_list_is_checked_before_schemas_and_windows() {
    // A capability outside the allow-list is denied as CAPABILITY_DENIED even
    // though its pre-schema would also reject and no window is open.
    let service = service(TenantPolicy {
        allow_capabilities: Some(vec!["patient.search".to_string()]),
        time_windows: Some(TimeWindows {
            tz: None,
            allow: vec!["Sun 00:00-00:01".to_string()],
        }),
        pre_schemas: Some(
            [("billing.charge".to_string(), json!({ "type": "object", "required": ["x"] }))]
                .into(),
        ),
        ..TenantPolicy::default()
    });
    let decision = check(&service, "billing.charge", Some(monday_utc(12, 0)));
    assert_eq!(deny_code(&decision), PolicyCode::CapabilityDenied);
}

#[test]
fn time_windows_are_checked_before_schemas() {
    let service = service(TenantPolicy {
        time_windows: Some(TimeWindows {
            tz: None,
            allow: vec!["Sun".to_string()],
        }),
        pre_schemas: Some(
            [("patient.search".to_string(), json!({ "type": "object", "required": ["x"] }))]
                .into(),
        ),
        ..TenantPolicy::default()
    });
    let decision = check(&service, "patient.search", Some(monday_utc(12, 0)));
    assert_eq!(deny_code(&decision), PolicyCode::TimeDenied);
}

// ============================================================================
// SECTION: Time Windows
// ============================================================================

#[test]
fn window_allows_inside_hours_and_denies_outside() {
    let service = service(TenantPolicy {
        time_windows: Some(TimeWindows {
            tz: None,
            allow: vec!["Mon-Fri 09:00-17:00".to_string()],
        }),
        ..TenantPolicy::default()
    });
    assert_eq!(check(&service, "patient.search", Some(monday_utc(10, 0))), PreDecision::Allow);
    // End-inclusive at minute resolution.
    assert_eq!(check(&service, "patient.search", Some(monday_utc(17, 0))), PreDecision::Allow);
    assert_eq!(
        deny_code(&check(&service, "patient.search", Some(monday_utc(17, 1)))),
        PolicyCode::TimeDenied
    );
}

#[test]
fn windows_evaluate_in_the_configured_timezone() {
    let service = service(TenantPolicy {
        time_windows: Some(TimeWindows {
            tz: Some("America/New_York".to_string()),
            allow: vec!["Sun".to_string()],
        }),
        ..TenantPolicy::default()
    });
    // Monday 02:00 UTC is still Sunday 21:00 in New York.
    assert_eq!(check(&service, "patient.search", Some(monday_utc(2, 0))), PreDecision::Allow);

    let mon_only = service_with_tenants(
        Some(TenantPolicy {
            time_windows: Some(TimeWindows {
                tz: Some("America/New_York".to_string()),
                allow: vec!["Mon".to_string()],
            }),
            ..TenantPolicy::default()
        }),
        BTreeMap::new(),
    );
    assert_eq!(
        deny_code(&check(&mon_only, "patient.search", Some(monday_utc(2, 0)))),
        PolicyCode::TimeDenied
    );
}

#[test]
fn unresolvable_timezone_fails_closed() {
    let service = service(TenantPolicy {
        time_windows: Some(TimeWindows {
            tz: Some("Not/AZone".to_string()),
            allow: vec!["Mon-Sun".to_string()],
        }),
        ..TenantPolicy::default()
    });
    assert_eq!(
        deny_code(&check(&service, "patient.search", Some(monday_utc(12, 0)))),
        PolicyCode::TimeDenied
    );
}

#[test]
fn malformed_window_specs_fail_closed() {
    let service = service(TenantPolicy {
        time_windows: Some(TimeWindows {
            tz: None,
            allow: vec!["Monday 09:00-17:00".to_string(), "Mon 9-17".to_string()],
        }),
        ..TenantPolicy::default()
    });
    assert_eq!(
        deny_code(&check(&service, "patient.search", Some(monday_utc(12, 0)))),
        PolicyCode::TimeDenied
    );
}

#[test]
fn empty_window_list_places_no_restriction() {
    let service = service(TenantPolicy {
        time_windows: Some(TimeWindows {
            tz: None,
            allow: Vec::new(),
        }),
        ..TenantPolicy::default()
    });
    assert_eq!(check(&service, "patient.search", Some(monday_utc(3, 0))), PreDecision::Allow);
}

// ============================================================================
// SECTION: Schema Checks
// ============================================================================

fn person_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "name"],
        "properties": {
            "id": { "type": "string" },
            "name": { "type": "string" }
        }
    })
}

#[test]
fn pre_schema_rejects_invalid_input() {
    let service = service(TenantPolicy {
        pre_schemas: Some([("patient.search".to_string(), person_schema())].into()),
        ..TenantPolicy::default()
    });

    let mut input = Map::new();
    input.insert("id".to_string(), json!("x"));
    let decision =
        service.pre_check(None, &CapabilityName::new("patient.search"), &input, None);
    assert_eq!(deny_code(&decision), PolicyCode::InputInvalid);

    input.insert("name".to_string(), json!("Alice"));
    let decision =
        service.pre_check(None, &CapabilityName::new("patient.search"), &input, None);
    assert_eq!(decision, PreDecision::Allow);
}

#[test]
fn post_schema_rejects_invalid_output() {
    let service = service(TenantPolicy {
        post_schemas: Some([("patient.search".to_string(), person_schema())].into()),
        ..TenantPolicy::default()
    });

    let mut output = Map::new();
    output.insert("id".to_string(), json!("x"));
    let decision =
        service.post_check(None, &CapabilityName::new("patient.search"), &output);
    match decision {
        PostDecision::Fail {
            code, ..
        } => assert_eq!(code, PolicyCode::PostConditionFailed),
        PostDecision::Pass => panic!("expected post-check failure"),
    }

    output.insert("name".to_string(), json!("Alice"));
    let decision =
        service.post_check(None, &CapabilityName::new("patient.search"), &output);
    assert_eq!(decision, PostDecision::Pass);
}

#[test]
fn uncompilable_schema_fails_closed() {
    let service = service(TenantPolicy {
        pre_schemas: Some(
            [("patient.search".to_string(), json!({ "type": "not-a-type" }))].into(),
        ),
        ..TenantPolicy::default()
    });
    let decision = check(&service, "patient.search", None);
    assert_eq!(deny_code(&decision), PolicyCode::InputInvalid);
}

#[test]
fn capabilities_without_schemas_pass() {
    let service = service(TenantPolicy {
        pre_schemas: Some([("billing.charge".to_string(), person_schema())].into()),
        post_schemas: Some([("billing.charge".to_string(), person_schema())].into()),
        ..TenantPolicy::default()
    });
    assert_eq!(check(&service, "patient.search", None), PreDecision::Allow);
    assert_eq!(
        service.post_check(None, &CapabilityName::new("patient.search"), &Map::new()),
        PostDecision::Pass
    );
}

// ============================================================================
// SECTION: Tenant Resolution
// ============================================================================

#[test]
fn tenant_entry_overrides_default() {
    let mut tenants = BTreeMap::new();
    tenants.insert(
        "acme".to_string(),
        TenantPolicy {
            deny_capabilities: Some(vec!["patient.search".to_string()]),
            ..TenantPolicy::default()
        },
    );
    let service = service_with_tenants(Some(TenantPolicy::default()), tenants);

    let acme = TenantId::new("acme");
    let decision = service.pre_check(
        Some(&acme),
        &CapabilityName::new("patient.search"),
        &Map::new(),
        None,
    );
    assert_eq!(deny_code(&decision), PolicyCode::CapabilityDenied);

    // A tenant without a dedicated entry falls back to the default policy.
    let other = TenantId::new("other");
    let decision = service.pre_check(
        Some(&other),
        &CapabilityName::new("patient.search"),
        &Map::new(),
        None,
    );
    assert_eq!(decision, PreDecision::Allow);
}

#[test]
fn unsupported_schema_version_is_rejected() {
    let result = PolicyService::new(PolicyDocument {
        schema_version: "2.0".to_string(),
        default: None,
        tenants: BTreeMap::new(),
    });
    assert!(result.is_err());
}
