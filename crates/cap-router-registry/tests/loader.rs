// crates/cap-router-registry/tests/loader.rs
// ============================================================================
// Module: Registry Loader Tests
// Description: Directory aggregation, fail-as-unit rebuilds, and metrics.
// Purpose: Validate snapshot assembly from mixed document directories.
// Dependencies: cap-router-registry, cap-router-core, tempfile
// ============================================================================

//! ## Overview
//! Validates the loader: YAML/JSON aggregation, registry-document vs
//! tool-document classification, unknown-extension skipping, duplicate-id
//! rejection, and the fail-as-unit rebuild contract that retains the
//! previous snapshot and counts the error.

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

use std::fs;
use std::path::Path;
use std::sync::Arc;

use cap_router_core::MetricsRegistry;
use cap_router_core::RegistryService;
use cap_router_registry::DirectoryRegistryService;
use cap_router_registry::LoadError;
use cap_router_registry::RegistryLoader;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const SEARCH_TOOL_YAML: &str = r"
id: ehr-search
name: EHR Search
version: 1.0.0
capabilities:
  - name: patient.search
    inputs:
      mrn: string
cost_estimate: 0.1
sla:
  p95_ms: 200
  success_rate_min: 0.99
endpoint:
  type: http
  url: https://ehr.example.com/search
  timeout_ms: 1500
";

const REGISTRY_JSON: &str = r#"{
  "updatedAt": "2026-01-10T12:00:00Z",
  "tools": [
    {
      "id": "billing-api",
      "name": "Billing API",
      "version": "2.1.0",
      "capabilities": [{ "name": "billing.charge" }]
    },
    {
      "id": "fax-bridge",
      "name": "Fax Bridge",
      "version": "0.9.0",
      "capabilities": [{ "name": "document.send" }],
      "endpoint": { "type": "rpa", "script": "fax/send", "timeout_ms": 30000 }
    }
  ]
}"#;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn loader(dir: &Path) -> (RegistryLoader, Arc<MetricsRegistry>) {
    let metrics = Arc::new(MetricsRegistry::new());
    (RegistryLoader::new(dir, metrics.clone()), metrics)
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

#[test]
fn aggregates_registry_and_tool_documents() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "search.yaml", SEARCH_TOOL_YAML);
    write(dir.path(), "registry.json", REGISTRY_JSON);
    write(dir.path(), "notes.txt", "not a tool document");

    let (loader, metrics) = loader(dir.path());
    let count = loader.reload().unwrap();
    assert_eq!(count, 3);

    let snapshot = loader.snapshot();
    let mut ids: Vec<&str> =
        snapshot.tools.iter().map(|tool| tool.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["billing-api", "ehr-search", "fax-bridge"]);
    assert_eq!(snapshot.updated_at.to_rfc3339(), "2026-01-10T12:00:00+00:00");
    assert_eq!(metrics.snapshot().tools_loaded, 3);
}

#[test]
fn service_exposes_the_snapshot() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "search.yml", SEARCH_TOOL_YAML);

    let (loader, _metrics) = loader(dir.path());
    loader.reload().unwrap();

    let service = DirectoryRegistryService::new(loader);
    assert_eq!(service.list().len(), 1);
    let view = service.registry();
    assert_eq!(view.tools.len(), 1);
    assert_eq!(view.tools[0].id.as_str(), "ehr-search");
}

#[test]
fn empty_directory_yields_an_empty_snapshot() {
    let dir = TempDir::new().unwrap();
    let (loader, metrics) = loader(dir.path());
    assert_eq!(loader.reload().unwrap(), 0);
    assert!(loader.snapshot().tools.is_empty());
    assert_eq!(metrics.snapshot().tools_loaded, 0);
}

// ============================================================================
// SECTION: Fail-As-Unit Rebuilds
// ============================================================================

#[test]
fn invalid_file_fails_the_rebuild_and_retains_the_snapshot() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "search.yaml", SEARCH_TOOL_YAML);

    let (loader, metrics) = loader(dir.path());
    loader.reload().unwrap();
    assert_eq!(loader.snapshot().tools.len(), 1);

    // A tool without capabilities fails schema validation.
    write(dir.path(), "broken.json", r#"{ "id": "x", "name": "x", "version": "1" }"#);
    let err = loader.reload().unwrap_err();
    assert!(matches!(err, LoadError::Schema { .. }), "unexpected error: {err:?}");

    let snapshot = loader.snapshot();
    assert_eq!(snapshot.tools.len(), 1);
    assert_eq!(snapshot.tools[0].id.as_str(), "ehr-search");
    assert_eq!(metrics.snapshot().tool_load_errors, 1);
    assert_eq!(metrics.snapshot().tools_loaded, 1);
}

#[test]
fn unparsable_yaml_fails_the_rebuild() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken.yaml", "id: [unclosed");

    let (loader, metrics) = loader(dir.path());
    assert!(matches!(loader.reload(), Err(LoadError::Parse { .. })));
    assert_eq!(metrics.snapshot().tool_load_errors, 1);
}

#[test]
fn duplicate_tool_ids_fail_the_rebuild() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.yaml", SEARCH_TOOL_YAML);
    write(dir.path(), "b.yaml", SEARCH_TOOL_YAML);

    let (loader, _metrics) = loader(dir.path());
    let err = loader.reload().unwrap_err();
    match err {
        LoadError::DuplicateTool {
            id, ..
        } => assert_eq!(id.as_str(), "ehr-search"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unknown_top_level_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "extra.json",
        r#"{
          "id": "x",
          "name": "x",
          "version": "1",
          "capabilities": [{ "name": "a" }],
          "surprise": true
        }"#,
    );

    let (loader, _metrics) = loader(dir.path());
    assert!(matches!(loader.reload(), Err(LoadError::Schema { .. })));
}

#[test]
fn endpoint_timeout_below_one_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "zero.json",
        r#"{
          "id": "x",
          "name": "x",
          "version": "1",
          "capabilities": [{ "name": "a" }],
          "endpoint": { "type": "http", "url": "https://x.example.com", "timeout_ms": 0 }
        }"#,
    );

    let (loader, _metrics) = loader(dir.path());
    assert!(matches!(loader.reload(), Err(LoadError::Schema { .. })));
}
