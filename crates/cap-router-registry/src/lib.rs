// crates/cap-router-registry/src/lib.rs
// ============================================================================
// Module: Capability Router Registry
// Description: Document schemas, directory loader, and hot reload.
// Purpose: Maintain the validated, atomically published tool catalog.
// Dependencies: cap-router-core, jsonschema, notify, serde_yaml
// ============================================================================

//! ## Overview
//! This crate loads the tool catalog from a directory of YAML/JSON documents,
//! validates every document against canonical JSON Schemas, publishes
//! immutable snapshots by pointer swap, and rebuilds the whole snapshot when
//! the directory changes. Invalid rebuilds fail as a unit: the previous
//! snapshot stays live and the error counter increments.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod loader;
pub mod schema;
pub mod service;
pub mod watch;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use loader::LoadError;
pub use loader::RegistryLoader;
pub use schema::DocumentValidator;
pub use schema::SchemaError;
pub use schema::policy_schema;
pub use schema::registry_schema;
pub use schema::tool_schema;
pub use service::DirectoryRegistryService;
pub use watch::RegistryWatcher;
pub use watch::WatchError;
