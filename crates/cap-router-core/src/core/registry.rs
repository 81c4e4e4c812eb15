// crates/cap-router-core/src/core/registry.rs
// ============================================================================
// Module: Registry Snapshot
// Description: Immutable point-in-time view of the tool catalog.
// Purpose: Provide the snapshot value published by registry loaders.
// Dependencies: crate::core::tool, chrono, serde
// ============================================================================

//! ## Overview
//! A registry snapshot is the unit of publication for the tool catalog:
//! loaders rebuild the whole snapshot and swap a shared pointer, so readers
//! observe either the previous or the next catalog, never a partial one. A
//! decision holds its snapshot reference for its full duration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::core::tool::Tool;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Immutable registry snapshot.
///
/// # Invariants
/// - `tools` preserves document order and contains unique tool identifiers.
/// - The snapshot is never mutated after publication.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Tools in document order.
    pub tools: Vec<Arc<Tool>>,
    /// Timestamp of the snapshot's source material.
    pub updated_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Creates a snapshot from owned tools.
    #[must_use]
    pub fn new(tools: Vec<Tool>, updated_at: DateTime<Utc>) -> Self {
        Self {
            tools: tools.into_iter().map(Arc::new).collect(),
            updated_at,
        }
    }

    /// Returns an empty snapshot stamped with the given time.
    #[must_use]
    pub const fn empty(updated_at: DateTime<Utc>) -> Self {
        Self {
            tools: Vec::new(),
            updated_at,
        }
    }
}

/// Serializable registry view exposed to external surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryView {
    /// Tools in document order.
    pub tools: Vec<Tool>,
    /// Timestamp of the snapshot's source material.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<&RegistrySnapshot> for RegistryView {
    fn from(snapshot: &RegistrySnapshot) -> Self {
        Self {
            tools: snapshot.tools.iter().map(|tool| (**tool).clone()).collect(),
            updated_at: snapshot.updated_at,
        }
    }
}
