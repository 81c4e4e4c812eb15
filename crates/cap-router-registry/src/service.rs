// crates/cap-router-registry/src/service.rs
// ============================================================================
// Module: Registry Service
// Description: Stable read interface over the loader's snapshot.
// Purpose: Expose the core registry contract to the planner.
// Dependencies: cap-router-core, crate::loader
// ============================================================================

//! ## Overview
//! A thin adapter implementing the core [`RegistryService`] contract over the
//! loader's shared snapshot handle. `list` reads the snapshot once; a
//! decision holds the returned tools for its full duration, so mid-decision
//! reloads are never observed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use cap_router_core::RegistryService;
use cap_router_core::RegistryView;
use cap_router_core::Tool;

use crate::loader::RegistryLoader;

// ============================================================================
// SECTION: Service
// ============================================================================

/// Registry service backed by a directory loader.
#[derive(Clone)]
pub struct DirectoryRegistryService {
    /// Snapshot source.
    loader: RegistryLoader,
}

impl DirectoryRegistryService {
    /// Creates a service over a loader.
    #[must_use]
    pub const fn new(loader: RegistryLoader) -> Self {
        Self {
            loader,
        }
    }
}

impl RegistryService for DirectoryRegistryService {
    fn list(&self) -> Vec<Arc<Tool>> {
        self.loader.snapshot().tools.clone()
    }

    fn registry(&self) -> RegistryView {
        RegistryView::from(self.loader.snapshot().as_ref())
    }
}
