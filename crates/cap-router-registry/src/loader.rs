// crates/cap-router-registry/src/loader.rs
// ============================================================================
// Module: Registry Loader
// Description: Directory aggregation into an atomic registry snapshot.
// Purpose: Rebuild the whole catalog per event; fail as a unit, never partial.
// Dependencies: cap-router-core, serde_json, serde_yaml, chrono
// ============================================================================

//! ## Overview
//! The loader assembles the registry snapshot from a directory of source
//! documents. Each `*.yaml|*.yml|*.json` file is either a registry document
//! (`{tools, updatedAt}`) or a single tool document; other extensions are
//! ignored. A rebuild validates every file and publishes the new snapshot by
//! pointer swap, so readers observe either the previous or the next catalog.
//! If any file fails, the rebuild fails as a unit: the previous snapshot is
//! retained and the error counter increments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use cap_router_core::MetricsRegistry;
use cap_router_core::RegistrySnapshot;
use cap_router_core::Tool;
use cap_router_core::ToolError;
use cap_router_core::ToolId;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::schema::DocumentValidator;
use crate::schema::SchemaError;

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Registry document shape (`{tools, updatedAt}`).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDocument {
    /// Tools in document order.
    tools: Vec<Tool>,
    /// Source material timestamp.
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry load errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Any variant fails the whole rebuild; no partial snapshot is published.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Directory or file I/O failed.
    #[error("registry io error at {path}: {detail}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// I/O error detail.
        detail: String,
    },
    /// File failed to parse as YAML or JSON.
    #[error("registry parse error at {path}: {detail}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Parser error detail.
        detail: String,
    },
    /// Document failed schema validation.
    #[error("registry schema error at {path}: {source}")]
    Schema {
        /// Offending path.
        path: PathBuf,
        /// Schema violation detail.
        source: SchemaError,
    },
    /// Tool record failed invariant validation.
    #[error("registry tool error at {path}: {source}")]
    Tool {
        /// Offending path.
        path: PathBuf,
        /// Tool invariant violation.
        source: ToolError,
    },
    /// Two documents declared the same tool identifier.
    #[error("duplicate tool id {id} at {path}")]
    DuplicateTool {
        /// Duplicated identifier.
        id: ToolId,
        /// Path of the second declaration.
        path: PathBuf,
    },
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Shared loader state.
struct LoaderInner {
    /// Source directory.
    dir: PathBuf,
    /// Compiled document validators.
    validator: DocumentValidator,
    /// Process metrics registry.
    metrics: Arc<MetricsRegistry>,
    /// Current published snapshot.
    current: RwLock<Arc<RegistrySnapshot>>,
}

/// Registry loader publishing atomic snapshots from a document directory.
///
/// # Invariants
/// - `snapshot()` always returns a fully validated catalog.
/// - A failed rebuild leaves the previous snapshot in place.
#[derive(Clone)]
pub struct RegistryLoader {
    /// Shared loader state.
    inner: Arc<LoaderInner>,
}

impl RegistryLoader {
    /// Creates a loader over a document directory. The snapshot is empty
    /// until [`RegistryLoader::reload`] succeeds.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                dir: dir.into(),
                validator: DocumentValidator::new(),
                metrics,
                current: RwLock::new(Arc::new(RegistrySnapshot::empty(Utc::now()))),
            }),
        }
    }

    /// Returns the watched directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.inner.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Rebuilds the snapshot from the directory and publishes it atomically.
    ///
    /// On failure the previous snapshot is retained and the
    /// `tool_load_errors` counter increments.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] for the first file that fails.
    pub fn reload(&self) -> Result<usize, LoadError> {
        match self.build_snapshot() {
            Ok(snapshot) => {
                let count = snapshot.tools.len();
                self.inner.metrics.set_tools_loaded(u64::try_from(count).unwrap_or(u64::MAX));
                let mut current =
                    self.inner.current.write().unwrap_or_else(PoisonError::into_inner);
                *current = Arc::new(snapshot);
                Ok(count)
            }
            Err(err) => {
                self.inner.metrics.incr_tool_load_errors();
                Err(err)
            }
        }
    }

    /// Builds a candidate snapshot from every document in the directory.
    fn build_snapshot(&self) -> Result<RegistrySnapshot, LoadError> {
        let mut tools: Vec<Tool> = Vec::new();
        let mut seen: BTreeSet<ToolId> = BTreeSet::new();
        let mut newest: Option<DateTime<Utc>> = None;

        for path in self.document_paths()? {
            let value = parse_document(&path)?;
            if value.get("tools").is_some() {
                self.inner.validator.validate_registry(&value).map_err(|source| {
                    LoadError::Schema {
                        path: path.clone(),
                        source,
                    }
                })?;
                let document: RegistryDocument =
                    serde_json::from_value(value).map_err(|err| LoadError::Parse {
                        path: path.clone(),
                        detail: err.to_string(),
                    })?;
                newest = Some(newest.map_or(document.updated_at, |current| {
                    current.max(document.updated_at)
                }));
                for tool in document.tools {
                    push_tool(&mut tools, &mut seen, tool, &path)?;
                }
            } else {
                self.inner.validator.validate_tool(&value).map_err(|source| {
                    LoadError::Schema {
                        path: path.clone(),
                        source,
                    }
                })?;
                let tool: Tool =
                    serde_json::from_value(value).map_err(|err| LoadError::Parse {
                        path: path.clone(),
                        detail: err.to_string(),
                    })?;
                push_tool(&mut tools, &mut seen, tool, &path)?;
            }
        }

        Ok(RegistrySnapshot::new(tools, newest.unwrap_or_else(Utc::now)))
    }

    /// Lists recognized document paths in deterministic order.
    fn document_paths(&self) -> Result<Vec<PathBuf>, LoadError> {
        let entries = fs::read_dir(&self.inner.dir).map_err(|err| LoadError::Io {
            path: self.inner.dir.clone(),
            detail: err.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| LoadError::Io {
                path: self.inner.dir.clone(),
                detail: err.to_string(),
            })?;
            let path = entry.path();
            if path.is_file() && matches!(extension(&path), Some("yaml" | "yml" | "json")) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the lowercase file extension.
fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Parses a document file into a JSON value by extension.
fn parse_document(path: &Path) -> Result<Value, LoadError> {
    let bytes = fs::read(path).map_err(|err| LoadError::Io {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;
    match extension(path) {
        Some("json") => serde_json::from_slice(&bytes).map_err(|err| LoadError::Parse {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }),
        _ => serde_yaml::from_slice(&bytes).map_err(|err| LoadError::Parse {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }),
    }
}

/// Validates a tool and appends it, rejecting duplicate identifiers.
fn push_tool(
    tools: &mut Vec<Tool>,
    seen: &mut BTreeSet<ToolId>,
    tool: Tool,
    path: &Path,
) -> Result<(), LoadError> {
    tool.validate().map_err(|source| LoadError::Tool {
        path: path.to_path_buf(),
        source,
    })?;
    if !seen.insert(tool.id.clone()) {
        return Err(LoadError::DuplicateTool {
            id: tool.id,
            path: path.to_path_buf(),
        });
    }
    tools.push(tool);
    Ok(())
}
