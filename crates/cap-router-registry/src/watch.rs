// crates/cap-router-registry/src/watch.rs
// ============================================================================
// Module: Registry Watcher
// Description: Filesystem watcher driving whole-snapshot rebuilds.
// Purpose: Hot-reload the catalog on add/change/unlink events.
// Dependencies: crate::loader, notify, tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! The watcher observes the document directory and rebuilds the whole
//! snapshot on any mutation event (never incrementally). Bursts are
//! coalesced with a short settle delay so an editor writing several files
//! produces one rebuild. A failed rebuild logs a warning and leaves the
//! previous snapshot in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use notify::Event;
use notify::EventKind;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::loader::RegistryLoader;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Settle delay coalescing a burst of filesystem events into one rebuild.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Watcher startup errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The filesystem watcher could not be created or attached.
    #[error("registry watch error: {0}")]
    Watch(String),
}

// ============================================================================
// SECTION: Watcher
// ============================================================================

/// Filesystem watcher owning the reload task.
///
/// # Invariants
/// - Dropping the watcher stops the reload task and detaches the filesystem
///   watch.
pub struct RegistryWatcher {
    /// Shutdown signal for the reload task.
    shutdown: CancellationToken,
    /// Reload task handle.
    task: JoinHandle<()>,
    /// Filesystem watcher; kept alive for the watch duration.
    _watcher: RecommendedWatcher,
}

impl RegistryWatcher {
    /// Performs the initial load and starts watching the loader's directory.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] when the filesystem watch cannot be attached.
    /// Initial-load failures are not fatal: they are counted and logged, and
    /// the watcher starts with the empty snapshot.
    pub fn spawn(loader: RegistryLoader) -> Result<Self, WatchError> {
        match loader.reload() {
            Ok(count) => info!(tools = count, "registry loaded"),
            Err(err) => warn!(error = %err, "initial registry load failed"),
        }

        let (tx, rx) = mpsc::channel::<()>(64);
        let mut watcher =
            notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
                if let Ok(event) = result
                    && is_mutation(&event.kind)
                {
                    let _ = tx.try_send(());
                }
            })
            .map_err(|err| WatchError::Watch(err.to_string()))?;
        watcher
            .watch(loader.dir(), RecursiveMode::NonRecursive)
            .map_err(|err| WatchError::Watch(err.to_string()))?;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(watch_loop(loader, rx, shutdown.clone()));
        Ok(Self {
            shutdown,
            task,
            _watcher: watcher,
        })
    }
}

impl Drop for RegistryWatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.task.abort();
    }
}

// ============================================================================
// SECTION: Reload Loop
// ============================================================================

/// Coalesces event bursts and rebuilds the snapshot wholesale.
async fn watch_loop(
    loader: RegistryLoader,
    mut rx: mpsc::Receiver<()>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = rx.recv() => {
                if received.is_none() {
                    break;
                }
                tokio::time::sleep(SETTLE_DELAY).await;
                while rx.try_recv().is_ok() {}
                match loader.reload() {
                    Ok(count) => info!(tools = count, "registry reloaded"),
                    Err(err) => {
                        warn!(error = %err, "registry reload failed; previous snapshot retained");
                    }
                }
            }
        }
    }
}

/// Returns true for events that can change the catalog.
const fn is_mutation(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
}
