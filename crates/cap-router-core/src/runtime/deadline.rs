// crates/cap-router-core/src/runtime/deadline.rs
// ============================================================================
// Module: Overall Deadline Guard
// Description: Request-level deadline expressed as a cancellation token.
// Purpose: Compose the overall abort signal with non-leaking timers.
// Dependencies: tokio, tokio-util
// ============================================================================

//! ## Overview
//! The overall deadline covers every attempt of one plan call. It is
//! expressed as a [`CancellationToken`] the executor observes alongside its
//! own per-tool timeout; whichever fires first cancels the outstanding call.
//! The timer task is aborted when the guard drops, so no timer outlives its
//! decision on any exit path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Deadline Guard
// ============================================================================

/// Request-level deadline bound to one plan call.
///
/// # Invariants
/// - The token is cancelled at most once, when the deadline elapses.
/// - Dropping the guard aborts the timer.
#[derive(Debug)]
pub struct DeadlineGuard {
    /// Abort token observed by executors.
    token: CancellationToken,
    /// Timer task cancelling the token; absent when no deadline is set.
    timer: Option<JoinHandle<()>>,
}

impl DeadlineGuard {
    /// Starts the deadline. `None` produces a guard that never fires.
    #[must_use]
    pub fn start(timeout_ms: Option<u64>) -> Self {
        let token = CancellationToken::new();
        let timer = timeout_ms.map(|timeout_ms| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                token.cancel();
            })
        });
        Self {
            token,
            timer,
        }
    }

    /// Returns the abort token observed by executors.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true once the deadline has fired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_configured_delay() {
        let guard = DeadlineGuard::start(Some(10));
        assert!(!guard.expired());
        tokio::time::sleep(Duration::from_millis(11)).await;
        assert!(guard.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn unset_deadline_never_fires() {
        let guard = DeadlineGuard::start(None);
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        assert!(!guard.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_aborts_the_timer() {
        let guard = DeadlineGuard::start(Some(10));
        let token = guard.token().clone();
        drop(guard);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!token.is_cancelled());
    }
}
