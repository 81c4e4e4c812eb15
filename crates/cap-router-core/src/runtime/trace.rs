// crates/cap-router-core/src/runtime/trace.rs
// ============================================================================
// Module: Trace Store
// Description: Bounded, TTL-expiring per-decision event log.
// Purpose: Record and expose inspectable decision traces.
// Dependencies: crate::{core, metrics}, chrono, rand, serde
// ============================================================================

//! ## Overview
//! Every decision owns one trace: an ordered, timestamped sequence of events
//! from `request` to a terminal outcome. The store is bounded two ways:
//! entries expire after a TTL and the insertion-ordered sequence is evicted
//! oldest-first beyond a capacity cap. Expired entries are deleted lazily on
//! read, and recording into an unknown or expired trace is a silent no-op so
//! late executor events cannot fault a decision that already aged out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::TraceId;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Trace store bounds.
///
/// # Invariants
/// - `max_traces` is at least one.
/// - `ttl` is at least one millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceStoreConfig {
    /// Maximum retained traces before oldest-first eviction.
    pub max_traces: usize,
    /// Time-to-live for each trace.
    pub ttl: Duration,
}

impl Default for TraceStoreConfig {
    fn default() -> Self {
        Self {
            max_traces: 1_000,
            ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl TraceStoreConfig {
    /// Validates the configured bounds.
    ///
    /// # Errors
    ///
    /// Returns [`TraceConfigError`] when a bound is out of range.
    pub const fn validate(&self) -> Result<(), TraceConfigError> {
        if self.max_traces == 0 {
            return Err(TraceConfigError::ZeroCapacity);
        }
        if self.ttl.as_millis() == 0 {
            return Err(TraceConfigError::ZeroTtl);
        }
        Ok(())
    }
}

/// Trace store configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum TraceConfigError {
    /// Capacity bound below one.
    #[error("max_traces must be at least 1")]
    ZeroCapacity,
    /// TTL below one millisecond.
    #[error("ttl must be at least 1ms")]
    ZeroTtl,
}

// ============================================================================
// SECTION: Trace Model
// ============================================================================

/// Trace event kinds in the closed decision alphabet.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    /// Decision entry with the request envelope.
    Request,
    /// Scored candidate list.
    Scores,
    /// One execution attempt began.
    Attempt,
    /// A candidate was selected.
    Selected,
    /// The decision succeeded.
    Success,
    /// A recoverable failure advanced to the next candidate.
    Fallback,
    /// A per-tool or overall deadline expired.
    Timeout,
    /// No candidate survived the gates.
    NoCandidates,
    /// The decision failed terminally.
    Failure,
    /// A post-check failure advanced to the next candidate.
    PostFallback,
}

impl TraceEventKind {
    /// Returns the stable string form of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Scores => "scores",
            Self::Attempt => "attempt",
            Self::Selected => "selected",
            Self::Success => "success",
            Self::Fallback => "fallback",
            Self::Timeout => "timeout",
            Self::NoCandidates => "no_candidates",
            Self::Failure => "failure",
            Self::PostFallback => "post_fallback",
        }
    }
}

/// One timestamped decision event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Event timestamp.
    pub ts: DateTime<Utc>,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: TraceEventKind,
    /// Structured event payload.
    pub data: Value,
}

/// One decision's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Opaque trace identifier.
    pub id: TraceId,
    /// Creation timestamp.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Events in insertion order.
    pub events: Vec<TraceEvent>,
}

// ============================================================================
// SECTION: Identifier Generation
// ============================================================================

/// Boot-scoped trace identifier generator.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
struct TraceIdGenerator {
    /// Boot-scoped random identifier for entropy.
    boot_id: u64,
    /// Monotonic counter for identifiers issued in this process.
    counter: AtomicU64,
}

impl TraceIdGenerator {
    /// Creates a new generator seeded from the OS RNG.
    fn new() -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            boot_id: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues a new trace identifier.
    fn issue(&self) -> TraceId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        TraceId::new(format!("trace-{:016x}-{:016x}", self.boot_id, seq))
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Stored trace with its monotonic creation instant.
#[derive(Debug)]
struct TraceEntry {
    /// Serializable trace value.
    trace: Trace,
    /// Monotonic creation instant for TTL checks.
    created: Instant,
}

/// Interior store state protected by one mutex.
#[derive(Debug, Default)]
struct StoreState {
    /// Traces keyed by identifier.
    traces: HashMap<TraceId, TraceEntry>,
    /// Identifiers in insertion order for oldest-first eviction.
    order: VecDeque<TraceId>,
}

/// Bounded, TTL-expiring trace store.
///
/// # Invariants
/// - `order` and `traces` reference the same identifier set.
/// - Insertion order equals creation order; expired entries form a prefix of
///   `order`.
#[derive(Debug)]
pub struct TraceStore {
    /// Validated store bounds.
    config: TraceStoreConfig,
    /// Identifier generator.
    ids: TraceIdGenerator,
    /// Store state behind a mutex.
    state: Mutex<StoreState>,
}

impl TraceStore {
    /// Creates a trace store with the given bounds.
    ///
    /// # Errors
    ///
    /// Returns [`TraceConfigError`] when the bounds are out of range.
    pub fn new(config: TraceStoreConfig) -> Result<Self, TraceConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ids: TraceIdGenerator::new(),
            state: Mutex::new(StoreState::default()),
        })
    }

    /// Creates a trace store with default bounds.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            config: TraceStoreConfig::default(),
            ids: TraceIdGenerator::new(),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Creates a new trace and returns its identifier.
    ///
    /// Expired entries are pruned and the insertion-ordered sequence is
    /// evicted oldest-first until the capacity bound holds.
    pub fn create(&self) -> TraceId {
        let id = self.ids.issue();
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        prune_expired(&mut state, now, self.config.ttl);

        state.traces.insert(
            id.clone(),
            TraceEntry {
                trace: Trace {
                    id: id.clone(),
                    created_at: Utc::now(),
                    events: Vec::new(),
                },
                created: now,
            },
        );
        state.order.push_back(id.clone());

        while state.order.len() > self.config.max_traces {
            if let Some(oldest) = state.order.pop_front() {
                state.traces.remove(&oldest);
            }
        }

        id
    }

    /// Appends an event to a trace; a silent no-op when the identifier is
    /// unknown or the trace has expired.
    pub fn record(&self, id: &TraceId, kind: TraceEventKind, data: Value) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = match state.traces.get(id) {
            Some(entry) => now.duration_since(entry.created) > self.config.ttl,
            None => return,
        };
        if expired {
            remove_entry(&mut state, id);
            return;
        }

        if let Some(entry) = state.traces.get_mut(id) {
            entry.trace.events.push(TraceEvent {
                ts: Utc::now(),
                kind,
                data,
            });
        }
    }

    /// Returns a trace by identifier, deleting it lazily when expired.
    #[must_use]
    pub fn get(&self, id: &TraceId) -> Option<Trace> {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = now.duration_since(state.traces.get(id)?.created) > self.config.ttl;
        if expired {
            remove_entry(&mut state, id);
            return None;
        }
        state.traces.get(id).map(|entry| entry.trace.clone())
    }

    /// Returns the number of retained traces, counting unexpired entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.traces.len()
    }

    /// Returns true when no traces are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes expired entries from the front of the insertion order.
fn prune_expired(state: &mut StoreState, now: Instant, ttl: Duration) {
    while let Some(front) = state.order.front() {
        let expired = state
            .traces
            .get(front)
            .is_none_or(|entry| now.duration_since(entry.created) > ttl);
        if !expired {
            break;
        }
        if let Some(front) = state.order.pop_front() {
            state.traces.remove(&front);
        }
    }
}

/// Removes one entry from both the map and the insertion order.
fn remove_entry(state: &mut StoreState, id: &TraceId) {
    state.traces.remove(id);
    state.order.retain(|entry| entry != id);
}
