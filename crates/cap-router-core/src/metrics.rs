// crates/cap-router-core/src/metrics.rs
// ============================================================================
// Module: Metrics Registry
// Description: Process-scoped counters, gauges, and latency histograms.
// Purpose: Provide the observable instrument set updated by the pipeline.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! The metrics registry is the one sanctioned process-scoped collaborator:
//! loaders, the planner, and the trace store update its instruments, and the
//! external metrics surface renders `snapshot()`. Instruments are
//! individually safe to update concurrently; labeled families use interior
//! mutexes, scalar instruments use atomics.
//!
//! The registry is intentionally dependency-light so deployments can bridge
//! snapshots into Prometheus or OpenTelemetry without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Histogram bucket upper bounds in milliseconds for planner execution
/// latency.
pub const EXECUTION_LATENCY_BUCKETS_MS: &[u64] = &[50, 100, 200, 400, 800, 1_600, 3_200, 6_400];

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Process-scoped metrics registry.
///
/// # Invariants
/// - Instruments only ever move forward; counters are monotonic and the
///   gauge reflects the latest published snapshot size.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Tools in the current registry snapshot (gauge).
    tools_loaded: AtomicU64,
    /// Failed registry rebuilds (counter).
    tool_load_errors: AtomicU64,
    /// Traces created (counter).
    trace_created_total: AtomicU64,
    /// Trace events recorded (counter).
    trace_events_total: AtomicU64,
    /// Bids per `(capability, tool)` (labeled counter).
    planner_bids_total: Mutex<BTreeMap<(String, String), u64>>,
    /// Selections per `(capability, tool)` (labeled counter).
    planner_selection_total: Mutex<BTreeMap<(String, String), u64>>,
    /// Fallbacks per capability (labeled counter).
    planner_fallbacks_total: Mutex<BTreeMap<String, u64>>,
    /// Execution latency histogram per tool.
    planner_execution_latency_ms: Mutex<BTreeMap<String, Histogram>>,
}

impl MetricsRegistry {
    /// Creates an empty metrics registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `tools_loaded` gauge.
    pub fn set_tools_loaded(&self, count: u64) {
        self.tools_loaded.store(count, Ordering::Relaxed);
    }

    /// Increments the `tool_load_errors` counter.
    pub fn incr_tool_load_errors(&self) {
        self.tool_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the `trace_created_total` counter.
    pub fn incr_trace_created(&self) {
        self.trace_created_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the `trace_events_total` counter.
    pub fn incr_trace_events(&self) {
        self.trace_events_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments `planner_bids_total{capability, tool}`.
    pub fn incr_bid(&self, capability: &str, tool: &str) {
        let mut bids =
            self.planner_bids_total.lock().unwrap_or_else(PoisonError::into_inner);
        *bids.entry((capability.to_string(), tool.to_string())).or_default() += 1;
    }

    /// Increments `planner_selection_total{capability, tool}`.
    pub fn incr_selection(&self, capability: &str, tool: &str) {
        let mut selections =
            self.planner_selection_total.lock().unwrap_or_else(PoisonError::into_inner);
        *selections.entry((capability.to_string(), tool.to_string())).or_default() += 1;
    }

    /// Increments `planner_fallbacks_total{capability}`.
    pub fn incr_fallback(&self, capability: &str) {
        let mut fallbacks =
            self.planner_fallbacks_total.lock().unwrap_or_else(PoisonError::into_inner);
        *fallbacks.entry(capability.to_string()).or_default() += 1;
    }

    /// Observes one execution latency for `planner_execution_latency_ms{tool}`.
    pub fn observe_execution_latency(&self, tool: &str, latency_ms: u64) {
        let mut histograms =
            self.planner_execution_latency_ms.lock().unwrap_or_else(PoisonError::into_inner);
        histograms.entry(tool.to_string()).or_default().observe(latency_ms);
    }

    /// Returns a serializable snapshot of every instrument.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let bids = self.planner_bids_total.lock().unwrap_or_else(PoisonError::into_inner);
        let selections =
            self.planner_selection_total.lock().unwrap_or_else(PoisonError::into_inner);
        let fallbacks =
            self.planner_fallbacks_total.lock().unwrap_or_else(PoisonError::into_inner);
        let histograms =
            self.planner_execution_latency_ms.lock().unwrap_or_else(PoisonError::into_inner);

        MetricsSnapshot {
            tools_loaded: self.tools_loaded.load(Ordering::Relaxed),
            tool_load_errors: self.tool_load_errors.load(Ordering::Relaxed),
            trace_created_total: self.trace_created_total.load(Ordering::Relaxed),
            trace_events_total: self.trace_events_total.load(Ordering::Relaxed),
            planner_bids_total: capability_tool_counts(&bids),
            planner_selection_total: capability_tool_counts(&selections),
            planner_fallbacks_total: fallbacks
                .iter()
                .map(|(capability, count)| CapabilityCount {
                    capability: capability.clone(),
                    count: *count,
                })
                .collect(),
            planner_execution_latency_ms: histograms
                .iter()
                .map(|(tool, histogram)| HistogramSnapshot {
                    tool: tool.clone(),
                    buckets_ms: EXECUTION_LATENCY_BUCKETS_MS.to_vec(),
                    counts: histogram.bucket_counts.to_vec(),
                    count: histogram.count,
                    sum_ms: histogram.sum_ms,
                })
                .collect(),
        }
    }
}

// ============================================================================
// SECTION: Histogram
// ============================================================================

/// Fixed-bucket latency histogram state.
#[derive(Debug, Clone)]
struct Histogram {
    /// Counts per bucket; the final slot is the overflow bucket.
    bucket_counts: [u64; EXECUTION_LATENCY_BUCKETS_MS.len() + 1],
    /// Total observations.
    count: u64,
    /// Sum of observed values in milliseconds.
    sum_ms: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            bucket_counts: [0; EXECUTION_LATENCY_BUCKETS_MS.len() + 1],
            count: 0,
            sum_ms: 0,
        }
    }
}

impl Histogram {
    /// Records one observation into the first bucket whose bound contains it.
    fn observe(&mut self, value_ms: u64) {
        let slot = EXECUTION_LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| value_ms <= *bound)
            .unwrap_or(EXECUTION_LATENCY_BUCKETS_MS.len());
        self.bucket_counts[slot] += 1;
        self.count += 1;
        self.sum_ms = self.sum_ms.saturating_add(value_ms);
    }
}

// ============================================================================
// SECTION: Snapshot Types
// ============================================================================

/// Serializable snapshot of every instrument.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Tools in the current registry snapshot.
    pub tools_loaded: u64,
    /// Failed registry rebuilds.
    pub tool_load_errors: u64,
    /// Traces created.
    pub trace_created_total: u64,
    /// Trace events recorded.
    pub trace_events_total: u64,
    /// Bids per `(capability, tool)`.
    pub planner_bids_total: Vec<CapabilityToolCount>,
    /// Selections per `(capability, tool)`.
    pub planner_selection_total: Vec<CapabilityToolCount>,
    /// Fallbacks per capability.
    pub planner_fallbacks_total: Vec<CapabilityCount>,
    /// Execution latency histograms per tool.
    pub planner_execution_latency_ms: Vec<HistogramSnapshot>,
}

impl MetricsSnapshot {
    /// Returns the bid count for a `(capability, tool)` pair.
    #[must_use]
    pub fn bids(&self, capability: &str, tool: &str) -> u64 {
        labeled_count(&self.planner_bids_total, capability, tool)
    }

    /// Returns the selection count for a `(capability, tool)` pair.
    #[must_use]
    pub fn selections(&self, capability: &str, tool: &str) -> u64 {
        labeled_count(&self.planner_selection_total, capability, tool)
    }

    /// Returns the fallback count for a capability.
    #[must_use]
    pub fn fallbacks(&self, capability: &str) -> u64 {
        self.planner_fallbacks_total
            .iter()
            .find(|entry| entry.capability == capability)
            .map_or(0, |entry| entry.count)
    }
}

/// Counter labeled by capability and tool.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityToolCount {
    /// Capability label.
    pub capability: String,
    /// Tool label.
    pub tool: String,
    /// Counter value.
    pub count: u64,
}

/// Counter labeled by capability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityCount {
    /// Capability label.
    pub capability: String,
    /// Counter value.
    pub count: u64,
}

/// Serializable histogram for one tool label.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    /// Tool label.
    pub tool: String,
    /// Bucket upper bounds in milliseconds.
    pub buckets_ms: Vec<u64>,
    /// Counts per bucket; the final slot is the overflow bucket.
    pub counts: Vec<u64>,
    /// Total observations.
    pub count: u64,
    /// Sum of observed values in milliseconds.
    pub sum_ms: u64,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Flattens a `(capability, tool)` counter map into snapshot entries.
fn capability_tool_counts(
    counts: &BTreeMap<(String, String), u64>,
) -> Vec<CapabilityToolCount> {
    counts
        .iter()
        .map(|((capability, tool), count)| CapabilityToolCount {
            capability: capability.clone(),
            tool: tool.clone(),
            count: *count,
        })
        .collect()
}

/// Looks up a `(capability, tool)` count in snapshot entries.
fn labeled_count(entries: &[CapabilityToolCount], capability: &str, tool: &str) -> u64 {
    entries
        .iter()
        .find(|entry| entry.capability == capability && entry.tool == tool)
        .map_or(0, |entry| entry.count)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
