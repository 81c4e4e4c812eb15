// crates/cap-router-core/src/runtime/scorer.rs
// ============================================================================
// Module: Weighted Scorer
// Description: Contract-Net-style scalar bids from declared tool metadata.
// Purpose: Rank candidates by fit, SLA, reward, and cost terms.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The weighted scorer computes `wFit*fit + wSla*sla + wReward*reward -
//! wCost*cost`. Fit is constant because the capability gate runs upstream;
//! reward is a neutral placeholder until a learned signal replaces it. A
//! non-finite result degrades to negative infinity so the candidate sorts
//! last instead of poisoning the ordering.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::tool::Tool;
use crate::interfaces::ScoreRequest;
use crate::interfaces::Scorer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Latency ceiling normalizing the SLA term.
const SLA_CEILING_MS: f64 = 5_000.0;
/// Assumed p95 latency for tools without an SLA declaration.
const DEFAULT_P95_MS: f64 = 3_000.0;
/// Neutral reward placeholder.
const NEUTRAL_REWARD: f64 = 0.5;

// ============================================================================
// SECTION: Weights
// ============================================================================

/// Term weights for the weighted scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Weight of the capability-fit term.
    pub fit: f64,
    /// Weight of the SLA latency term.
    pub sla: f64,
    /// Weight of the reward term.
    pub reward: f64,
    /// Weight of the cost penalty.
    pub cost: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fit: 0.45,
            sla: 0.25,
            reward: 0.15,
            cost: 0.15,
        }
    }
}

// ============================================================================
// SECTION: Weighted Scorer
// ============================================================================

/// Scorer combining declared SLA and cost under fixed weights.
#[derive(Debug, Clone, Default)]
pub struct WeightedScorer {
    /// Active term weights.
    weights: ScoreWeights,
}

impl WeightedScorer {
    /// Creates a scorer with the default weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scorer with explicit weights.
    #[must_use]
    pub const fn with_weights(weights: ScoreWeights) -> Self {
        Self {
            weights,
        }
    }
}

impl Scorer for WeightedScorer {
    fn score(&self, tool: &Tool, _request: &ScoreRequest<'_>) -> f64 {
        let fit = 1.0;
        let p95_ms = tool
            .sla
            .as_ref()
            .map_or(DEFAULT_P95_MS, |sla| precision_lossy(sla.p95_ms));
        let sla = clamp01(1.0 - p95_ms.min(SLA_CEILING_MS) / SLA_CEILING_MS);
        let reward = NEUTRAL_REWARD;
        let cost = tool.cost_estimate.unwrap_or(0.0);

        let score = self.weights.fit * fit + self.weights.sla * sla
            + self.weights.reward * reward
            - self.weights.cost * cost;
        if score.is_finite() { score } else { f64::NEG_INFINITY }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Clamps a value into `[0, 1]`.
fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Converts a millisecond count to `f64`; precision loss above 2^53 is
/// irrelevant at the SLA ceiling.
#[allow(clippy::cast_precision_loss, reason = "values are clamped to the SLA ceiling")]
fn precision_lossy(value: u64) -> f64 {
    value as f64
}

// ============================================================================
// SECTION: Tests
// ============================================================================
