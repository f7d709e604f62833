//! Score Aggregator - combines weighted flag values into P(x).

use crate::domain::{FlagWithValue, Metadata, Value};

/// Score returned when nothing contributes weight.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Raw and normalized score produced by an aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    /// Weighted sum of normalized flag values.
    pub raw_score: f64,
    /// Normalized probability score in [0, 1].
    pub probability_score: f64,
}

impl ScoreOutcome {
    pub fn neutral() -> Self {
        Self {
            raw_score: 0.0,
            probability_score: NEUTRAL_SCORE,
        }
    }
}

/// Trait for score aggregation strategies.
pub trait ScoreAggregator: Send + Sync {
    /// Version tag recorded on every score this aggregator produces.
    fn version(&self) -> &str;

    /// Combine the supplied flags. Callers pass active flags only.
    fn calculate(&self, flags: &[FlagWithValue], metadata: &Metadata) -> ScoreOutcome;
}

/// Weighted average of normalized flag values:
///
/// `P(x) = Σ(value_i · weight_i) / Σ(weight_i)`
///
/// Negative weights count as zero. Metadata is accepted but does not
/// influence the result.
pub struct WeightedAverageAggregator {
    version: String,
}

impl WeightedAverageAggregator {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Map a flag value into [0, 1]. Non-numeric, non-boolean values contribute 0.
    pub fn normalize(value: &Value) -> f64 {
        match value {
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Number(n) => n.clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

impl Default for WeightedAverageAggregator {
    fn default() -> Self {
        Self::new("1.0.0")
    }
}

impl ScoreAggregator for WeightedAverageAggregator {
    fn version(&self) -> &str {
        &self.version
    }

    fn calculate(&self, flags: &[FlagWithValue], _metadata: &Metadata) -> ScoreOutcome {
        if flags.is_empty() {
            return ScoreOutcome::neutral();
        }

        // Sequential fold keeps the summation order fixed
        let (weighted_sum, total_weight) =
            flags.iter().fold((0.0_f64, 0.0_f64), |(sum, weights), flag| {
                let weight = flag.weight.max(0.0);
                (sum + Self::normalize(&flag.value) * weight, weights + weight)
            });

        if total_weight == 0.0 {
            return ScoreOutcome::neutral();
        }

        // f64::min drops a NaN operand, so inf/inf from overflowing sums lands on 1.0
        let ratio = weighted_sum / total_weight;
        ScoreOutcome {
            raw_score: weighted_sum,
            probability_score: 0.0_f64.max(1.0_f64.min(ratio)),
        }
    }
}
