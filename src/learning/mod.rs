//! Hebbian plasticity on inter-layer pathways.
//!
//! ## Learning Rule
//!
//! ```text
//! Δw_ij = η · post_i · pre_j − λ · η · w_ij
//! ```
//!
//! applied elementwise and clipped to `[min, max]` afterwards. A rate of
//! zero leaves the matrix bitwise unchanged.
//!
//! Learning is gated on resonance: the circuit only adapts its pathway when
//! Layer6 reports that bottom-up and top-down signals agree.

mod weights;

pub use weights::WeightMatrix;

use crate::core::{ensure_dim, ColumnResult, Pattern};
use crate::kernels;
use crate::layers::MatchSummary;
use crate::params::Check;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Pluggable weight update.
pub trait LearningRule: Send + Sync {
    /// Update `weights` from one pre/post activity pair.
    ///
    /// Returns the Frobenius norm of the change actually applied, after
    /// clipping.
    ///
    /// # Errors
    /// `DimensionMismatch` before any weight is touched; `InvalidParameter`
    /// if `rate` lies outside `[0, 1]`.
    fn update(
        &self,
        weights: &mut WeightMatrix,
        pre: &Pattern,
        post: &Pattern,
        rate: f64,
    ) -> ColumnResult<f64>;
}

/// Outer-product Hebbian rule with proportional weight decay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HebbianDecayRule {
    pub decay_rate: f64,
}

impl HebbianDecayRule {
    pub fn new(decay_rate: f64) -> ColumnResult<Self> {
        Check::new("learning").unit("decay_rate", decay_rate)?;
        Ok(Self { decay_rate })
    }
}

impl Default for HebbianDecayRule {
    fn default() -> Self {
        Self { decay_rate: 0.1 }
    }
}

impl LearningRule for HebbianDecayRule {
    fn update(
        &self,
        weights: &mut WeightMatrix,
        pre: &Pattern,
        post: &Pattern,
        rate: f64,
    ) -> ColumnResult<f64> {
        Check::new("learning").unit("learning_rate", rate)?;
        ensure_dim("hebbian post-synaptic", weights.rows(), post.len())?;
        ensure_dim("hebbian pre-synaptic", weights.cols(), pre.len())?;
        if rate == 0.0 {
            return Ok(0.0);
        }

        let (min, max) = weights.bounds();
        let decay = self.decay_rate;
        let mut squared = 0.0;
        Zip::indexed(&mut weights.weights).for_each(|(i, j), w| {
            let delta = rate * post[i] * pre[j] - decay * rate * *w;
            let next = kernels::saturate(*w + delta, min, max);
            squared += (next - *w) * (next - *w);
            *w = next;
        });
        Ok(squared.sqrt())
    }
}

// ============================================================================
// Resonance and statistics
// ============================================================================

/// Agreement between bottom-up and top-down signals on one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResonanceState {
    /// Enough supported units were enhanced by the expectation.
    Resonant,
    /// Bottom-up support exists but the expectation did not match it.
    Mismatch,
    /// No unit had bottom-up support.
    Quiescent,
}

impl ResonanceState {
    /// Classify a Layer6 match against the required enhanced fraction.
    pub fn classify(summary: &MatchSummary, threshold: f64) -> Self {
        if summary.supported == 0 {
            ResonanceState::Quiescent
        } else if summary.enhanced > 0 && summary.enhanced_fraction() >= threshold {
            ResonanceState::Resonant
        } else {
            ResonanceState::Mismatch
        }
    }

    pub fn is_resonant(self) -> bool {
        self == ResonanceState::Resonant
    }
}

/// One learning application as reported to a statistics sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub resonance: ResonanceState,
    /// Mean Layer1 attention at the time of learning.
    pub attention_strength: f64,
    /// Frobenius norm of the applied change; zero when learning was gated.
    pub weight_change_magnitude: f64,
}

/// Receiver of learning statistics.
pub trait LearningStatisticsSink: Send {
    fn record(&mut self, record: LearningRecord);
}

impl<S: LearningStatisticsSink> LearningStatisticsSink for Arc<Mutex<S>> {
    fn record(&mut self, record: LearningRecord) {
        let mut sink = match self.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sink.record(record);
    }
}

/// In-memory statistics sink.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LearningLog {
    records: Vec<LearningRecord>,
}

impl LearningLog {
    pub fn records(&self) -> &[LearningRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn resonant_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.resonance.is_resonant())
            .count()
    }

    /// Sum of all weight change magnitudes.
    pub fn total_change(&self) -> f64 {
        self.records.iter().map(|r| r.weight_change_magnitude).sum()
    }
}

impl LearningStatisticsSink for LearningLog {
    fn record(&mut self, record: LearningRecord) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(n: usize) -> WeightMatrix {
        WeightMatrix::identity(n, 0.0, 1.0).unwrap()
    }

    #[test]
    fn test_zero_rate_is_bitwise_noop() {
        let mut w = identity(3);
        let before = w.clone();
        let rule = HebbianDecayRule::default();
        let magnitude = rule
            .update(&mut w, &Pattern::filled(3, 1.0), &Pattern::filled(3, 1.0), 0.0)
            .unwrap();
        assert_eq!(magnitude, 0.0);
        assert_eq!(w, before);
    }

    #[test]
    fn test_coactive_units_strengthen() {
        let mut w = WeightMatrix::identity(2, 0.0, 1.0).unwrap();
        let rule = HebbianDecayRule::new(0.0).unwrap();
        let pre = Pattern::new(vec![1.0, 0.0]);
        let post = Pattern::new(vec![0.0, 1.0]);
        let magnitude = rule.update(&mut w, &pre, &post, 0.5).unwrap();
        assert_eq!(w.get(1, 0), Some(0.5));
        assert_eq!(w.get(0, 1), Some(0.0));
        assert!((magnitude - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_decay_shrinks_unused_weights() {
        let mut w = identity(2);
        let rule = HebbianDecayRule::new(0.5).unwrap();
        rule.update(&mut w, &Pattern::zeros(2), &Pattern::zeros(2), 1.0)
            .unwrap();
        assert_eq!(w.get(0, 0), Some(0.5));
    }

    #[test]
    fn test_updates_stay_bounded() {
        let mut w = WeightMatrix::identity(3, 0.0, 0.8).unwrap();
        let rule = HebbianDecayRule::new(0.0).unwrap();
        for _ in 0..20 {
            rule.update(&mut w, &Pattern::filled(3, 1.0), &Pattern::filled(3, 1.0), 1.0)
                .unwrap();
        }
        assert!(w.is_bounded());
        assert_eq!(w.get(2, 0), Some(0.8));
    }

    #[test]
    fn test_dimension_mismatch_leaves_weights() {
        let mut w = identity(3);
        let before = w.clone();
        let rule = HebbianDecayRule::default();
        assert!(rule
            .update(&mut w, &Pattern::zeros(2), &Pattern::zeros(3), 0.5)
            .is_err());
        assert!(rule
            .update(&mut w, &Pattern::zeros(3), &Pattern::zeros(3), 1.5)
            .is_err());
        assert_eq!(w, before);
    }

    #[test]
    fn test_resonance_classification() {
        let quiet = MatchSummary::default();
        assert_eq!(ResonanceState::classify(&quiet, 0.5), ResonanceState::Quiescent);

        let weak = MatchSummary { supported: 4, enhanced: 1 };
        assert_eq!(ResonanceState::classify(&weak, 0.5), ResonanceState::Mismatch);

        let strong = MatchSummary { supported: 4, enhanced: 3 };
        assert_eq!(ResonanceState::classify(&strong, 0.5), ResonanceState::Resonant);

        let none_enhanced = MatchSummary { supported: 4, enhanced: 0 };
        assert_eq!(ResonanceState::classify(&none_enhanced, 0.0), ResonanceState::Mismatch);
    }

    #[test]
    fn test_shared_log_sink() {
        let log = Arc::new(Mutex::new(LearningLog::default()));
        let mut sink: Box<dyn LearningStatisticsSink> = Box::new(Arc::clone(&log));
        sink.record(LearningRecord {
            resonance: ResonanceState::Resonant,
            attention_strength: 0.2,
            weight_change_magnitude: 0.1,
        });
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.resonant_count(), 1);
        assert!((log.total_change() - 0.1).abs() < 1e-12);
    }
}
