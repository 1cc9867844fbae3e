//! Bipole cells for long-range horizontal grouping.

use crate::core::Pattern;
use crate::kernels;

/// One-dimensional bipole network.
///
/// A unit fires only when both of its flanks carry support above the
/// threshold, which completes boundaries across gaps without extending
/// them past their ends. Flank weights fall off as `1/d` and sum to one
/// per flank.
#[derive(Debug, Clone, PartialEq)]
pub struct BipoleNetwork {
    weights: Vec<f64>,
    threshold: f64,
    gain: f64,
}

impl BipoleNetwork {
    pub fn new(range: usize, threshold: f64, gain: f64) -> Self {
        let raw: Vec<f64> = (1..=range.max(1)).map(|d| 1.0 / d as f64).collect();
        let total: f64 = raw.iter().sum();
        Self {
            weights: raw.into_iter().map(|w| w / total).collect(),
            threshold,
            gain,
        }
    }

    pub fn range(&self) -> usize {
        self.weights.len()
    }

    /// Weighted support reaching `center` from one side.
    fn flank(&self, source: &Pattern, center: usize, leftward: bool) -> f64 {
        let mut sum = 0.0;
        for (k, w) in self.weights.iter().enumerate() {
            let d = k + 1;
            let j = if leftward {
                match center.checked_sub(d) {
                    Some(j) => j,
                    None => break,
                }
            } else {
                let j = center + d;
                if j >= source.len() {
                    break;
                }
                j
            };
            sum += w * source[j].max(0.0);
        }
        sum
    }

    /// Horizontal grouping signal for every unit of `source`.
    pub fn group(&self, source: &Pattern) -> Pattern {
        Pattern::from_fn(source.len(), |i| {
            let left = self.flank(source, i, true);
            let right = self.flank(source, i, false);
            if left > self.threshold && right > self.threshold {
                kernels::saturate(self.gain * 0.5 * (left + right), 0.0, 1.0)
            } else {
                0.0
            }
        })
    }
}
