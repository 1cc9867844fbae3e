//! Layer 5: output and action selection.

use super::{CorticalLayer, LayerCore};
use crate::core::{ColumnResult, LayerId, Pattern, ShuntingIntegrator};
use crate::params::Layer5Parameters;

/// Output layer.
///
/// Processing order per bottom-up call: amplification, burst gain above the
/// burst threshold, blend with the decayed previous activation, output gain,
/// divisive normalization `x / (1 + k·Σx)` once the sum exceeds the
/// normalization threshold, clamp.
#[derive(Debug, Clone)]
pub struct Layer5 {
    core: LayerCore,
    params: Layer5Parameters,
    integrator: ShuntingIntegrator,
    previous: Pattern,
}

impl Layer5 {
    pub fn new(params: Layer5Parameters) -> Self {
        let size = params.size;
        Self {
            core: LayerCore::new(LayerId::Layer5, size),
            integrator: ShuntingIntegrator::new(params.shunting()),
            previous: Pattern::zeros(size),
            params,
        }
    }

    pub fn params(&self) -> &Layer5Parameters {
        &self.params
    }

    pub fn previous_activation(&self) -> &Pattern {
        &self.previous
    }

    /// True when any unit exceeds the category threshold.
    pub fn category_formed(&self) -> bool {
        self.core
            .activation
            .iter()
            .any(|&v| v > self.params.category_threshold)
    }

    /// Index of the most active unit above the category threshold.
    pub fn winning_category(&self) -> Option<usize> {
        self.core
            .activation
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > self.params.category_threshold)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

impl CorticalLayer for Layer5 {
    super::delegate_core!();

    fn process_bottom_up(&mut self, input: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer5 bottom-up", input)?;
        let p = &self.params;
        let retain = p.previous_decay();

        let mut out: Vec<f64> = input
            .iter()
            .zip(self.previous.iter())
            .map(|(&x, &prev)| {
                let mut amplified = x * p.amplification;
                if amplified > p.burst_threshold {
                    amplified *= p.burst_gain;
                }
                let blended = (1.0 - p.persistence) * amplified + p.persistence * retain * prev;
                blended * p.output_gain
            })
            .collect();

        let scale = normalization_scale(out.iter().sum(), p);
        for v in &mut out {
            *v /= scale;
        }

        let out = Pattern::new(out).clamped(p.floor, p.ceiling);
        self.previous = out.clone();
        self.core.commit(out.clone())?;
        Ok(out)
    }

    /// Top-down bias excites the current activation for one shunting step.
    fn process_top_down(&mut self, expectation: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer5 top-down", expectation)?;
        let bias = expectation.map(|&v| v.max(0.0));
        let next = self.integrator.excite(&self.core.activation, &bias)?;
        self.core.commit(next.clone())?;
        Ok(next)
    }

    /// Lateral input inhibits the current activation for one shunting step.
    fn process_lateral(&mut self, lateral: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer5 lateral", lateral)?;
        let zeros = Pattern::zeros(self.core.size);
        let inhibition = lateral.map(|&v| v.max(0.0));
        let next = self
            .integrator
            .step(&self.core.activation, &zeros, &inhibition)?;
        self.core.commit(next.clone())?;
        Ok(next)
    }

    fn reset(&mut self) {
        self.previous = Pattern::zeros(self.core.size);
        self.core.reset();
    }
}

/// Divisive normalization factor for a pattern sum.
fn normalization_scale(total: f64, params: &Layer5Parameters) -> f64 {
    if total > params.normalization_threshold {
        1.0 + params.normalization_constant * total
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(size: usize) -> Layer5 {
        Layer5::new(Layer5Parameters::builder(size).build().unwrap())
    }

    #[test]
    fn test_burst_amplification() {
        let mut l5 = layer(2);
        let out = l5.process_bottom_up(&Pattern::new(vec![0.5, 0.7])).unwrap();
        // 0.5 * 1.2 = 0.6 stays below the burst threshold; 0.84 bursts.
        let total = (0.6 + 0.84 * 1.5) * 0.7;
        let scale = 1.0 + 0.05 * total;
        assert!((out[0] - 0.6 * 0.7 / scale).abs() < 1e-12);
        assert!((out[1] - (0.84 * 1.5 * 0.7 / scale).min(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_persistence_carries_previous_activation() {
        let mut l5 = layer(3);
        l5.process_bottom_up(&Pattern::filled(3, 0.5)).unwrap();
        let out = l5.process_bottom_up(&Pattern::zeros(3)).unwrap();
        assert!(out.iter().all(|&v| v > 0.0));
        assert_eq!(l5.previous_activation(), &out);
    }

    #[test]
    fn test_category_formed() {
        let mut l5 = layer(3);
        l5.process_bottom_up(&Pattern::new(vec![0.1, 0.0, 0.0])).unwrap();
        assert!(!l5.category_formed());
        l5.process_bottom_up(&Pattern::new(vec![0.0, 0.9, 0.0])).unwrap();
        assert!(l5.category_formed());
        assert_eq!(l5.winning_category(), Some(1));
    }

    #[test]
    fn test_small_sums_skip_normalization() {
        let p = Layer5Parameters::builder(1).build().unwrap();
        assert_eq!(normalization_scale(1e-4, &p), 1.0);
        assert!(normalization_scale(2.0, &p) > 1.0);
    }

    #[test]
    fn test_reset_clears_previous() {
        let mut l5 = layer(2);
        l5.process_bottom_up(&Pattern::filled(2, 0.9)).unwrap();
        l5.reset();
        assert!(l5.previous_activation().is_zero());
        assert!(l5.activation().is_zero());
    }
}
