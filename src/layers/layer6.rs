//! Layer 6: modulatory feedback under the ART matching rule.

use super::{CorticalLayer, LayerCore};
use crate::core::{ColumnResult, LayerId, Pattern};
use crate::kernels;
use crate::params::Layer6Parameters;

/// Per-call tally of how the matching rule resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    /// Units whose bottom-up input exceeded the floor.
    pub supported: usize,
    /// Supported units whose modulation crossed the threshold.
    pub enhanced: usize,
}

impl MatchSummary {
    /// Share of supported units that were enhanced; zero without support.
    #[allow(clippy::cast_precision_loss)]
    pub fn enhanced_fraction(&self) -> f64 {
        if self.supported == 0 {
            0.0
        } else {
            self.enhanced as f64 / self.supported as f64
        }
    }
}

/// Corticothalamic feedback layer.
///
/// Top-down signals can only amplify units that already receive bottom-up
/// support: wherever the bottom-up input is at or below the floor the
/// output is exactly zero, however strong the expectation. The persistent
/// modulation state still integrates the expectation on those steps.
#[derive(Debug, Clone)]
pub struct Layer6 {
    core: LayerCore,
    params: Layer6Parameters,
    modulation_state: Pattern,
    expectation: Pattern,
    last_match: MatchSummary,
}

impl Layer6 {
    pub fn new(params: Layer6Parameters) -> Self {
        let size = params.size;
        Self {
            core: LayerCore::new(LayerId::Layer6, size),
            modulation_state: Pattern::zeros(size),
            expectation: Pattern::zeros(size),
            last_match: MatchSummary::default(),
            params,
        }
    }

    pub fn params(&self) -> &Layer6Parameters {
        &self.params
    }

    /// Leaky trace of past top-down signals.
    pub fn modulation_state(&self) -> &Pattern {
        &self.modulation_state
    }

    /// Cached top-down expectation used by the next bottom-up call.
    pub fn expectation(&self) -> &Pattern {
        &self.expectation
    }

    pub fn last_match(&self) -> MatchSummary {
        self.last_match
    }

    /// Apply the matching rule to `bottom_up` against `top_down` in one call.
    ///
    /// # Errors
    /// `DimensionMismatch` if either input differs from the layer size; no
    /// state is touched in that case.
    pub fn modulate(&mut self, bottom_up: &Pattern, top_down: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer6 bottom-up", bottom_up)?;
        self.core.ensure_input("layer6 top-down", top_down)?;
        self.expectation = top_down.clone();
        self.match_expectation(bottom_up)
    }

    fn match_expectation(&mut self, bottom_up: &Pattern) -> ColumnResult<Pattern> {
        let p = &self.params;
        let n = self.core.size;
        let td = &self.expectation;

        let mut summary = MatchSummary::default();
        let mut output = Vec::with_capacity(n);
        for i in 0..n {
            let surround = kernels::surround_sum(i, n, p.surround_radius, |j| td[j]);
            let modulation =
                kernels::modulation_signal(td[i], surround, self.modulation_state[i], p);
            if kernels::has_support(bottom_up[i], p) {
                summary.supported += 1;
                if modulation > p.modulation_threshold {
                    summary.enhanced += 1;
                }
            }
            output.push(kernels::art_match(bottom_up[i], modulation, p));
        }

        // The trace integrates the expectation whether or not any unit fired.
        self.modulation_state = Pattern::from_fn(n, |i| {
            kernels::leaky_integrate(self.modulation_state[i], td[i], p.decay_rate)
        });
        self.last_match = summary;

        let output = Pattern::new(output);
        self.core.commit(output.clone())?;
        Ok(output)
    }
}

impl CorticalLayer for Layer6 {
    super::delegate_core!();

    /// Match the Layer2/3 signal against the cached expectation.
    fn process_bottom_up(&mut self, input: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer6 bottom-up", input)?;
        self.match_expectation(input)
    }

    /// Cache a new expectation; the activation is unchanged until the next
    /// bottom-up call.
    fn process_top_down(&mut self, expectation: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer6 top-down", expectation)?;
        self.expectation = expectation.clone();
        Ok(self.core.activation.clone())
    }

    fn process_lateral(&mut self, lateral: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer6 lateral", lateral)?;
        Ok(self.core.activation.clone())
    }

    fn reset(&mut self) {
        self.modulation_state = Pattern::zeros(self.core.size);
        self.expectation = Pattern::zeros(self.core.size);
        self.last_match = MatchSummary::default();
        self.core.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(size: usize) -> Layer6 {
        Layer6::new(Layer6Parameters::builder(size).build().unwrap())
    }

    #[test]
    fn test_pure_top_down_yields_zero() {
        let params = Layer6Parameters::builder(3)
            .attentional_gain(10.0)
            .modulation_threshold(0.0)
            .build()
            .unwrap();
        let mut l6 = Layer6::new(params);
        let out = l6
            .modulate(&Pattern::zeros(3), &Pattern::filled(3, 1.0))
            .unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 0.0, 0.0]);
        assert_eq!(l6.last_match().supported, 0);
    }

    #[test]
    fn test_nan_bottom_up_is_not_support() {
        let params = Layer6Parameters::builder(3)
            .modulation_threshold(0.0)
            .attentional_gain(10.0)
            .build()
            .unwrap();
        let mut l6 = Layer6::new(params);
        let out = l6
            .modulate(&Pattern::new(vec![f64::NAN, 0.0, 0.0]), &Pattern::filled(3, 1.0))
            .unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 0.0, 0.0]);
        assert_eq!(l6.last_match().supported, 0);
    }

    #[test]
    fn test_state_remembers_attention_without_bottom_up() {
        let mut l6 = layer(3);
        for _ in 0..5 {
            let out = l6
                .modulate(&Pattern::zeros(3), &Pattern::filled(3, 1.0))
                .unwrap();
            assert!(out.is_zero());
        }
        assert!(l6.modulation_state().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_matched_units_are_enhanced() {
        let mut l6 = layer(5);
        let bottom_up = Pattern::filled(5, 0.4);
        let top_down = Pattern::new(vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        let out = l6.modulate(&bottom_up, &top_down).unwrap();
        assert!(out[2] > 0.4);
        assert_eq!(out[0], 0.4);
        assert_eq!(l6.last_match().supported, 5);
        assert_eq!(l6.last_match().enhanced, 1);
    }

    #[test]
    fn test_below_threshold_passes_through() {
        let params = Layer6Parameters::builder(2)
            .modulation_threshold(0.9)
            .build()
            .unwrap();
        let mut l6 = Layer6::new(params);
        let out = l6
            .modulate(&Pattern::new(vec![0.3, 0.7]), &Pattern::filled(2, 0.5))
            .unwrap();
        assert_eq!(out.to_vec(), vec![0.3, 0.7]);
    }

    #[test]
    fn test_enhancement_clamped_to_ceiling() {
        let params = Layer6Parameters::builder(1)
            .attentional_gain(100.0)
            .build()
            .unwrap();
        let mut l6 = Layer6::new(params);
        let out = l6
            .modulate(&Pattern::filled(1, 0.9), &Pattern::filled(1, 1.0))
            .unwrap();
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn test_cached_expectation_used_by_bottom_up() {
        let mut l6 = layer(3);
        l6.process_top_down(&Pattern::filled(3, 1.0)).unwrap();
        let out = l6.process_bottom_up(&Pattern::filled(3, 0.3)).unwrap();
        assert!(out.iter().all(|&v| v > 0.3));
    }

    #[test]
    fn test_time_constant_does_not_change_dynamics() {
        let build = |tau| {
            Layer6::new(
                Layer6Parameters::builder(4)
                    .time_constant_ms(tau)
                    .build()
                    .unwrap(),
            )
        };
        let (mut fast, mut slow) = (build(100.0), build(500.0));
        let bottom_up = Pattern::new(vec![0.2, 0.0, 0.6, 0.4]);
        let top_down = Pattern::new(vec![1.0, 0.5, 0.0, 0.8]);
        for _ in 0..3 {
            assert_eq!(
                fast.modulate(&bottom_up, &top_down).unwrap(),
                slow.modulate(&bottom_up, &top_down).unwrap()
            );
        }
        assert_eq!(fast.modulation_state(), slow.modulation_state());
    }

    #[test]
    fn test_enhanced_fraction() {
        let summary = MatchSummary {
            supported: 4,
            enhanced: 1,
        };
        assert!((summary.enhanced_fraction() - 0.25).abs() < 1e-12);
        assert_eq!(MatchSummary::default().enhanced_fraction(), 0.0);
    }
}
