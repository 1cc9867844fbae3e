//! Per-layer parameter sets and their builders.

use super::Check;
use crate::core::{ColumnResult, ShuntingParameters};
use serde::{Deserialize, Serialize};

/// Generates chained setters on a builder wrapping `params`.
macro_rules! builder_setters {
    ($builder:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        impl $builder {
            $(
                pub fn $field(mut self, $field: $ty) -> Self {
                    self.params.$field = $field;
                    self
                }
            )*
        }
    };
}

// ============================================================================
// Layer 4
// ============================================================================

/// Fast thalamic-drive layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer4Parameters {
    pub(crate) size: usize,
    /// Membrane time constant, 10–50 ms.
    pub(crate) time_constant_ms: f64,
    pub(crate) time_step_ms: f64,
    /// Euler sub-steps per bottom-up call.
    pub(crate) substeps: usize,
    pub(crate) decay: f64,
    pub(crate) drive_gain: f64,
    pub(crate) lateral_inhibition: f64,
    pub(crate) lateral_radius: usize,
    pub(crate) self_excitation: f64,
    /// Gain of the modulatory top-down refresh.
    pub(crate) top_down_gain: f64,
    pub(crate) floor: f64,
    pub(crate) ceiling: f64,
}

impl Layer4Parameters {
    pub fn builder(size: usize) -> Layer4ParametersBuilder {
        Layer4ParametersBuilder {
            params: Self {
                size,
                time_constant_ms: 25.0,
                time_step_ms: 5.0,
                substeps: 10,
                decay: 0.1,
                drive_gain: 1.0,
                lateral_inhibition: 0.05,
                lateral_radius: 1,
                self_excitation: 0.0,
                top_down_gain: 0.1,
                floor: 0.0,
                ceiling: 1.0,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn time_constant_ms(&self) -> f64 {
        self.time_constant_ms
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn substeps(&self) -> usize {
        self.substeps
    }

    /// Shunting coefficients with the effective step `time_step / time_constant`.
    pub fn shunting(&self) -> ShuntingParameters {
        ShuntingParameters {
            decay: self.decay,
            ceiling: self.ceiling,
            floor: self.floor,
            floor_gain: 0.0,
            self_excitation: self.self_excitation,
            inhibitory_strength: self.lateral_inhibition,
            time_step: self.time_step_ms / self.time_constant_ms,
        }
    }

    pub fn validate(&self) -> ColumnResult<()> {
        let check = Check::new("layer4");
        check.size(self.size)?;
        check.range("time_constant_ms", self.time_constant_ms, 10.0, 50.0)?;
        check.open_closed("time_step_ms", self.time_step_ms, 0.0, self.time_constant_ms)?;
        check.count("substeps", self.substeps, 1, 1000)?;
        check.reach("lateral_radius", self.lateral_radius, 0, self.size)?;
        check.non_negative("decay", self.decay)?;
        check.non_negative("drive_gain", self.drive_gain)?;
        check.unit("lateral_inhibition", self.lateral_inhibition)?;
        check.non_negative("self_excitation", self.self_excitation)?;
        check.unit("top_down_gain", self.top_down_gain)?;
        check.bounds(self.floor, self.ceiling)?;
        self.shunting().validate()
    }
}

#[derive(Debug, Clone)]
pub struct Layer4ParametersBuilder {
    params: Layer4Parameters,
}

builder_setters!(Layer4ParametersBuilder {
    time_constant_ms: f64,
    time_step_ms: f64,
    substeps: usize,
    decay: f64,
    drive_gain: f64,
    lateral_inhibition: f64,
    lateral_radius: usize,
    self_excitation: f64,
    top_down_gain: f64,
    floor: f64,
    ceiling: f64,
});

impl Layer4ParametersBuilder {
    /// # Errors
    /// `InvalidParameter` naming the first value out of range.
    pub fn build(self) -> ColumnResult<Layer4Parameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

// ============================================================================
// Layer 2/3
// ============================================================================

/// Horizontal-grouping layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer23Parameters {
    pub(crate) size: usize,
    pub(crate) time_constant_ms: f64,
    pub(crate) time_step_ms: f64,
    pub(crate) bottom_up_weight: f64,
    pub(crate) top_down_weight: f64,
    pub(crate) horizontal_weight: f64,
    /// Upper bound on the raw leaky-integration rate.
    pub(crate) rate_cap: f64,
    /// Multiplier applied to the capped rate so a call settles near steady state.
    pub(crate) convergence_boost: f64,
    pub(crate) bipole_range: usize,
    pub(crate) bipole_threshold: f64,
    pub(crate) bipole_gain: f64,
    pub(crate) complex_cells: bool,
    pub(crate) complex_threshold: f64,
    pub(crate) enhancement_floor: f64,
    pub(crate) floor: f64,
    pub(crate) ceiling: f64,
}

impl Layer23Parameters {
    pub fn builder(size: usize) -> Layer23ParametersBuilder {
        Layer23ParametersBuilder {
            params: Self {
                size,
                time_constant_ms: 50.0,
                time_step_ms: 1.0,
                bottom_up_weight: 1.0,
                top_down_weight: 0.3,
                horizontal_weight: 0.2,
                rate_cap: 0.009,
                convergence_boost: 100.0,
                bipole_range: 3,
                bipole_threshold: 0.05,
                bipole_gain: 0.8,
                complex_cells: true,
                complex_threshold: 0.4,
                enhancement_floor: 0.3,
                floor: 0.0,
                ceiling: 1.0,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn time_constant_ms(&self) -> f64 {
        self.time_constant_ms
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Capped-then-boosted integration rate, never above 1.
    pub fn integration_rate(&self) -> f64 {
        ((self.time_step_ms / self.time_constant_ms).min(self.rate_cap) * self.convergence_boost)
            .min(1.0)
    }

    pub fn validate(&self) -> ColumnResult<()> {
        let check = Check::new("layer23");
        check.size(self.size)?;
        check.range("time_constant_ms", self.time_constant_ms, 10.0, 200.0)?;
        check.open_closed("time_step_ms", self.time_step_ms, 0.0, self.time_constant_ms)?;
        check.unit("bottom_up_weight", self.bottom_up_weight)?;
        check.unit("top_down_weight", self.top_down_weight)?;
        check.unit("horizontal_weight", self.horizontal_weight)?;
        check.open_closed("rate_cap", self.rate_cap, 0.0, 1.0)?;
        check.at_least("convergence_boost", self.convergence_boost, 1.0)?;
        check.reach("bipole_range", self.bipole_range, 1, self.size)?;
        check.non_negative("bipole_threshold", self.bipole_threshold)?;
        check.unit("bipole_gain", self.bipole_gain)?;
        check.non_negative("complex_threshold", self.complex_threshold)?;
        check.bounds(self.floor, self.ceiling)?;
        check.range(
            "enhancement_floor",
            self.enhancement_floor,
            self.floor,
            self.ceiling,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Layer23ParametersBuilder {
    params: Layer23Parameters,
}

builder_setters!(Layer23ParametersBuilder {
    time_constant_ms: f64,
    time_step_ms: f64,
    bottom_up_weight: f64,
    top_down_weight: f64,
    horizontal_weight: f64,
    rate_cap: f64,
    convergence_boost: f64,
    bipole_range: usize,
    bipole_threshold: f64,
    bipole_gain: f64,
    complex_cells: bool,
    complex_threshold: f64,
    enhancement_floor: f64,
    floor: f64,
    ceiling: f64,
});

impl Layer23ParametersBuilder {
    /// # Errors
    /// `InvalidParameter` naming the first value out of range.
    pub fn build(self) -> ColumnResult<Layer23Parameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

// ============================================================================
// Layer 1
// ============================================================================

/// Slow top-down priming layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer1Parameters {
    pub(crate) size: usize,
    /// 200–1000 ms.
    pub(crate) time_constant_ms: f64,
    pub(crate) time_step_ms: f64,
    /// Acceleration of the slow dynamics; default 20000.
    pub(crate) time_scale: f64,
    pub(crate) decay: f64,
    pub(crate) attention_decay: f64,
    pub(crate) memory_decay: f64,
    pub(crate) shift_rate: f64,
    pub(crate) memory_gain: f64,
    pub(crate) memory_threshold: f64,
    pub(crate) priming_strength: f64,
    pub(crate) attention_blend: f64,
    pub(crate) floor: f64,
    pub(crate) ceiling: f64,
}

impl Layer1Parameters {
    /// Priming can enhance but never drive; this cap is not configurable.
    pub const PRIMING_CAP: f64 = 0.5;

    pub fn builder(size: usize) -> Layer1ParametersBuilder {
        Layer1ParametersBuilder {
            params: Self {
                size,
                time_constant_ms: 500.0,
                time_step_ms: 1.0,
                time_scale: 20_000.0,
                decay: 0.1,
                attention_decay: 0.5,
                memory_decay: 0.05,
                shift_rate: 0.2,
                memory_gain: 0.5,
                memory_threshold: 0.3,
                priming_strength: 0.6,
                attention_blend: 0.5,
                floor: 0.0,
                ceiling: 1.0,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn time_constant_ms(&self) -> f64 {
        self.time_constant_ms
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Effective dimensionless step of the slow dynamics.
    pub fn effective_step(&self) -> f64 {
        self.time_step_ms * self.time_scale / (1000.0 * self.time_constant_ms)
    }

    pub fn shunting(&self) -> ShuntingParameters {
        ShuntingParameters {
            decay: self.decay,
            ceiling: self.ceiling,
            floor: self.floor,
            floor_gain: 0.0,
            self_excitation: 0.0,
            inhibitory_strength: 0.0,
            time_step: self.effective_step(),
        }
    }

    pub fn validate(&self) -> ColumnResult<()> {
        let check = Check::new("layer1");
        check.size(self.size)?;
        check.range("time_constant_ms", self.time_constant_ms, 200.0, 1000.0)?;
        check.positive("time_step_ms", self.time_step_ms)?;
        check.positive("time_scale", self.time_scale)?;
        check.open_closed("effective_step", self.effective_step(), 0.0, 1.0)?;
        check.non_negative("decay", self.decay)?;
        check.unit("attention_decay", self.attention_decay)?;
        check.unit("memory_decay", self.memory_decay)?;
        check.unit("shift_rate", self.shift_rate)?;
        check.unit("memory_gain", self.memory_gain)?;
        check.unit("memory_threshold", self.memory_threshold)?;
        check.unit("priming_strength", self.priming_strength)?;
        check.unit("attention_blend", self.attention_blend)?;
        check.bounds(self.floor, self.ceiling)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Layer1ParametersBuilder {
    params: Layer1Parameters,
}

builder_setters!(Layer1ParametersBuilder {
    time_constant_ms: f64,
    time_step_ms: f64,
    time_scale: f64,
    decay: f64,
    attention_decay: f64,
    memory_decay: f64,
    shift_rate: f64,
    memory_gain: f64,
    memory_threshold: f64,
    priming_strength: f64,
    attention_blend: f64,
    floor: f64,
    ceiling: f64,
});

impl Layer1ParametersBuilder {
    /// # Errors
    /// `InvalidParameter` naming the first value out of range.
    pub fn build(self) -> ColumnResult<Layer1Parameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

// ============================================================================
// Layer 6
// ============================================================================

/// Modulatory feedback layer enforcing the ART matching rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer6Parameters {
    pub(crate) size: usize,
    /// 100–500 ms. Validated for range only; Layer6 runs one update per
    /// call, so the per-call leak is set by `decay_rate` alone.
    pub(crate) time_constant_ms: f64,
    /// Leak of the persistent modulation state per call.
    pub(crate) decay_rate: f64,
    pub(crate) on_center_gain: f64,
    pub(crate) off_surround_strength: f64,
    pub(crate) surround_radius: usize,
    pub(crate) modulation_threshold: f64,
    pub(crate) attentional_gain: f64,
    pub(crate) floor: f64,
    pub(crate) ceiling: f64,
}

impl Layer6Parameters {
    pub fn builder(size: usize) -> Layer6ParametersBuilder {
        Layer6ParametersBuilder {
            params: Self {
                size,
                time_constant_ms: 200.0,
                decay_rate: 0.1,
                on_center_gain: 1.0,
                off_surround_strength: 0.1,
                surround_radius: 2,
                modulation_threshold: 0.1,
                attentional_gain: 0.5,
                floor: 0.0,
                ceiling: 1.0,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn time_constant_ms(&self) -> f64 {
        self.time_constant_ms
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn modulation_threshold(&self) -> f64 {
        self.modulation_threshold
    }

    pub fn surround_radius(&self) -> usize {
        self.surround_radius
    }

    pub fn validate(&self) -> ColumnResult<()> {
        let check = Check::new("layer6");
        check.size(self.size)?;
        check.range("time_constant_ms", self.time_constant_ms, 100.0, 500.0)?;
        check.unit("decay_rate", self.decay_rate)?;
        check.non_negative("on_center_gain", self.on_center_gain)?;
        check.unit("off_surround_strength", self.off_surround_strength)?;
        check.reach("surround_radius", self.surround_radius, 0, self.size)?;
        check.non_negative("modulation_threshold", self.modulation_threshold)?;
        check.non_negative("attentional_gain", self.attentional_gain)?;
        check.non_negative("floor", self.floor)?;
        check.bounds(self.floor, self.ceiling)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Layer6ParametersBuilder {
    params: Layer6Parameters,
}

builder_setters!(Layer6ParametersBuilder {
    time_constant_ms: f64,
    decay_rate: f64,
    on_center_gain: f64,
    off_surround_strength: f64,
    surround_radius: usize,
    modulation_threshold: f64,
    attentional_gain: f64,
    floor: f64,
    ceiling: f64,
});

impl Layer6ParametersBuilder {
    /// # Errors
    /// `InvalidParameter` naming the first value out of range.
    pub fn build(self) -> ColumnResult<Layer6Parameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

// ============================================================================
// Layer 5
// ============================================================================

/// Output and action-selection layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer5Parameters {
    pub(crate) size: usize,
    pub(crate) time_constant_ms: f64,
    pub(crate) time_step_ms: f64,
    pub(crate) amplification: f64,
    pub(crate) burst_threshold: f64,
    pub(crate) burst_gain: f64,
    /// Share of the decayed previous activation in the blend.
    pub(crate) persistence: f64,
    pub(crate) output_gain: f64,
    pub(crate) normalization_constant: f64,
    pub(crate) normalization_threshold: f64,
    pub(crate) category_threshold: f64,
    /// Inhibitory strength of the lateral competition step.
    pub(crate) competition: f64,
    pub(crate) floor: f64,
    pub(crate) ceiling: f64,
}

impl Layer5Parameters {
    pub fn builder(size: usize) -> Layer5ParametersBuilder {
        Layer5ParametersBuilder {
            params: Self {
                size,
                time_constant_ms: 50.0,
                time_step_ms: 5.0,
                amplification: 1.2,
                burst_threshold: 0.7,
                burst_gain: 1.5,
                persistence: 0.3,
                output_gain: 1.0,
                normalization_constant: 0.05,
                normalization_threshold: 1e-3,
                category_threshold: 0.5,
                competition: 0.5,
                floor: 0.0,
                ceiling: 1.0,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn time_constant_ms(&self) -> f64 {
        self.time_constant_ms
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn category_threshold(&self) -> f64 {
        self.category_threshold
    }

    /// Per-call retention of the previous activation.
    pub fn previous_decay(&self) -> f64 {
        1.0 - self.time_step_ms / self.time_constant_ms
    }

    pub fn shunting(&self) -> ShuntingParameters {
        ShuntingParameters {
            decay: 0.0,
            ceiling: self.ceiling,
            floor: self.floor,
            floor_gain: 0.0,
            self_excitation: 0.0,
            inhibitory_strength: self.competition,
            time_step: self.time_step_ms / self.time_constant_ms,
        }
    }

    pub fn validate(&self) -> ColumnResult<()> {
        let check = Check::new("layer5");
        check.size(self.size)?;
        check.range("time_constant_ms", self.time_constant_ms, 20.0, 200.0)?;
        check.open_closed("time_step_ms", self.time_step_ms, 0.0, self.time_constant_ms)?;
        check.non_negative("amplification", self.amplification)?;
        check.non_negative("burst_threshold", self.burst_threshold)?;
        check.at_least("burst_gain", self.burst_gain, 1.0)?;
        check.unit("persistence", self.persistence)?;
        check.non_negative("output_gain", self.output_gain)?;
        check.non_negative("normalization_constant", self.normalization_constant)?;
        check.non_negative("normalization_threshold", self.normalization_threshold)?;
        check.non_negative("category_threshold", self.category_threshold)?;
        check.non_negative("competition", self.competition)?;
        check.bounds(self.floor, self.ceiling)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Layer5ParametersBuilder {
    params: Layer5Parameters,
}

builder_setters!(Layer5ParametersBuilder {
    time_constant_ms: f64,
    time_step_ms: f64,
    amplification: f64,
    burst_threshold: f64,
    burst_gain: f64,
    persistence: f64,
    output_gain: f64,
    normalization_constant: f64,
    normalization_threshold: f64,
    category_threshold: f64,
    competition: f64,
    floor: f64,
    ceiling: f64,
});

impl Layer5ParametersBuilder {
    /// # Errors
    /// `InvalidParameter` naming the first value out of range.
    pub fn build(self) -> ColumnResult<Layer5Parameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnError;

    #[test]
    fn test_layer4_time_constant_range() {
        assert!(Layer4Parameters::builder(4).time_constant_ms(10.0).build().is_ok());
        assert!(Layer4Parameters::builder(4).time_constant_ms(50.0).build().is_ok());
        let err = Layer4Parameters::builder(4)
            .time_constant_ms(60.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ColumnError::InvalidParameter {
                layer: "layer4",
                name: "time_constant_ms",
                ..
            }
        ));
    }

    #[test]
    fn test_layer1_time_constant_range() {
        assert!(Layer1Parameters::builder(4).time_constant_ms(150.0).build().is_err());
        assert!(Layer1Parameters::builder(4).time_constant_ms(1000.0).build().is_ok());
        assert!(Layer1Parameters::builder(4).time_constant_ms(1001.0).build().is_err());
    }

    #[test]
    fn test_layer6_time_constant_range() {
        assert!(Layer6Parameters::builder(4).time_constant_ms(99.0).build().is_err());
        assert!(Layer6Parameters::builder(4).time_constant_ms(500.0).build().is_ok());
    }

    #[test]
    fn test_zero_size_rejected_everywhere() {
        assert!(Layer1Parameters::builder(0).build().is_err());
        assert!(Layer23Parameters::builder(0).build().is_err());
        assert!(Layer4Parameters::builder(0).build().is_err());
        assert!(Layer5Parameters::builder(0).build().is_err());
        assert!(Layer6Parameters::builder(0).build().is_err());
    }

    #[test]
    fn test_floor_above_ceiling_rejected() {
        assert!(Layer4Parameters::builder(4).floor(0.9).ceiling(0.1).build().is_err());
        assert!(Layer5Parameters::builder(4).floor(2.0).build().is_err());
    }

    #[test]
    fn test_unit_gains_rejected_outside_range() {
        assert!(Layer1Parameters::builder(4).shift_rate(1.5).build().is_err());
        assert!(Layer6Parameters::builder(4).decay_rate(-0.1).build().is_err());
        assert!(Layer23Parameters::builder(4).top_down_weight(1.1).build().is_err());
    }

    #[test]
    fn test_neighborhood_reach_bounded_by_size() {
        assert!(Layer23Parameters::builder(3).bipole_range(usize::MAX).build().is_err());
        assert!(Layer23Parameters::builder(3).bipole_range(0).build().is_err());
        assert!(Layer6Parameters::builder(3).surround_radius(usize::MAX).build().is_err());
        assert!(Layer4Parameters::builder(3).lateral_radius(usize::MAX).build().is_err());

        assert!(Layer23Parameters::builder(40).bipole_range(40).build().is_ok());
        assert!(Layer23Parameters::builder(40).bipole_range(41).build().is_err());
        assert!(Layer6Parameters::builder(40).surround_radius(0).build().is_ok());
        // Defaults stay valid on the smallest layers.
        assert!(Layer23Parameters::builder(1).build().is_ok());
        assert!(Layer6Parameters::builder(1).build().is_ok());
        assert!(Layer4Parameters::builder(1).build().is_ok());
    }

    #[test]
    fn test_layer23_integration_rate() {
        let p = Layer23Parameters::builder(4).build().unwrap();
        assert!((p.integration_rate() - 0.9).abs() < 1e-12);

        let full = Layer23Parameters::builder(4).convergence_boost(1000.0).build().unwrap();
        assert_eq!(full.integration_rate(), 1.0);
    }

    #[test]
    fn test_layer1_effective_step() {
        let p = Layer1Parameters::builder(4).build().unwrap();
        assert!((p.effective_step() - 0.04).abs() < 1e-12);
        assert!(Layer1Parameters::builder(4).time_scale(1e9).build().is_err());
    }

    #[test]
    fn test_layer5_previous_decay() {
        let p = Layer5Parameters::builder(4).build().unwrap();
        assert!((p.previous_decay() - 0.9).abs() < 1e-12);
    }
}
