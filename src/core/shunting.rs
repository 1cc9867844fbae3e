//! Explicit-Euler shunting integrator.

use super::{ensure_dim, ColumnResult, Pattern};
use crate::kernels;
use crate::params::Check;
use serde::{Deserialize, Serialize};

/// Coefficients of the shunting ODE `dx/dt = -A·x + (B − x)·E − (x + C)·I`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShuntingParameters {
    /// Passive decay `A`.
    pub(crate) decay: f64,
    /// Excitatory saturation point `B`.
    pub(crate) ceiling: f64,
    /// Lower clamp applied after every step.
    pub(crate) floor: f64,
    /// Inhibitory saturation offset `C`.
    pub(crate) floor_gain: f64,
    /// Recurrent self-excitation added to `E` in proportion to `x`.
    pub(crate) self_excitation: f64,
    /// Scale applied to the inhibitory input `I`.
    pub(crate) inhibitory_strength: f64,
    /// Dimensionless Euler step.
    pub(crate) time_step: f64,
}

impl Default for ShuntingParameters {
    fn default() -> Self {
        Self {
            decay: 0.1,
            ceiling: 1.0,
            floor: 0.0,
            floor_gain: 0.0,
            self_excitation: 0.0,
            inhibitory_strength: 1.0,
            time_step: 0.1,
        }
    }
}

impl ShuntingParameters {
    pub fn builder() -> ShuntingParametersBuilder {
        ShuntingParametersBuilder {
            params: Self::default(),
        }
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn inhibitory_strength(&self) -> f64 {
        self.inhibitory_strength
    }

    /// Check every coefficient.
    pub fn validate(&self) -> ColumnResult<()> {
        let check = Check::new("shunting");
        check.non_negative("decay", self.decay)?;
        check.bounds(self.floor, self.ceiling)?;
        check.non_negative("floor_gain", self.floor_gain)?;
        check.non_negative("self_excitation", self.self_excitation)?;
        check.non_negative("inhibitory_strength", self.inhibitory_strength)?;
        check.open_closed("time_step", self.time_step, 0.0, 1.0)?;
        Ok(())
    }
}

/// Validating builder for [`ShuntingParameters`].
#[derive(Debug, Clone)]
pub struct ShuntingParametersBuilder {
    params: ShuntingParameters,
}

impl ShuntingParametersBuilder {
    pub fn decay(mut self, decay: f64) -> Self {
        self.params.decay = decay;
        self
    }

    pub fn ceiling(mut self, ceiling: f64) -> Self {
        self.params.ceiling = ceiling;
        self
    }

    pub fn floor(mut self, floor: f64) -> Self {
        self.params.floor = floor;
        self
    }

    pub fn floor_gain(mut self, floor_gain: f64) -> Self {
        self.params.floor_gain = floor_gain;
        self
    }

    pub fn self_excitation(mut self, self_excitation: f64) -> Self {
        self.params.self_excitation = self_excitation;
        self
    }

    pub fn inhibitory_strength(mut self, inhibitory_strength: f64) -> Self {
        self.params.inhibitory_strength = inhibitory_strength;
        self
    }

    pub fn time_step(mut self, time_step: f64) -> Self {
        self.params.time_step = time_step;
        self
    }

    /// # Errors
    /// `InvalidParameter` naming the first coefficient out of range.
    pub fn build(self) -> ColumnResult<ShuntingParameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Stateless single-step integrator.
///
/// Given the same parameters and inputs it always returns the same vector;
/// the result is clamped to `[floor, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShuntingIntegrator {
    params: ShuntingParameters,
}

impl ShuntingIntegrator {
    pub fn new(params: ShuntingParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ShuntingParameters {
        &self.params
    }

    /// Advance every unit by one Euler step.
    ///
    /// # Errors
    /// `DimensionMismatch` if the excitatory or inhibitory vectors differ in
    /// length from `state`.
    pub fn step(
        &self,
        state: &Pattern,
        excitatory: &Pattern,
        inhibitory: &Pattern,
    ) -> ColumnResult<Pattern> {
        ensure_dim("shunting excitatory input", state.len(), excitatory.len())?;
        ensure_dim("shunting inhibitory input", state.len(), inhibitory.len())?;
        Ok(Pattern::from_fn(state.len(), |i| {
            kernels::shunting_update(state[i], excitatory[i], inhibitory[i], &self.params)
        }))
    }

    /// Step with excitation only.
    pub fn excite(&self, state: &Pattern, excitatory: &Pattern) -> ColumnResult<Pattern> {
        self.step(state, excitatory, &Pattern::zeros(state.len()))
    }

    /// Equilibrium of a single unit for constant inputs, ignoring the clamp.
    ///
    /// `x* = (B·E − C·I) / (A + E + I)`; self-excitation is ignored.
    pub fn equilibrium(&self, excitatory: f64, inhibitory: f64) -> f64 {
        let p = &self.params;
        let i = p.inhibitory_strength * inhibitory;
        let denom = p.decay + excitatory + i;
        if denom <= f64::EPSILON {
            0.0
        } else {
            (p.ceiling * excitatory - p.floor_gain * i) / denom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_inverted_bounds() {
        let result = ShuntingParameters::builder().floor(0.8).ceiling(0.2).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_step() {
        assert!(ShuntingParameters::builder().time_step(0.0).build().is_err());
        assert!(ShuntingParameters::builder().time_step(1.5).build().is_err());
    }

    #[test]
    fn test_step_stays_bounded() {
        let params = ShuntingParameters::builder().time_step(1.0).build().unwrap();
        let integrator = ShuntingIntegrator::new(params);
        let state = Pattern::new(vec![0.0, 0.5, 1.0]);
        let excite = Pattern::filled(3, 50.0);
        let next = integrator.excite(&state, &excite).unwrap();
        assert!(next.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_step_dimension_mismatch() {
        let integrator = ShuntingIntegrator::new(ShuntingParameters::default());
        let state = Pattern::zeros(3);
        assert!(integrator.excite(&state, &Pattern::zeros(2)).is_err());
    }

    #[test]
    fn test_repeated_steps_approach_equilibrium() {
        let params = ShuntingParameters::builder().time_step(0.2).build().unwrap();
        let integrator = ShuntingIntegrator::new(params);
        let excite = Pattern::filled(1, 1.0);
        let mut state = Pattern::zeros(1);
        for _ in 0..200 {
            state = integrator.excite(&state, &excite).unwrap();
        }
        let expected = integrator.equilibrium(1.0, 0.0);
        assert!((state[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_inhibition_lowers_activity() {
        let integrator = ShuntingIntegrator::new(ShuntingParameters::default());
        let state = Pattern::filled(2, 0.5);
        let excite = Pattern::filled(2, 0.5);
        let free = integrator.excite(&state, &excite).unwrap();
        let inhibited = integrator
            .step(&state, &excite, &Pattern::filled(2, 1.0))
            .unwrap();
        assert!(inhibited[0] < free[0]);
    }
}
