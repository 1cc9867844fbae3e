//! Layer 4: fast thalamic drive.

use super::{CorticalLayer, LayerCore};
use crate::core::{ColumnResult, LayerId, Pattern, ShuntingIntegrator};
use crate::kernels;
use crate::params::Layer4Parameters;

/// Bottom-up driving layer with weak lateral inhibition.
///
/// Each bottom-up call runs `substeps` Euler steps of the shunting equation
/// toward the rectified, gain-scaled input. The equation's own
/// `(B − x)·E` term bounds the response, so an all-ones input settles below
/// the ceiling instead of being clipped flat.
#[derive(Debug, Clone)]
pub struct Layer4 {
    core: LayerCore,
    params: Layer4Parameters,
    integrator: ShuntingIntegrator,
}

impl Layer4 {
    pub fn new(params: Layer4Parameters) -> Self {
        Self {
            core: LayerCore::new(LayerId::Layer4, params.size),
            integrator: ShuntingIntegrator::new(params.shunting()),
            params,
        }
    }

    pub fn params(&self) -> &Layer4Parameters {
        &self.params
    }

    /// Excitatory drive for one input value.
    #[inline]
    pub(crate) fn drive(value: f64, params: &Layer4Parameters) -> f64 {
        (value * params.drive_gain).max(0.0)
    }

    /// Lateral inhibition felt by `center` given the current activity.
    #[inline]
    pub(crate) fn surround(center: usize, len: usize, params: &Layer4Parameters, x: impl Fn(usize) -> f64) -> f64 {
        kernels::surround_sum(center, len, params.lateral_radius, x)
    }
}

impl CorticalLayer for Layer4 {
    super::delegate_core!();

    fn process_bottom_up(&mut self, input: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer4 bottom-up", input)?;
        let n = self.core.size;
        let drive = input.map(|&v| Self::drive(v, &self.params));

        let mut x = self.core.activation.clone();
        for _ in 0..self.params.substeps {
            let inhibition = Pattern::from_fn(n, |i| Self::surround(i, n, &self.params, |j| x[j]));
            x = self.integrator.step(&x, &drive, &inhibition)?;
        }

        self.core.commit(x.clone())?;
        Ok(x)
    }

    /// Modulatory refresh: active units are scaled by `1 + gain·signal`,
    /// silent units stay silent.
    fn process_top_down(&mut self, expectation: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer4 top-down", expectation)?;
        let p = &self.params;
        let x = &self.core.activation;
        let next = Pattern::from_fn(x.len(), |i| {
            if x[i] > p.floor {
                kernels::saturate(
                    x[i] * (1.0 + p.top_down_gain * expectation[i].max(0.0)),
                    p.floor,
                    p.ceiling,
                )
            } else {
                x[i]
            }
        });
        self.core.commit(next.clone())?;
        Ok(next)
    }

    /// Lateral input acts as extra inhibition for one shunting step.
    fn process_lateral(&mut self, lateral: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer4 lateral", lateral)?;
        let zeros = Pattern::zeros(self.core.size);
        let inhibition = lateral.map(|&v| v.max(0.0));
        let next = self.integrator.step(&self.core.activation, &zeros, &inhibition)?;
        self.core.commit(next.clone())?;
        Ok(next)
    }

    fn reset(&mut self) {
        self.core.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(size: usize) -> Layer4 {
        Layer4::new(Layer4Parameters::builder(size).build().unwrap())
    }

    #[test]
    fn test_saturates_below_ceiling() {
        let mut l4 = layer(100);
        let out = l4.process_bottom_up(&Pattern::filled(100, 1.0)).unwrap();
        for &v in out.iter() {
            assert!(v <= 1.0);
            assert!(v > 0.4, "expected saturating response, got {v}");
            assert!(v < 1.0, "response should not clip flat at the ceiling");
        }
    }

    #[test]
    fn test_response_grows_with_input() {
        let mut weak = layer(5);
        let mut strong = layer(5);
        let low = weak.process_bottom_up(&Pattern::filled(5, 0.2)).unwrap();
        let high = strong.process_bottom_up(&Pattern::filled(5, 0.8)).unwrap();
        for i in 0..5 {
            assert!(high[i] > low[i]);
        }
    }

    #[test]
    fn test_zero_input_stays_zero() {
        let mut l4 = layer(4);
        let out = l4.process_bottom_up(&Pattern::zeros(4)).unwrap();
        assert!(out.is_zero());
    }

    #[test]
    fn test_negative_input_is_rectified() {
        let mut l4 = layer(3);
        let out = l4.process_bottom_up(&Pattern::filled(3, -1.0)).unwrap();
        assert!(out.is_zero());
    }

    #[test]
    fn test_top_down_only_enhances_active_units() {
        let mut l4 = layer(3);
        l4.process_bottom_up(&Pattern::new(vec![0.0, 0.6, 0.6])).unwrap();
        let before = l4.activation().clone();
        let after = l4.process_top_down(&Pattern::filled(3, 1.0)).unwrap();
        assert_eq!(after[0], 0.0);
        assert!(after[1] > before[1]);
    }

    #[test]
    fn test_lateral_inhibits() {
        let mut l4 = layer(3);
        let before = l4.process_bottom_up(&Pattern::filled(3, 0.8)).unwrap();
        let after = l4.process_lateral(&Pattern::filled(3, 1.0)).unwrap();
        assert!(after[1] < before[1]);
    }
}
