//! Layer 1: slow attentional priming.

use super::{CorticalLayer, LayerCore};
use crate::core::{ColumnResult, LayerId, Pattern, ShuntingIntegrator};
use crate::kernels;
use crate::params::Layer1Parameters;

/// Top-down priming layer that never drives output on its own.
///
/// Two slow tracks feed the priming effect: an attention state that decays
/// and is pushed by `input·shift_rate`, and a memory trace that decays more
/// slowly and only accumulates while attention exceeds the memory threshold.
/// The priming effect is capped at [`Layer1Parameters::PRIMING_CAP`].
#[derive(Debug, Clone)]
pub struct Layer1 {
    core: LayerCore,
    params: Layer1Parameters,
    integrator: ShuntingIntegrator,
    attention: Pattern,
    memory: Pattern,
    priming: Pattern,
}

impl Layer1 {
    pub fn new(params: Layer1Parameters) -> Self {
        let size = params.size;
        Self {
            core: LayerCore::new(LayerId::Layer1, size),
            integrator: ShuntingIntegrator::new(params.shunting()),
            attention: Pattern::zeros(size),
            memory: Pattern::zeros(size),
            priming: Pattern::zeros(size),
            params,
        }
    }

    pub fn params(&self) -> &Layer1Parameters {
        &self.params
    }

    pub fn attention_state(&self) -> &Pattern {
        &self.attention
    }

    pub fn memory_trace(&self) -> &Pattern {
        &self.memory
    }

    /// Priming signal handed to Layer2/3, never above 0.5.
    pub fn priming_effect(&self) -> &Pattern {
        &self.priming
    }

    fn update_priming(&mut self) {
        let strength = self.params.priming_strength;
        let attention = &self.attention;
        let memory = &self.memory;
        self.priming = Pattern::from_fn(self.core.size, |i| {
            ((attention[i] + 0.5 * memory[i]) * strength)
                .max(0.0)
                .min(Layer1Parameters::PRIMING_CAP)
        });
    }
}

impl CorticalLayer for Layer1 {
    super::delegate_core!();

    fn process_bottom_up(&mut self, input: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer1 bottom-up", input)?;
        let p = &self.params;
        let dt = p.effective_step();

        let attention = Pattern::from_fn(self.core.size, |i| {
            kernels::saturate(
                self.attention[i] * (1.0 - p.attention_decay * dt) + input[i] * p.shift_rate,
                0.0,
                1.0,
            )
        });
        let memory = Pattern::from_fn(self.core.size, |i| {
            let gain = if attention[i] > p.memory_threshold {
                attention[i] * p.memory_gain * dt
            } else {
                0.0
            };
            kernels::saturate(self.memory[i] * (1.0 - p.memory_decay * dt) + gain, 0.0, 1.0)
        });
        self.attention = attention;
        self.memory = memory;
        self.update_priming();

        let driven = self.integrator.excite(&self.core.activation, &self.priming)?;
        let (blend, floor, ceiling) = (self.params.attention_blend, self.params.floor, self.params.ceiling);
        let next = Pattern::from_fn(self.core.size, |i| {
            kernels::saturate(driven[i].max(blend * self.attention[i]), floor, ceiling)
        });
        self.core.commit(next.clone())?;
        Ok(next)
    }

    /// An expectation shifts attention directly; the activation itself only
    /// moves on the next bottom-up call.
    fn process_top_down(&mut self, expectation: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer1 top-down", expectation)?;
        let shift = self.params.shift_rate;
        self.attention = Pattern::from_fn(self.core.size, |i| {
            kernels::saturate(self.attention[i] + shift * expectation[i].max(0.0), 0.0, 1.0)
        });
        self.update_priming();
        Ok(self.core.activation.clone())
    }

    fn process_lateral(&mut self, lateral: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer1 lateral", lateral)?;
        Ok(self.core.activation.clone())
    }

    fn reset(&mut self) {
        self.attention = Pattern::zeros(self.core.size);
        self.memory = Pattern::zeros(self.core.size);
        self.priming = Pattern::zeros(self.core.size);
        self.core.reset();
    }
}
