//! Layer 2/3: horizontal grouping and complex-cell pooling.

use super::{BipoleNetwork, CorticalLayer, LayerCore};
use crate::core::{ColumnResult, LayerId, Pattern};
use crate::kernels;
use crate::params::Layer23Parameters;

/// Grouping layer combining bottom-up, top-down and horizontal sources.
///
/// Each update integrates toward
/// `min(1, max(bottom_up, direct)·w_bu + top_down·w_td + horizontal·w_h)`
/// with the capped, boosted rate from
/// [`Layer23Parameters::integration_rate`], so one call lands close to the
/// steady state.
#[derive(Debug, Clone)]
pub struct Layer23 {
    core: LayerCore,
    params: Layer23Parameters,
    bipole: BipoleNetwork,
    bottom_up: Pattern,
    top_down: Pattern,
    horizontal: Pattern,
    direct: Pattern,
    complex: Pattern,
}

impl Layer23 {
    pub fn new(params: Layer23Parameters) -> Self {
        let size = params.size;
        Self {
            core: LayerCore::new(LayerId::Layer23, size),
            bipole: BipoleNetwork::new(
                params.bipole_range,
                params.bipole_threshold,
                params.bipole_gain,
            ),
            bottom_up: Pattern::zeros(size),
            top_down: Pattern::zeros(size),
            horizontal: Pattern::zeros(size),
            direct: Pattern::zeros(size),
            complex: Pattern::zeros(size),
            params,
        }
    }

    pub fn params(&self) -> &Layer23Parameters {
        &self.params
    }

    pub fn bottom_up_buffer(&self) -> &Pattern {
        &self.bottom_up
    }

    pub fn top_down_buffer(&self) -> &Pattern {
        &self.top_down
    }

    pub fn horizontal_buffer(&self) -> &Pattern {
        &self.horizontal
    }

    /// Direct Layer4 input delivered with the priming pass.
    pub fn direct_buffer(&self) -> &Pattern {
        &self.direct
    }

    pub fn complex_cell_activation(&self) -> &Pattern {
        &self.complex
    }

    /// Top-down priming from Layer1 together with the refreshed Layer4
    /// output, integrated in one update.
    ///
    /// # Errors
    /// `DimensionMismatch` if either input differs from the layer size.
    pub fn apply_priming(&mut self, priming: &Pattern, direct: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer23 priming", priming)?;
        self.core.ensure_input("layer23 direct input", direct)?;
        self.top_down = priming.clone();
        self.direct = direct.clone();
        self.integrate()
    }

    /// Recompute horizontal grouping from the current state, then settle.
    fn integrate(&mut self) -> ColumnResult<Pattern> {
        let support = Pattern::from_fn(self.core.size, |i| {
            self.core.activation[i].max(self.bottom_up[i])
        });
        self.horizontal = self.bipole.group(&support);
        self.settle()
    }

    fn settle(&mut self) -> ColumnResult<Pattern> {
        let p = &self.params;
        let rate = p.integration_rate();
        let x = &self.core.activation;
        let integrated = Pattern::from_fn(self.core.size, |i| {
            let combined = (self.bottom_up[i].max(self.direct[i]) * p.bottom_up_weight
                + self.top_down[i] * p.top_down_weight
                + self.horizontal[i] * p.horizontal_weight)
                .min(1.0);
            x[i] + rate * (combined - x[i])
        });

        let next = if p.complex_cells {
            self.complex = pool_complex_cells(&integrated, p);
            self.complex.clone()
        } else {
            integrated.clamped(p.floor, p.ceiling)
        };
        self.core.commit(next.clone())?;
        Ok(next)
    }
}

/// Polarity-invariant pooling over immediate neighbors, lifting moderately
/// active units up to the enhancement floor.
fn pool_complex_cells(x: &Pattern, p: &Layer23Parameters) -> Pattern {
    let n = x.len();
    Pattern::from_fn(n, |i| {
        let mut pooled = x[i];
        if i > 0 {
            pooled = pooled.max(0.5 * x[i - 1]);
        }
        if i + 1 < n {
            pooled = pooled.max(0.5 * x[i + 1]);
        }
        if pooled > 0.5 * p.complex_threshold && pooled < p.enhancement_floor {
            pooled = p.enhancement_floor;
        }
        kernels::saturate(pooled, p.floor, p.ceiling)
    })
}

impl CorticalLayer for Layer23 {
    super::delegate_core!();

    fn process_bottom_up(&mut self, input: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer23 bottom-up", input)?;
        self.bottom_up = input.clone();
        self.direct = Pattern::zeros(self.core.size);
        self.integrate()
    }

    fn process_top_down(&mut self, expectation: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer23 top-down", expectation)?;
        self.top_down = expectation.clone();
        self.integrate()
    }

    /// Lateral input is grouped by the bipole network in place of the
    /// layer's own activity.
    fn process_lateral(&mut self, lateral: &Pattern) -> ColumnResult<Pattern> {
        self.core.ensure_input("layer23 lateral", lateral)?;
        self.horizontal = self.bipole.group(lateral);
        self.settle()
    }

    fn reset(&mut self) {
        let n = self.core.size;
        self.bottom_up = Pattern::zeros(n);
        self.top_down = Pattern::zeros(n);
        self.horizontal = Pattern::zeros(n);
        self.direct = Pattern::zeros(n);
        self.complex = Pattern::zeros(n);
        self.core.reset();
    }
}
