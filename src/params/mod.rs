//! Validated layer parameters and circuit configuration.
//!
//! Every parameter set is built through a validating builder; an invalid
//! value fails at `build()` and a circuit is never constructed from it.
//! Biological ranges enforced on the time constants:
//!
//! | Layer | time constant (ms) |
//! |-------|--------------------|
//! | L1    | 200 – 1000         |
//! | L2/3  | 10 – 200           |
//! | L4    | 10 – 50            |
//! | L5    | 20 – 200           |
//! | L6    | 100 – 500          |

mod layers;

pub use layers::{
    Layer1Parameters, Layer1ParametersBuilder, Layer23Parameters, Layer23ParametersBuilder,
    Layer4Parameters, Layer4ParametersBuilder, Layer5Parameters, Layer5ParametersBuilder,
    Layer6Parameters, Layer6ParametersBuilder,
};

use crate::core::{ColumnError, ColumnResult, LayerId};
use serde::{Deserialize, Serialize};

/// Widest neighborhood accepted regardless of layer size, so the default
/// radii stay valid on very small layers.
pub const SMALL_LAYER_REACH: usize = 8;

// ============================================================================
// Validation helpers
// ============================================================================

/// Range checks that name the offending layer and parameter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Check {
    layer: &'static str,
}

impl Check {
    pub(crate) fn new(layer: &'static str) -> Self {
        Self { layer }
    }

    fn fail(&self, name: &'static str, reason: String) -> ColumnError {
        ColumnError::InvalidParameter {
            layer: self.layer,
            name,
            reason,
        }
    }

    fn finite(&self, name: &'static str, value: f64) -> ColumnResult<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(self.fail(name, format!("must be finite, got {value}")))
        }
    }

    pub(crate) fn size(&self, size: usize) -> ColumnResult<()> {
        if size == 0 {
            return Err(self.fail("size", "must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Closed interval `[lo, hi]`.
    pub(crate) fn range(&self, name: &'static str, value: f64, lo: f64, hi: f64) -> ColumnResult<()> {
        self.finite(name, value)?;
        if value < lo || value > hi {
            return Err(self.fail(name, format!("must lie in [{lo}, {hi}], got {value}")));
        }
        Ok(())
    }

    /// Half-open interval `(lo, hi]`.
    pub(crate) fn open_closed(
        &self,
        name: &'static str,
        value: f64,
        lo: f64,
        hi: f64,
    ) -> ColumnResult<()> {
        self.finite(name, value)?;
        if value <= lo || value > hi {
            return Err(self.fail(name, format!("must lie in ({lo}, {hi}], got {value}")));
        }
        Ok(())
    }

    pub(crate) fn unit(&self, name: &'static str, value: f64) -> ColumnResult<()> {
        self.range(name, value, 0.0, 1.0)
    }

    pub(crate) fn non_negative(&self, name: &'static str, value: f64) -> ColumnResult<()> {
        self.at_least(name, value, 0.0)
    }

    pub(crate) fn positive(&self, name: &'static str, value: f64) -> ColumnResult<()> {
        self.finite(name, value)?;
        if value <= 0.0 {
            return Err(self.fail(name, format!("must be positive, got {value}")));
        }
        Ok(())
    }

    pub(crate) fn at_least(&self, name: &'static str, value: f64, min: f64) -> ColumnResult<()> {
        self.finite(name, value)?;
        if value < min {
            return Err(self.fail(name, format!("must be at least {min}, got {value}")));
        }
        Ok(())
    }

    pub(crate) fn count(&self, name: &'static str, value: usize, min: usize, max: usize) -> ColumnResult<()> {
        if value < min || value > max {
            return Err(self.fail(name, format!("must lie in [{min}, {max}], got {value}")));
        }
        Ok(())
    }

    /// Neighborhood reach: at least `min`, and no wider than the layer
    /// (small layers may still use up to [`SMALL_LAYER_REACH`]).
    pub(crate) fn reach(
        &self,
        name: &'static str,
        value: usize,
        min: usize,
        size: usize,
    ) -> ColumnResult<()> {
        self.count(name, value, min, size.max(SMALL_LAYER_REACH))
    }

    pub(crate) fn bounds(&self, floor: f64, ceiling: f64) -> ColumnResult<()> {
        self.finite("floor", floor)?;
        self.finite("ceiling", ceiling)?;
        if floor > ceiling {
            return Err(self.fail(
                "floor",
                format!("floor {floor} exceeds ceiling {ceiling}"),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Layer parameter variants
// ============================================================================

/// Parameters of any layer kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerParameters {
    Layer1(Layer1Parameters),
    Layer23(Layer23Parameters),
    Layer4(Layer4Parameters),
    Layer5(Layer5Parameters),
    Layer6(Layer6Parameters),
}

impl LayerParameters {
    pub fn layer_id(&self) -> LayerId {
        match self {
            LayerParameters::Layer1(_) => LayerId::Layer1,
            LayerParameters::Layer23(_) => LayerId::Layer23,
            LayerParameters::Layer4(_) => LayerId::Layer4,
            LayerParameters::Layer5(_) => LayerId::Layer5,
            LayerParameters::Layer6(_) => LayerId::Layer6,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            LayerParameters::Layer1(p) => p.size,
            LayerParameters::Layer23(p) => p.size,
            LayerParameters::Layer4(p) => p.size,
            LayerParameters::Layer5(p) => p.size,
            LayerParameters::Layer6(p) => p.size,
        }
    }

    pub fn validate(&self) -> ColumnResult<()> {
        match self {
            LayerParameters::Layer1(p) => p.validate(),
            LayerParameters::Layer23(p) => p.validate(),
            LayerParameters::Layer4(p) => p.validate(),
            LayerParameters::Layer5(p) => p.validate(),
            LayerParameters::Layer6(p) => p.validate(),
        }
    }
}

// ============================================================================
// Circuit configuration
// ============================================================================

/// How the Layer1/Layer6 stage is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Fork Layer1 and Layer6 onto the worker pool and join both.
    #[default]
    Parallel,
    /// Run Layer1 then Layer6 on the calling thread.
    Sequential,
}

/// Complete configuration of a cortical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub layer1: Layer1Parameters,
    pub layer23: Layer23Parameters,
    pub layer4: Layer4Parameters,
    pub layer5: Layer5Parameters,
    pub layer6: Layer6Parameters,
    /// Execution strategy of the modulatory stage.
    pub dispatch: DispatchMode,
    /// Worker threads available to the fork/join stage (2–4).
    pub workers: usize,
    /// Capacity of the activation history ring buffer; `None` disables it.
    pub history_capacity: Option<usize>,
    /// Fraction of supported Layer6 units that must be enhanced for resonance.
    pub resonance_threshold: f64,
    /// Default Hebbian learning rate used by `learn_default`.
    pub learning_rate: f64,
    /// Hebbian decay coefficient.
    pub weight_decay: f64,
    pub weight_min: f64,
    pub weight_max: f64,
}

impl CircuitConfig {
    /// Default parameters for every layer at a shared `size`.
    ///
    /// # Errors
    /// `InvalidParameter` if `size` is zero.
    pub fn with_size(size: usize) -> ColumnResult<Self> {
        Ok(Self {
            layer1: Layer1Parameters::builder(size).build()?,
            layer23: Layer23Parameters::builder(size).build()?,
            layer4: Layer4Parameters::builder(size).build()?,
            layer5: Layer5Parameters::builder(size).build()?,
            layer6: Layer6Parameters::builder(size).build()?,
            dispatch: DispatchMode::Parallel,
            workers: 2,
            history_capacity: None,
            resonance_threshold: 0.5,
            learning_rate: 0.05,
            weight_decay: 0.1,
            weight_min: 0.0,
            weight_max: 1.0,
        })
    }

    /// Shared layer dimension.
    pub fn size(&self) -> usize {
        self.layer4.size
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_history(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Validate every layer and the cross-layer constraints.
    pub fn validate(&self) -> ColumnResult<()> {
        self.layer1.validate()?;
        self.layer23.validate()?;
        self.layer4.validate()?;
        self.layer5.validate()?;
        self.layer6.validate()?;

        let size = self.layer4.size;
        for (id, layer_size) in [
            (LayerId::Layer1, self.layer1.size),
            (LayerId::Layer23, self.layer23.size),
            (LayerId::Layer5, self.layer5.size),
            (LayerId::Layer6, self.layer6.size),
        ] {
            if layer_size != size {
                return Err(ColumnError::InvalidParameter {
                    layer: "circuit",
                    name: "size",
                    reason: format!("{id} has size {layer_size}, expected {size} to match L4"),
                });
            }
        }

        let check = Check::new("circuit");
        check.count("workers", self.workers, 2, 4)?;
        if let Some(capacity) = self.history_capacity {
            check.count("history_capacity", capacity, 1, usize::MAX)?;
        }
        check.unit("resonance_threshold", self.resonance_threshold)?;
        check.unit("learning_rate", self.learning_rate)?;
        check.unit("weight_decay", self.weight_decay)?;
        check.bounds(self.weight_min, self.weight_max)?;
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// `Config` on malformed JSON, `InvalidParameter` on out-of-range values.
    pub fn from_json_str(json: &str) -> ColumnResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ColumnError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> ColumnResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ColumnError::Config(e.to_string()))
    }
}
