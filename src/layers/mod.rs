//! The five laminar layers.
//!
//! Each layer owns its activation vector plus private persistent state and
//! exposes the shared [`CorticalLayer`] capability. [`Layer`] is the tagged
//! variant over all five kinds for code that handles layers generically.
//!
//! | Layer      | Role                                              |
//! |------------|---------------------------------------------------|
//! | [`Layer4`]  | fast thalamic drive, shunting saturation          |
//! | [`Layer23`] | bipole horizontal grouping, complex-cell pooling  |
//! | [`Layer1`]  | slow attentional priming, capped at 0.5           |
//! | [`Layer6`]  | modulatory feedback under the ART matching rule   |
//! | [`Layer5`]  | output gain, bursting, persistence, categories    |

mod bipole;
mod layer1;
mod layer23;
mod layer4;
mod layer5;
mod layer6;
mod listener;

pub use bipole::BipoleNetwork;
pub use layer1::Layer1;
pub use layer23::Layer23;
pub use layer4::Layer4;
pub use layer5::Layer5;
pub use layer6::{Layer6, MatchSummary};
pub use listener::{ActivationListener, ListenerHandle, ListenerSet};

use crate::core::{ColumnResult, LayerId, Pattern};
use crate::params::LayerParameters;
use std::sync::Arc;

/// Operations every layer supports.
pub trait CorticalLayer {
    fn id(&self) -> LayerId;

    /// Declared dimension.
    fn size(&self) -> usize;

    /// Current activation.
    fn activation(&self) -> &Pattern;

    /// Feed-forward input from the layer below.
    fn process_bottom_up(&mut self, input: &Pattern) -> ColumnResult<Pattern>;

    /// Feedback input from a higher stage.
    fn process_top_down(&mut self, expectation: &Pattern) -> ColumnResult<Pattern>;

    /// Input arriving from within the layer.
    fn process_lateral(&mut self, lateral: &Pattern) -> ColumnResult<Pattern>;

    /// Zero the activation and every persistent field.
    fn reset(&mut self);

    fn add_listener(&mut self, listener: Arc<dyn ActivationListener>) -> ListenerHandle;

    fn remove_listener(&mut self, handle: ListenerHandle) -> bool;
}

/// Identity, activation and listeners shared by every layer.
#[derive(Debug, Clone)]
pub(crate) struct LayerCore {
    id: LayerId,
    size: usize,
    activation: Pattern,
    listeners: ListenerSet,
}

impl LayerCore {
    pub(crate) fn new(id: LayerId, size: usize) -> Self {
        Self {
            id,
            size,
            activation: Pattern::zeros(size),
            listeners: ListenerSet::default(),
        }
    }

    pub(crate) fn ensure_input(&self, context: &'static str, input: &Pattern) -> ColumnResult<()> {
        input.ensure_len(context, self.size)
    }

    /// Replace the activation and notify listeners with the old and new values.
    pub(crate) fn commit(&mut self, next: Pattern) -> ColumnResult<()> {
        next.ensure_len("activation update", self.size)?;
        let old = std::mem::replace(&mut self.activation, next);
        tracing::trace!(layer = %self.id, sum = self.activation.sum(), "activation updated");
        self.listeners.notify(self.id, &old, &self.activation);
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        let old = std::mem::replace(&mut self.activation, Pattern::zeros(self.size));
        self.listeners.notify(self.id, &old, &self.activation);
    }
}

/// Implements the identity and listener methods of [`CorticalLayer`] by
/// delegating to a `core: LayerCore` field.
macro_rules! delegate_core {
    () => {
        fn id(&self) -> crate::core::LayerId {
            self.core.id
        }

        fn size(&self) -> usize {
            self.core.size
        }

        fn activation(&self) -> &crate::core::Pattern {
            &self.core.activation
        }

        fn add_listener(
            &mut self,
            listener: std::sync::Arc<dyn crate::layers::ActivationListener>,
        ) -> crate::layers::ListenerHandle {
            self.core.listeners.add(listener)
        }

        fn remove_listener(&mut self, handle: crate::layers::ListenerHandle) -> bool {
            self.core.listeners.remove(handle)
        }
    };
}
pub(crate) use delegate_core;

// ============================================================================
// Tagged variant
// ============================================================================

/// Any one of the five layer kinds.
#[derive(Debug, Clone)]
pub enum Layer {
    One(Layer1),
    TwoThree(Layer23),
    Four(Layer4),
    Five(Layer5),
    Six(Layer6),
}

macro_rules! dispatch {
    ($self:expr, $layer:ident => $body:expr) => {
        match $self {
            Layer::One($layer) => $body,
            Layer::TwoThree($layer) => $body,
            Layer::Four($layer) => $body,
            Layer::Five($layer) => $body,
            Layer::Six($layer) => $body,
        }
    };
}

impl Layer {
    /// Build the layer kind matching `params`.
    ///
    /// # Errors
    /// `InvalidParameter` if the parameters fail validation.
    pub fn from_parameters(params: LayerParameters) -> ColumnResult<Self> {
        params.validate()?;
        Ok(match params {
            LayerParameters::Layer1(p) => Layer::One(Layer1::new(p)),
            LayerParameters::Layer23(p) => Layer::TwoThree(Layer23::new(p)),
            LayerParameters::Layer4(p) => Layer::Four(Layer4::new(p)),
            LayerParameters::Layer5(p) => Layer::Five(Layer5::new(p)),
            LayerParameters::Layer6(p) => Layer::Six(Layer6::new(p)),
        })
    }

    /// Layer-specific persistent fields, flattened, for inspection.
    pub fn persistent_state(&self) -> Vec<&Pattern> {
        match self {
            Layer::One(l) => vec![l.attention_state(), l.memory_trace(), l.priming_effect()],
            Layer::TwoThree(l) => vec![
                l.bottom_up_buffer(),
                l.top_down_buffer(),
                l.horizontal_buffer(),
                l.complex_cell_activation(),
            ],
            Layer::Four(_) => Vec::new(),
            Layer::Five(l) => vec![l.previous_activation()],
            Layer::Six(l) => vec![l.modulation_state(), l.expectation()],
        }
    }
}

impl CorticalLayer for Layer {
    fn id(&self) -> LayerId {
        dispatch!(self, l => l.id())
    }

    fn size(&self) -> usize {
        dispatch!(self, l => l.size())
    }

    fn activation(&self) -> &Pattern {
        dispatch!(self, l => l.activation())
    }

    fn process_bottom_up(&mut self, input: &Pattern) -> ColumnResult<Pattern> {
        dispatch!(self, l => l.process_bottom_up(input))
    }

    fn process_top_down(&mut self, expectation: &Pattern) -> ColumnResult<Pattern> {
        dispatch!(self, l => l.process_top_down(expectation))
    }

    fn process_lateral(&mut self, lateral: &Pattern) -> ColumnResult<Pattern> {
        dispatch!(self, l => l.process_lateral(lateral))
    }

    fn reset(&mut self) {
        dispatch!(self, l => l.reset())
    }

    fn add_listener(&mut self, listener: Arc<dyn ActivationListener>) -> ListenerHandle {
        dispatch!(self, l => l.add_listener(listener))
    }

    fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        dispatch!(self, l => l.remove_listener(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{
        Layer1Parameters, Layer23Parameters, Layer4Parameters, Layer5Parameters, Layer6Parameters,
    };

    fn all_layers(size: usize) -> Vec<Layer> {
        vec![
            LayerParameters::Layer1(Layer1Parameters::builder(size).build().unwrap()),
            LayerParameters::Layer23(Layer23Parameters::builder(size).build().unwrap()),
            LayerParameters::Layer4(Layer4Parameters::builder(size).build().unwrap()),
            LayerParameters::Layer5(Layer5Parameters::builder(size).build().unwrap()),
            LayerParameters::Layer6(Layer6Parameters::builder(size).build().unwrap()),
        ]
        .into_iter()
        .map(|p| Layer::from_parameters(p).unwrap())
        .collect()
    }

    #[test]
    fn test_reset_clears_every_layer() {
        let size = 6;
        let input = Pattern::from_fn(size, |i| 0.2 + 0.1 * i as f64);
        for mut layer in all_layers(size) {
            layer.process_top_down(&input).unwrap();
            layer.process_bottom_up(&input).unwrap();
            layer.process_bottom_up(&input).unwrap();
            layer.reset();
            assert!(layer.activation().is_zero(), "{} activation", layer.id());
            for field in layer.persistent_state() {
                assert!(field.is_zero(), "{} persistent field", layer.id());
            }
        }
    }

    #[test]
    fn test_dimension_mismatch_leaves_state_untouched() {
        let size = 4;
        let input = Pattern::filled(size, 0.6);
        let wrong = Pattern::filled(size + 1, 0.6);
        for mut layer in all_layers(size) {
            layer.process_bottom_up(&input).unwrap();
            let before = layer.activation().clone();
            assert!(layer.process_bottom_up(&wrong).is_err());
            assert!(layer.process_top_down(&wrong).is_err());
            assert!(layer.process_lateral(&wrong).is_err());
            assert_eq!(layer.activation(), &before, "{}", layer.id());
        }
    }

    #[test]
    fn test_activations_stay_within_bounds() {
        let size = 8;
        let input = Pattern::from_fn(size, |i| if i % 2 == 0 { 5.0 } else { -3.0 });
        for mut layer in all_layers(size) {
            for _ in 0..5 {
                layer.process_top_down(&input).unwrap();
                layer.process_bottom_up(&input).unwrap();
                layer.process_lateral(&input).unwrap();
            }
            assert!(
                layer.activation().iter().all(|&v| (0.0..=1.0).contains(&v)),
                "{} out of bounds: {:?}",
                layer.id(),
                layer.activation()
            );
        }
    }

    #[test]
    fn test_listener_sees_every_mutation() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut layer = all_layers(3).remove(2);
        let handle = layer.add_listener(Arc::new(
            move |id: LayerId, old: &Pattern, new: &Pattern| {
                assert_eq!(id, LayerId::Layer4);
                assert_eq!(old.len(), new.len());
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        layer.process_bottom_up(&Pattern::filled(3, 0.5)).unwrap();
        layer.reset();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(layer.remove_listener(handle));
        layer.process_bottom_up(&Pattern::filled(3, 0.5)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
