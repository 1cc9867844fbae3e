//! The canonical laminar pipeline.
//!
//! ## Pipeline
//!
//! ```text
//! Temporal → L4 → L2/3 → {L1 ∥ L6} → L2/3(top-down, L6) → L4(top-down)
//!          → L2/3(top-down, L1 priming) → L5
//! ```
//!
//! Layer1 and Layer6 both read only the Layer2/3 output and write disjoint
//! state, so the orchestrator forks them onto its worker pool and joins
//! both before the top-down stages. A failed or panicking task fails the
//! whole `process` call. Sequential dispatch runs the same two calls on
//! the calling thread and produces identical results.

mod chunker;
mod history;

pub use chunker::{DecayingChunker, LatestFrameChunker, TemporalChunker};
pub use history::{ActivationHistory, ActivationSnapshot};

use crate::core::{ColumnError, ColumnResult, LayerId, Pattern};
use crate::layers::{
    ActivationListener, CorticalLayer, Layer1, Layer23, Layer4, Layer5, Layer6, ListenerHandle,
};
use crate::learning::{
    HebbianDecayRule, LearningRecord, LearningRule, LearningStatisticsSink, ResonanceState,
    WeightMatrix,
};
use crate::params::{Check, CircuitConfig, DispatchMode};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Stages of one `process` call, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineStage {
    Temporal,
    Layer4BottomUp,
    Layer23BottomUp,
    /// Forked Layer1 and Layer6 bottom-up processing.
    Layer1AndLayer6,
    Layer23TopDownFromLayer6,
    Layer4TopDown,
    Layer23TopDownPriming,
    Layer5Output,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 8] = [
        PipelineStage::Temporal,
        PipelineStage::Layer4BottomUp,
        PipelineStage::Layer23BottomUp,
        PipelineStage::Layer1AndLayer6,
        PipelineStage::Layer23TopDownFromLayer6,
        PipelineStage::Layer4TopDown,
        PipelineStage::Layer23TopDownPriming,
        PipelineStage::Layer5Output,
    ];

    /// The stage that follows, `None` after Layer5.
    pub fn next(self) -> Option<PipelineStage> {
        let idx = Self::ALL.iter().position(|&s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }
}

/// Result of one pass through the column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitOutput {
    pub step: u64,
    /// Layer5 activation.
    pub output: Pattern,
    pub category_formed: bool,
    pub winning_category: Option<usize>,
    pub resonance: ResonanceState,
}

/// Owns the five layers and drives them through the pipeline.
pub struct CircuitOrchestrator {
    config: CircuitConfig,
    layer1: Layer1,
    layer23: Layer23,
    layer4: Layer4,
    layer5: Layer5,
    layer6: Layer6,
    pathway: WeightMatrix,
    rule: Box<dyn LearningRule>,
    sink: Option<Box<dyn LearningStatisticsSink>>,
    pool: Option<ThreadPool>,
    history: Option<ActivationHistory>,
    stage: PipelineStage,
    step: u64,
    resonance: ResonanceState,
}

impl fmt::Debug for CircuitOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitOrchestrator")
            .field("size", &self.size())
            .field("dispatch", &self.config.dispatch)
            .field("step", &self.step)
            .field("resonance", &self.resonance)
            .finish()
    }
}

impl CircuitOrchestrator {
    /// Build a column from a validated configuration.
    ///
    /// The Layer4→Layer2/3 pathway starts as the identity projection and
    /// the learning rule as [`HebbianDecayRule`] with the configured decay.
    ///
    /// # Errors
    /// `InvalidParameter` if the configuration fails validation;
    /// `ThreadPool` if parallel dispatch is requested and the worker pool
    /// cannot be started.
    pub fn new(config: CircuitConfig) -> ColumnResult<Self> {
        config.validate()?;
        let size = config.size();

        let pool = match config.dispatch {
            DispatchMode::Parallel => Some(
                ThreadPoolBuilder::new()
                    .num_threads(config.workers)
                    .thread_name(|i| format!("laminar-fork-{i}"))
                    .build()
                    .map_err(|e| ColumnError::ThreadPool(e.to_string()))?,
            ),
            DispatchMode::Sequential => None,
        };
        tracing::debug!(size, dispatch = ?config.dispatch, workers = config.workers, "building column");

        Ok(Self {
            layer1: Layer1::new(config.layer1.clone()),
            layer23: Layer23::new(config.layer23.clone()),
            layer4: Layer4::new(config.layer4.clone()),
            layer5: Layer5::new(config.layer5.clone()),
            layer6: Layer6::new(config.layer6.clone()),
            pathway: WeightMatrix::identity(size, config.weight_min, config.weight_max)?,
            rule: Box::new(HebbianDecayRule::new(config.weight_decay)?),
            sink: None,
            pool,
            history: config.history_capacity.map(ActivationHistory::new),
            stage: PipelineStage::Temporal,
            step: 0,
            resonance: ResonanceState::Quiescent,
            config,
        })
    }

    /// Replace the Layer4→Layer2/3 pathway.
    ///
    /// # Errors
    /// `DimensionMismatch` if the matrix is not `size × size`.
    pub fn with_pathway(mut self, pathway: WeightMatrix) -> ColumnResult<Self> {
        let size = self.size();
        crate::core::ensure_dim("pathway rows", size, pathway.rows())?;
        crate::core::ensure_dim("pathway columns", size, pathway.cols())?;
        self.pathway = pathway;
        Ok(self)
    }

    pub fn with_learning_rule(mut self, rule: Box<dyn LearningRule>) -> Self {
        self.rule = rule;
        self
    }

    /// Route every [`LearningRecord`] to `sink`.
    pub fn set_statistics_sink(&mut self, sink: Box<dyn LearningStatisticsSink>) {
        self.sink = Some(sink);
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    pub fn size(&self) -> usize {
        self.config.size()
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Last stage completed by the most recent `process` call.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Resonance reported by Layer6 on the most recent step.
    pub fn resonance(&self) -> ResonanceState {
        self.resonance
    }

    pub fn pathway(&self) -> &WeightMatrix {
        &self.pathway
    }

    pub fn history(&self) -> Option<&ActivationHistory> {
        self.history.as_ref()
    }

    pub fn layer(&self, id: LayerId) -> &dyn CorticalLayer {
        match id {
            LayerId::Layer1 => &self.layer1,
            LayerId::Layer23 => &self.layer23,
            LayerId::Layer4 => &self.layer4,
            LayerId::Layer5 => &self.layer5,
            LayerId::Layer6 => &self.layer6,
        }
    }

    fn layer_mut(&mut self, id: LayerId) -> &mut dyn CorticalLayer {
        match id {
            LayerId::Layer1 => &mut self.layer1,
            LayerId::Layer23 => &mut self.layer23,
            LayerId::Layer4 => &mut self.layer4,
            LayerId::Layer5 => &mut self.layer5,
            LayerId::Layer6 => &mut self.layer6,
        }
    }

    pub fn layer1(&self) -> &Layer1 {
        &self.layer1
    }

    pub fn layer23(&self) -> &Layer23 {
        &self.layer23
    }

    pub fn layer4(&self) -> &Layer4 {
        &self.layer4
    }

    pub fn layer5(&self) -> &Layer5 {
        &self.layer5
    }

    pub fn layer6(&self) -> &Layer6 {
        &self.layer6
    }

    pub fn add_listener(
        &mut self,
        layer: LayerId,
        listener: Arc<dyn ActivationListener>,
    ) -> ListenerHandle {
        self.layer_mut(layer).add_listener(listener)
    }

    pub fn remove_listener(&mut self, layer: LayerId, handle: ListenerHandle) -> bool {
        self.layer_mut(layer).remove_listener(handle)
    }

    /// Cache a top-down expectation in Layer6 for the next modulatory stage.
    ///
    /// # Errors
    /// `DimensionMismatch` if the expectation differs from the column size.
    pub fn set_expectation(&mut self, expectation: &Pattern) -> ColumnResult<()> {
        self.layer6.process_top_down(expectation)?;
        tracing::debug!(sum = expectation.sum(), "expectation set");
        Ok(())
    }

    /// Chunk `frames` and process the result.
    ///
    /// # Errors
    /// Chunking errors, then any error of [`Self::process`].
    pub fn process_signal<C>(&mut self, chunker: &mut C, frames: &[Pattern]) -> ColumnResult<CircuitOutput>
    where
        C: TemporalChunker + ?Sized,
    {
        let chunk = chunker.chunk(frames)?;
        self.process(&chunk)
    }

    /// Run one chunked input through the full pipeline.
    ///
    /// # Errors
    /// `DimensionMismatch` if `input` differs from the column size;
    /// `ParallelStage` if a Layer1/Layer6 task panics. Errors from either
    /// forked task propagate, Layer1's first.
    pub fn process(&mut self, input: &Pattern) -> ColumnResult<CircuitOutput> {
        input.ensure_len("circuit input", self.size())?;
        self.step += 1;
        self.stage = PipelineStage::Temporal;
        tracing::debug!(step = self.step, "processing input");

        let l4 = self.run(PipelineStage::Layer4BottomUp, LayerId::Layer4, |c| {
            c.layer4.process_bottom_up(input)
        })?;
        let projected = self.project(&l4)?;
        let l23 = self.run(PipelineStage::Layer23BottomUp, LayerId::Layer23, |c| {
            c.layer23.process_bottom_up(&projected)
        })?;

        let (_, l6) = self.modulatory_stage(&l23)?;

        self.run(PipelineStage::Layer23TopDownFromLayer6, LayerId::Layer23, |c| {
            c.layer23.process_top_down(&l6)
        })?;
        let refreshed = self.run(PipelineStage::Layer4TopDown, LayerId::Layer4, |c| {
            c.layer4.process_top_down(&l6)
        })?;
        let direct = self.project(&refreshed)?;
        let primed = self.run(PipelineStage::Layer23TopDownPriming, LayerId::Layer23, |c| {
            let priming = c.layer1.priming_effect().clone();
            c.layer23.apply_priming(&priming, &direct)
        })?;
        let output = self.run(PipelineStage::Layer5Output, LayerId::Layer5, |c| {
            c.layer5.process_bottom_up(&primed)
        })?;

        self.resonance =
            ResonanceState::classify(&self.layer6.last_match(), self.config.resonance_threshold);
        let result = CircuitOutput {
            step: self.step,
            category_formed: self.layer5.category_formed(),
            winning_category: self.layer5.winning_category(),
            resonance: self.resonance,
            output,
        };
        tracing::debug!(
            step = self.step,
            resonance = ?result.resonance,
            category = ?result.winning_category,
            "column settled"
        );
        Ok(result)
    }

    fn project(&self, layer4: &Pattern) -> ColumnResult<Pattern> {
        Ok(self.pathway.apply(layer4)?.clamped(0.0, 1.0))
    }

    fn run<F>(&mut self, stage: PipelineStage, layer: LayerId, f: F) -> ColumnResult<Pattern>
    where
        F: FnOnce(&mut Self) -> ColumnResult<Pattern>,
    {
        debug_assert_eq!(self.stage.next(), Some(stage));
        let out = f(self)?;
        self.complete(stage, &[(layer, &out)]);
        Ok(out)
    }

    fn complete(&mut self, stage: PipelineStage, outputs: &[(LayerId, &Pattern)]) {
        self.stage = stage;
        tracing::debug!(?stage, "stage complete");
        if let Some(history) = self.history.as_mut() {
            for (layer, activation) in outputs {
                history.push(ActivationSnapshot {
                    step: self.step,
                    stage,
                    layer: *layer,
                    activation: (*activation).clone(),
                });
            }
        }
    }

    /// Layer1 and Layer6 bottom-up on the same Layer2/3 output.
    fn modulatory_stage(&mut self, l23: &Pattern) -> ColumnResult<(Pattern, Pattern)> {
        let stage = PipelineStage::Layer1AndLayer6;
        debug_assert_eq!(self.stage.next(), Some(stage));

        let layer1 = &mut self.layer1;
        let layer6 = &mut self.layer6;
        let joined = match &self.pool {
            Some(pool) => {
                tracing::debug!(workers = pool.current_num_threads(), "forking L1 and L6");
                panic::catch_unwind(AssertUnwindSafe(|| {
                    pool.install(|| {
                        rayon::join(
                            || layer1.process_bottom_up(l23),
                            || layer6.process_bottom_up(l23),
                        )
                    })
                }))
            }
            None => panic::catch_unwind(AssertUnwindSafe(|| {
                let first = layer1.process_bottom_up(l23);
                let second = layer6.process_bottom_up(l23);
                (first, second)
            })),
        };

        let (l1, l6) = match joined {
            Ok((l1, l6)) => (l1?, l6?),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::warn!(%reason, "modulatory stage failed");
                return Err(ColumnError::ParallelStage(reason));
            }
        };
        self.complete(stage, &[(LayerId::Layer1, &l1), (LayerId::Layer6, &l6)]);
        Ok((l1, l6))
    }

    /// Apply the learning rule to the Layer4→Layer2/3 pathway.
    ///
    /// Weights only change when the last step was resonant; a record is
    /// sent to the statistics sink either way, with zero magnitude when
    /// learning was gated off.
    ///
    /// # Errors
    /// `InvalidParameter` if `rate` lies outside `[0, 1]`.
    pub fn learn(&mut self, rate: f64) -> ColumnResult<LearningRecord> {
        Check::new("learning").unit("learning_rate", rate)?;
        let magnitude = if self.resonance.is_resonant() {
            self.rule.update(
                &mut self.pathway,
                self.layer4.activation(),
                self.layer23.activation(),
                rate,
            )?
        } else {
            0.0
        };

        let record = LearningRecord {
            resonance: self.resonance,
            attention_strength: self.layer1.attention_state().mean(),
            weight_change_magnitude: magnitude,
        };
        tracing::debug!(resonance = ?record.resonance, magnitude, "learning applied");
        if let Some(sink) = self.sink.as_mut() {
            sink.record(record);
        }
        Ok(record)
    }

    /// [`Self::learn`] at the configured learning rate.
    pub fn learn_default(&mut self) -> ColumnResult<LearningRecord> {
        self.learn(self.config.learning_rate)
    }

    /// Zero every layer and clear the history. Pathway weights are kept.
    pub fn reset(&mut self) {
        self.layer1.reset();
        self.layer23.reset();
        self.layer4.reset();
        self.layer5.reset();
        self.layer6.reset();
        if let Some(history) = self.history.as_mut() {
            history.clear();
        }
        self.stage = PipelineStage::Temporal;
        self.step = 0;
        self.resonance = ResonanceState::Quiescent;
        tracing::debug!("column reset");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(size: usize, dispatch: DispatchMode) -> CircuitOrchestrator {
        let config = CircuitConfig::with_size(size)
            .unwrap()
            .with_dispatch(dispatch)
            .with_history(64);
        CircuitOrchestrator::new(config).unwrap()
    }

    fn input(size: usize) -> Pattern {
        Pattern::from_fn(size, |i| if i % 3 == 0 { 0.9 } else { 0.3 })
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(PipelineStage::Temporal.next(), Some(PipelineStage::Layer4BottomUp));
        assert_eq!(PipelineStage::Layer5Output.next(), None);
    }

    #[test]
    fn test_process_runs_every_stage() {
        let mut c = column(6, DispatchMode::Sequential);
        let out = c.process(&input(6)).unwrap();
        assert_eq!(out.step, 1);
        assert_eq!(c.stage(), PipelineStage::Layer5Output);
        assert_eq!(out.output.len(), 6);
        assert!(out.output.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_history_in_canonical_order() {
        let mut c = column(4, DispatchMode::Parallel);
        c.process(&input(4)).unwrap();
        let layers: Vec<LayerId> = c.history().unwrap().iter().map(|s| s.layer).collect();
        assert_eq!(
            layers,
            vec![
                LayerId::Layer4,
                LayerId::Layer23,
                LayerId::Layer1,
                LayerId::Layer6,
                LayerId::Layer23,
                LayerId::Layer4,
                LayerId::Layer23,
                LayerId::Layer5,
            ]
        );
    }

    #[test]
    fn test_dimension_mismatch_rejected_before_any_stage() {
        let mut c = column(4, DispatchMode::Sequential);
        assert!(c.process(&Pattern::zeros(5)).is_err());
        assert_eq!(c.step(), 0);
        assert!(c.history().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_task_fails_process() {
        let mut c = column(4, DispatchMode::Parallel);
        c.add_listener(
            LayerId::Layer6,
            Arc::new(|_: LayerId, _: &Pattern, _: &Pattern| {
                panic!("listener exploded");
            }),
        );
        let err = c.process(&input(4)).unwrap_err();
        match err {
            ColumnError::ParallelStage(reason) => assert!(reason.contains("listener exploded")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_panicking_task_fails_sequential_process() {
        let mut c = column(4, DispatchMode::Sequential);
        c.add_listener(
            LayerId::Layer1,
            Arc::new(|_: LayerId, _: &Pattern, _: &Pattern| {
                panic!("boom");
            }),
        );
        assert!(matches!(
            c.process(&input(4)),
            Err(ColumnError::ParallelStage(_))
        ));
    }

    #[test]
    fn test_learning_gated_without_resonance() {
        let mut c = column(4, DispatchMode::Sequential);
        let before = c.pathway().clone();
        c.process(&Pattern::zeros(4)).unwrap();
        assert_eq!(c.resonance(), ResonanceState::Quiescent);
        let record = c.learn(0.5).unwrap();
        assert_eq!(record.weight_change_magnitude, 0.0);
        assert_eq!(c.pathway(), &before);
    }

    #[test]
    fn test_learning_applies_when_resonant() {
        let mut c = column(4, DispatchMode::Sequential);
        let pattern = Pattern::filled(4, 0.8);
        c.set_expectation(&pattern).unwrap();
        c.process(&pattern).unwrap();
        assert_eq!(c.resonance(), ResonanceState::Resonant);
        let record = c.learn(0.5).unwrap();
        assert!(record.weight_change_magnitude > 0.0);
        assert!(c.pathway().is_bounded());
    }

    #[test]
    fn test_invalid_learning_rate() {
        let mut c = column(3, DispatchMode::Sequential);
        assert!(c.learn(1.5).is_err());
    }

    #[test]
    fn test_reset_clears_history_and_layers() {
        let mut c = column(4, DispatchMode::Parallel);
        c.process(&input(4)).unwrap();
        c.reset();
        assert_eq!(c.step(), 0);
        assert!(c.history().unwrap().is_empty());
        for id in LayerId::ALL {
            assert!(c.layer(id).activation().is_zero(), "{id}");
        }
    }

    #[test]
    fn test_process_signal_uses_chunker() {
        let mut a = column(3, DispatchMode::Sequential);
        let mut b = column(3, DispatchMode::Sequential);
        let frames = vec![Pattern::filled(3, 0.1), Pattern::filled(3, 0.7)];
        let via_signal = a.process_signal(&mut LatestFrameChunker, &frames).unwrap();
        let direct = b.process(&frames[1]).unwrap();
        assert_eq!(via_signal, direct);
    }

    #[test]
    fn test_pathway_dimension_checked() {
        let c = column(3, DispatchMode::Sequential);
        let wrong = WeightMatrix::identity(4, 0.0, 1.0).unwrap();
        assert!(c.with_pathway(wrong).is_err());
    }
}
