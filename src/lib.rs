//! # Laminar
//!
//! A six-layer laminar cortical column built from shunting dynamics.
//!
//! ## Overview
//!
//! An input pattern climbs through Layer4 and Layer2/3, is matched against
//! top-down expectations in Layer6 while Layer1 builds slow attentional
//! priming, then descends again before Layer5 selects the output. Three
//! properties hold throughout:
//!
//! - **ART matching rule**: Layer6 output is exactly zero wherever the
//!   bottom-up input does not exceed the floor, however strong the
//!   expectation.
//! - **Dispatch equivalence**: forking Layer1 and Layer6 onto worker threads
//!   gives the same Layer5 output as running them one after the other.
//! - **Batch equivalence**: the vectorized batch engine matches per-pattern
//!   sequential processing.
//!
//! ## Structure
//!
//! - [`core`] — Patterns, the shunting integrator, errors
//! - [`kernels`] — Scalar arithmetic shared by the layers and the batch engine
//! - [`params`] — Validating builders for every layer and the circuit
//! - [`layers`] — The five layers behind the [`CorticalLayer`] capability
//! - [`learning`] — Bounded weight matrices and Hebbian learning
//! - [`circuit`] — The pipeline orchestrator with its fork/join stage
//! - [`batch`] — Dimension-major batch processing

pub mod batch;
pub mod circuit;
pub mod core;
pub mod kernels;
pub mod layers;
pub mod learning;
pub mod params;

pub use batch::{BatchProcessor, DimensionMajor};
pub use circuit::{
    ActivationHistory, ActivationSnapshot, CircuitOrchestrator, CircuitOutput, DecayingChunker,
    LatestFrameChunker, PipelineStage, TemporalChunker,
};
pub use crate::core::{
    ColumnError, ColumnResult, LayerId, Pattern, ShuntingIntegrator, ShuntingParameters,
};
pub use layers::{
    ActivationListener, CorticalLayer, Layer, Layer1, Layer23, Layer4, Layer5, Layer6,
    ListenerHandle, MatchSummary,
};
pub use learning::{
    HebbianDecayRule, LearningLog, LearningRecord, LearningRule, LearningStatisticsSink,
    ResonanceState, WeightMatrix,
};
pub use params::{
    CircuitConfig, DispatchMode, Layer1Parameters, Layer23Parameters, Layer4Parameters,
    Layer5Parameters, Layer6Parameters, LayerParameters,
};
