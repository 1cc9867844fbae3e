//! Core column primitives.
//!
//! This module provides the building blocks every layer shares:
//! - [`Pattern`]: the immutable real vector flowing between layers
//! - [`ShuntingIntegrator`]: one explicit-Euler step of the shunting ODE
//! - [`ColumnError`] / [`ColumnResult`]: the crate error surface
//! - [`LayerId`]: stable identifiers for the five laminar layers
//!
//! ## Shunting Dynamics
//!
//! Every layer settles its activation through the bounded ODE
//! ```text
//! dx/dt = -A·x + (B − x)·E − (x + C)·I
//! ```
//! whose excitatory term vanishes as `x → B` and whose inhibitory term
//! vanishes as `x → −C`, so activations saturate instead of diverging.

mod pattern;
mod shunting;

pub use pattern::Pattern;
pub use shunting::{ShuntingIntegrator, ShuntingParameters, ShuntingParametersBuilder};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for column operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColumnError {
    /// A parameter failed validation while building a configuration.
    #[error("invalid {layer} parameter `{name}`: {reason}")]
    InvalidParameter {
        layer: &'static str,
        name: &'static str,
        reason: String,
    },
    /// A pattern or matrix did not match the declared dimension.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A task of the forked Layer1/Layer6 stage failed.
    #[error("parallel stage failed: {0}")]
    ParallelStage(String),
    /// The fork/join worker pool could not be created.
    #[error("worker pool unavailable: {0}")]
    ThreadPool(String),
    /// A batch contained no patterns.
    #[error("batch must contain at least one pattern")]
    EmptyBatch,
    /// A serialized configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type ColumnResult<T> = Result<T, ColumnError>;

/// Check that `actual` matches `expected`, naming the call site on failure.
pub(crate) fn ensure_dim(context: &'static str, expected: usize, actual: usize) -> ColumnResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ColumnError::DimensionMismatch {
            context,
            expected,
            actual,
        })
    }
}

/// Identifier of a laminar layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerId {
    /// Apical dendrite layer: slow top-down priming.
    Layer1,
    /// Superficial pyramidal layers: horizontal grouping.
    Layer23,
    /// Granular input layer: thalamic drive.
    Layer4,
    /// Deep pyramidal layer: output and category selection.
    Layer5,
    /// Corticothalamic layer: modulatory feedback.
    Layer6,
}

impl LayerId {
    /// All layers in anatomical order.
    pub const ALL: [LayerId; 5] = [
        LayerId::Layer1,
        LayerId::Layer23,
        LayerId::Layer4,
        LayerId::Layer5,
        LayerId::Layer6,
    ];

    /// Short label used in logs and snapshots.
    pub fn label(self) -> &'static str {
        match self {
            LayerId::Layer1 => "L1",
            LayerId::Layer23 => "L2/3",
            LayerId::Layer4 => "L4",
            LayerId::Layer5 => "L5",
            LayerId::Layer6 => "L6",
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dim() {
        assert!(ensure_dim("test", 3, 3).is_ok());
        let err = ensure_dim("test", 3, 4).unwrap_err();
        assert_eq!(
            err,
            ColumnError::DimensionMismatch {
                context: "test",
                expected: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn test_error_display() {
        let err = ColumnError::InvalidParameter {
            layer: "layer4",
            name: "time_constant_ms",
            reason: "must lie in [10, 50], got 5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid layer4 parameter `time_constant_ms`: must lie in [10, 50], got 5"
        );
    }

    #[test]
    fn test_layer_labels_unique() {
        let mut labels: Vec<_> = LayerId::ALL.iter().map(|id| id.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 5);
    }
}
