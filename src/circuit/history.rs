//! Fixed-capacity record of per-stage activations.

use super::PipelineStage;
use crate::core::{LayerId, Pattern};
use serde::Serialize;
use std::collections::VecDeque;

/// Activation of one layer right after a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationSnapshot {
    /// Number of `process` calls since construction or the last reset.
    pub step: u64,
    pub stage: PipelineStage,
    pub layer: LayerId,
    pub activation: Pattern,
}

/// Ring buffer of snapshots; the oldest entry is evicted when full.
///
/// Snapshots are appended in canonical pipeline order, Layer1 before
/// Layer6 for the forked stage, whatever order the workers finished in.
#[derive(Debug, Clone)]
pub struct ActivationHistory {
    capacity: usize,
    snapshots: VecDeque<ActivationSnapshot>,
}

impl ActivationHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn push(&mut self, snapshot: ActivationSnapshot) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ActivationSnapshot> + '_ {
        self.snapshots.iter()
    }

    /// Most recent snapshot of `layer`.
    pub fn latest(&self, layer: LayerId) -> Option<&ActivationSnapshot> {
        self.snapshots.iter().rev().find(|s| s.layer == layer)
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
