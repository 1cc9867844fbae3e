//! Adapters turning a raw frame sequence into one chunked input pattern.

use crate::core::{ColumnError, ColumnResult, Pattern};
use crate::params::Check;

/// Produces the circuit's entry pattern from a sequence of input frames.
pub trait TemporalChunker {
    /// # Errors
    /// `EmptyBatch` when `frames` is empty, `DimensionMismatch` when the
    /// frames disagree in length.
    fn chunk(&mut self, frames: &[Pattern]) -> ColumnResult<Pattern>;

    /// Forget any working-memory state.
    fn reset(&mut self) {}
}

fn ensure_frames(frames: &[Pattern]) -> ColumnResult<usize> {
    let first = frames.first().ok_or(ColumnError::EmptyBatch)?;
    for frame in frames {
        frame.ensure_len("chunker frame", first.len())?;
    }
    Ok(first.len())
}

/// Passes the most recent frame through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestFrameChunker;

impl TemporalChunker for LatestFrameChunker {
    fn chunk(&mut self, frames: &[Pattern]) -> ColumnResult<Pattern> {
        ensure_frames(frames)?;
        frames.last().cloned().ok_or(ColumnError::EmptyBatch)
    }
}

/// Exponentially weighted working memory over all frames seen so far.
///
/// Each frame updates `m ← retention·m + (1 − retention)·frame`; the
/// memory persists across calls until [`TemporalChunker::reset`].
#[derive(Debug, Clone)]
pub struct DecayingChunker {
    retention: f64,
    memory: Option<Pattern>,
}

impl DecayingChunker {
    /// # Errors
    /// `InvalidParameter` if `retention` lies outside `[0, 1)`.
    pub fn new(retention: f64) -> ColumnResult<Self> {
        let check = Check::new("chunker");
        check.unit("retention", retention)?;
        if retention >= 1.0 {
            return Err(ColumnError::InvalidParameter {
                layer: "chunker",
                name: "retention",
                reason: "must be below 1 so new frames register".to_string(),
            });
        }
        Ok(Self {
            retention,
            memory: None,
        })
    }

    pub fn memory(&self) -> Option<&Pattern> {
        self.memory.as_ref()
    }
}

impl TemporalChunker for DecayingChunker {
    fn chunk(&mut self, frames: &[Pattern]) -> ColumnResult<Pattern> {
        let len = ensure_frames(frames)?;
        let mut memory = match self.memory.take() {
            Some(m) if m.len() == len => m,
            _ => Pattern::zeros(len),
        };
        for frame in frames {
            memory = Pattern::from_fn(len, |i| {
                self.retention * memory[i] + (1.0 - self.retention) * frame[i]
            });
        }
        self.memory = Some(memory.clone());
        Ok(memory)
    }

    fn reset(&mut self) {
        self.memory = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_frame() {
        let frames = vec![Pattern::filled(2, 0.1), Pattern::filled(2, 0.9)];
        let chunk = LatestFrameChunker.chunk(&frames).unwrap();
        assert_eq!(chunk, Pattern::filled(2, 0.9));
    }

    #[test]
    fn test_empty_and_ragged_frames_rejected() {
        assert_eq!(LatestFrameChunker.chunk(&[]), Err(ColumnError::EmptyBatch));
        let ragged = vec![Pattern::zeros(2), Pattern::zeros(3)];
        assert!(LatestFrameChunker.chunk(&ragged).is_err());
    }

    #[test]
    fn test_decaying_memory_blends_frames() {
        let mut chunker = DecayingChunker::new(0.5).unwrap();
        let chunk = chunker
            .chunk(&[Pattern::filled(1, 1.0), Pattern::filled(1, 0.0)])
            .unwrap();
        // 0.5·(0.5·0 + 0.5·1) + 0.5·0
        assert!((chunk[0] - 0.25).abs() < 1e-12);

        let next = chunker.chunk(&[Pattern::filled(1, 1.0)]).unwrap();
        assert!((next[0] - 0.625).abs() < 1e-12);

        chunker.reset();
        assert!(chunker.memory().is_none());
    }

    #[test]
    fn test_full_retention_rejected() {
        assert!(DecayingChunker::new(1.0).is_err());
        assert!(DecayingChunker::new(-0.1).is_err());
    }
}
