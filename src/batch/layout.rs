//! Dimension-major batch layout.

use crate::core::{ColumnError, ColumnResult, Pattern};
use ndarray::{Array2, ArrayView1};

/// A batch transposed so that each row holds one dimension across all
/// patterns: `data[[d, k]]` is dimension `d` of pattern `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionMajor {
    data: Array2<f64>,
}

impl DimensionMajor {
    /// # Errors
    /// `EmptyBatch` for an empty slice, `DimensionMismatch` if the patterns
    /// disagree in length.
    pub fn from_patterns(patterns: &[Pattern]) -> ColumnResult<Self> {
        let dim = patterns.first().ok_or(ColumnError::EmptyBatch)?.len();
        for pattern in patterns {
            pattern.ensure_len("batch pattern", dim)?;
        }
        let data = Array2::from_shape_fn((dim, patterns.len()), |(d, k)| patterns[k][d]);
        Ok(Self { data })
    }

    pub(crate) fn from_array(data: Array2<f64>) -> Self {
        Self { data }
    }

    /// Pattern dimension.
    pub fn dim(&self) -> usize {
        self.data.nrows()
    }

    /// Number of patterns.
    pub fn batch_len(&self) -> usize {
        self.data.ncols()
    }

    /// One dimension across the batch.
    pub fn row(&self, d: usize) -> ArrayView1<'_, f64> {
        self.data.row(d)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    /// Back to one pattern per batch slot.
    pub fn to_patterns(&self) -> Vec<Pattern> {
        self.data
            .columns()
            .into_iter()
            .map(|column| Pattern::from_array(column.to_owned()))
            .collect()
    }
}
