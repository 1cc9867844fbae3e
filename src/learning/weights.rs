//! Dense bounded weight matrices.

use crate::core::{ensure_dim, ColumnResult, Pattern};
use crate::kernels;
use crate::params::Check;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

/// Projection from a pre-synaptic layer onto a post-synaptic one.
///
/// Rows index post-synaptic units and columns pre-synaptic units. Every
/// weight stays within `[min, max]`; the matrix only changes through a
/// [`super::LearningRule`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    pub(crate) weights: Array2<f64>,
    pub(crate) min: f64,
    pub(crate) max: f64,
}

impl WeightMatrix {
    /// Square identity projection, clipped to the bounds.
    ///
    /// # Errors
    /// `InvalidParameter` if `size` is zero or `min > max`.
    pub fn identity(size: usize, min: f64, max: f64) -> ColumnResult<Self> {
        Self::check(size, size, min, max)?;
        let weights = Array2::eye(size).mapv(|w: f64| kernels::saturate(w, min, max));
        Ok(Self { weights, min, max })
    }

    /// Weights drawn uniformly from `[min, max]`.
    ///
    /// # Errors
    /// `InvalidParameter` if a dimension is zero or `min > max`.
    pub fn random<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        min: f64,
        max: f64,
        rng: &mut R,
    ) -> ColumnResult<Self> {
        Self::check(rows, cols, min, max)?;
        let weights = Array2::random_using((rows, cols), Uniform::new_inclusive(min, max), rng);
        Ok(Self { weights, min, max })
    }

    fn check(rows: usize, cols: usize, min: f64, max: f64) -> ColumnResult<()> {
        let check = Check::new("weights");
        check.size(rows)?;
        check.size(cols)?;
        check.bounds(min, max)
    }

    pub fn rows(&self) -> usize {
        self.weights.nrows()
    }

    pub fn cols(&self) -> usize {
        self.weights.ncols()
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.weights.get((row, col)).copied()
    }

    /// True when every weight lies within the bounds.
    pub fn is_bounded(&self) -> bool {
        self.weights.iter().all(|&w| w >= self.min && w <= self.max)
    }

    /// Project a pre-synaptic pattern: `W · pre`.
    ///
    /// # Errors
    /// `DimensionMismatch` if `pre` does not match the column count.
    pub fn apply(&self, pre: &Pattern) -> ColumnResult<Pattern> {
        ensure_dim("weight projection", self.cols(), pre.len())?;
        Ok(Pattern::from_array(self.weights.dot(pre.as_array())))
    }
}
