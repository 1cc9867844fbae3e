//! Batched Layer4 → Layer6 front end.
//!
//! The vectorized path transposes a batch into [`DimensionMajor`] layout and
//! applies, per dimension row, exactly the scalar kernels the sequential
//! layers use ([`crate::kernels`]) in the same order. Outputs therefore
//! match a loop of fresh per-pattern [`Layer4`]/[`Layer6`] runs bit for
//! bit, whether or not rows are spread over rayon workers.
//!
//! Below `simd_threshold` patterns the transpose does not pay for itself
//! and the sequential path runs instead.

mod layout;

pub use layout::DimensionMajor;

use crate::core::{ensure_dim, ColumnError, ColumnResult, Pattern};
use crate::kernels;
use crate::layers::{CorticalLayer, Layer4, Layer6};
use crate::params::{Layer4Parameters, Layer6Parameters};
use ndarray::{Array1, Array2, ArrayViewMut1, Zip};

/// Default batch size at which the vectorized path takes over.
pub const DEFAULT_SIMD_THRESHOLD: usize = 8;

/// Runs many independent patterns through a fresh Layer4 → Layer6 front end.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    layer4: Layer4Parameters,
    layer6: Layer6Parameters,
    simd_threshold: usize,
    parallel: bool,
}

impl BatchProcessor {
    /// # Errors
    /// `InvalidParameter` if either parameter set is invalid or the two
    /// layers differ in size.
    pub fn new(layer4: Layer4Parameters, layer6: Layer6Parameters) -> ColumnResult<Self> {
        layer4.validate()?;
        layer6.validate()?;
        if layer4.size() != layer6.size() {
            return Err(ColumnError::InvalidParameter {
                layer: "batch",
                name: "size",
                reason: format!(
                    "layer4 has size {}, layer6 has size {}",
                    layer4.size(),
                    layer6.size()
                ),
            });
        }
        Ok(Self {
            layer4,
            layer6,
            simd_threshold: DEFAULT_SIMD_THRESHOLD,
            parallel: true,
        })
    }

    pub fn with_simd_threshold(mut self, threshold: usize) -> Self {
        self.simd_threshold = threshold;
        self
    }

    /// Spread dimension rows over the rayon global pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn size(&self) -> usize {
        self.layer4.size()
    }

    pub fn simd_threshold(&self) -> usize {
        self.simd_threshold
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    fn validate_batch(&self, patterns: &[Pattern], expectation: &Pattern) -> ColumnResult<()> {
        if patterns.is_empty() {
            return Err(ColumnError::EmptyBatch);
        }
        expectation.ensure_len("batch expectation", self.size())?;
        for pattern in patterns {
            pattern.ensure_len("batch pattern", self.size())?;
        }
        Ok(())
    }

    /// Process every pattern against a shared top-down `expectation`.
    ///
    /// # Errors
    /// `EmptyBatch` or `DimensionMismatch`; nothing is computed in either case.
    pub fn process(&self, patterns: &[Pattern], expectation: &Pattern) -> ColumnResult<Vec<Pattern>> {
        if patterns.len() < self.simd_threshold {
            tracing::debug!(batch = patterns.len(), "batch below threshold, sequential path");
            self.process_sequential(patterns, expectation)
        } else {
            tracing::debug!(batch = patterns.len(), parallel = self.parallel, "vectorized batch path");
            self.process_vectorized(patterns, expectation)
        }
    }

    /// Reference path: one fresh Layer4 and Layer6 per pattern.
    ///
    /// # Errors
    /// `EmptyBatch` or `DimensionMismatch`.
    pub fn process_sequential(
        &self,
        patterns: &[Pattern],
        expectation: &Pattern,
    ) -> ColumnResult<Vec<Pattern>> {
        self.validate_batch(patterns, expectation)?;
        patterns
            .iter()
            .map(|pattern| {
                let mut layer4 = Layer4::new(self.layer4.clone());
                let mut layer6 = Layer6::new(self.layer6.clone());
                let driven = layer4.process_bottom_up(pattern)?;
                layer6.modulate(&driven, expectation)
            })
            .collect()
    }

    /// Transpose-then-apply path.
    ///
    /// # Errors
    /// `EmptyBatch` or `DimensionMismatch`.
    pub fn process_vectorized(
        &self,
        patterns: &[Pattern],
        expectation: &Pattern,
    ) -> ColumnResult<Vec<Pattern>> {
        self.validate_batch(patterns, expectation)?;
        let input = DimensionMajor::from_patterns(patterns)?;
        ensure_dim("batch layout", self.size(), input.dim())?;

        let driven = self.layer4_kernel(input.as_array());
        let matched = self.layer6_kernel(&driven, expectation);
        Ok(DimensionMajor::from_array(matched).to_patterns())
    }

    /// Layer4 shunting settle from rest, all patterns at once.
    fn layer4_kernel(&self, input: &Array2<f64>) -> Array2<f64> {
        let p = &self.layer4;
        let shunting = p.shunting();
        let (dim, batch) = input.dim();
        let drive = input.mapv(|v| Layer4::drive(v, p));

        let mut x = Array2::<f64>::zeros((dim, batch));
        let mut next = Array2::<f64>::zeros((dim, batch));
        for _ in 0..p.substeps() {
            for_each_row(&mut next, self.parallel, |d, mut row| {
                for k in 0..batch {
                    let inhibition = Layer4::surround(d, dim, p, |j| x[[j, k]]);
                    row[k] = kernels::shunting_update(x[[d, k]], drive[[d, k]], inhibition, &shunting);
                }
            });
            std::mem::swap(&mut x, &mut next);
        }
        x
    }

    /// ART matching against the shared expectation with a fresh
    /// modulation state.
    fn layer6_kernel(&self, bottom_up: &Array2<f64>, expectation: &Pattern) -> Array2<f64> {
        let p = &self.layer6;
        let dim = bottom_up.nrows();
        // Identical for every pattern, so computed once per dimension.
        let modulation = Array1::from_shape_fn(dim, |d| {
            let surround = kernels::surround_sum(d, dim, p.surround_radius(), |j| expectation[j]);
            kernels::modulation_signal(expectation[d], surround, 0.0, p)
        });

        let mut out = Array2::<f64>::zeros(bottom_up.raw_dim());
        for_each_row(&mut out, self.parallel, |d, mut row| {
            for (k, slot) in row.iter_mut().enumerate() {
                *slot = kernels::art_match(bottom_up[[d, k]], modulation[d], p);
            }
        });
        out
    }
}

/// Fill `out` row by row, on rayon workers when `parallel` is set.
fn for_each_row<F>(out: &mut Array2<f64>, parallel: bool, f: F)
where
    F: Fn(usize, ArrayViewMut1<'_, f64>) + Send + Sync,
{
    if parallel {
        Zip::indexed(out.rows_mut()).par_for_each(f);
    } else {
        Zip::indexed(out.rows_mut()).for_each(f);
    }
}
