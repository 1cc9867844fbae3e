//! Fixed-dimension real vectors exchanged between layers.

use super::{ensure_dim, ColumnResult};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// An immutable activation vector.
///
/// Consumers receive patterns by reference or by clone; no layer mutates a
/// pattern it did not create. Serializes as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct Pattern {
    values: Array1<f64>,
}

impl Pattern {
    /// Create a pattern from owned values.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values: Array1::from(values),
        }
    }

    /// All-zero pattern of dimension `len`.
    pub fn zeros(len: usize) -> Self {
        Self {
            values: Array1::zeros(len),
        }
    }

    /// Pattern of dimension `len` with every component set to `value`.
    pub fn filled(len: usize, value: f64) -> Self {
        Self {
            values: Array1::from_elem(len, value),
        }
    }

    /// Wrap an ndarray vector.
    pub fn from_array(values: Array1<f64>) -> Self {
        Self { values }
    }

    /// Build a pattern by evaluating `f` at every index.
    pub fn from_fn(len: usize, f: impl FnMut(usize) -> f64) -> Self {
        Self {
            values: Array1::from_shape_fn(len, f),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the underlying vector.
    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn into_array(self) -> Array1<f64> {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> + '_ {
        self.values.iter()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    pub fn sum(&self) -> f64 {
        self.values.sum()
    }

    /// Mean component value, zero for an empty pattern.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.sum() / self.values.len() as f64
        }
    }

    /// Largest component, `None` for an empty pattern.
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// True when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Apply `f` to every component, producing a new pattern.
    pub fn map(&self, f: impl FnMut(&f64) -> f64) -> Self {
        Self {
            values: self.values.map(f),
        }
    }

    /// Clamp every component into `[floor, ceiling]`.
    pub fn clamped(&self, floor: f64, ceiling: f64) -> Self {
        self.map(|&v| crate::kernels::saturate(v, floor, ceiling))
    }

    /// Largest elementwise absolute difference.
    ///
    /// # Errors
    /// `DimensionMismatch` if the patterns differ in length.
    pub fn max_abs_diff(&self, other: &Pattern) -> ColumnResult<f64> {
        ensure_dim("pattern comparison", self.len(), other.len())?;
        Ok(self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }

    /// Validate this pattern's dimension against a declared size.
    pub fn ensure_len(&self, context: &'static str, expected: usize) -> ColumnResult<()> {
        ensure_dim(context, expected, self.len())
    }
}

impl Index<usize> for Pattern {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl From<Vec<f64>> for Pattern {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl From<Array1<f64>> for Pattern {
    fn from(values: Array1<f64>) -> Self {
        Self::from_array(values)
    }
}

impl From<Pattern> for Vec<f64> {
    fn from(pattern: Pattern) -> Self {
        pattern.values.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_construction() {
        let p = Pattern::new(vec![0.1, 0.2, 0.3]);
        assert_eq!(p.len(), 3);
        assert!((p.sum() - 0.6).abs() < 1e-12);
        assert_eq!(p[1], 0.2);
        assert!(Pattern::zeros(4).is_zero());
        assert_eq!(Pattern::filled(2, 0.5).to_vec(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_max_abs_diff() {
        let a = Pattern::new(vec![0.0, 1.0, 0.5]);
        let b = Pattern::new(vec![0.1, 0.7, 0.5]);
        let diff = a.max_abs_diff(&b).unwrap();
        assert!((diff - 0.3).abs() < 1e-12);
        assert!(a.max_abs_diff(&Pattern::zeros(2)).is_err());
    }

    #[test]
    fn test_clamped() {
        let p = Pattern::new(vec![-0.5, 0.5, 1.5]);
        assert_eq!(p.clamped(0.0, 1.0).to_vec(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let p = Pattern::new(vec![0.25, 0.5]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "[0.25,0.5]");
        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
