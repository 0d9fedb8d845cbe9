//! Inner-product measures

use super::{DecomposableMeasure, Measure};
use crate::structures::SparseVector;

#[inline]
fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    a.shared_entries(b).map(|(x, y)| x * y).sum()
}

/// Cosine of the angle between two vectors; 0 if either has zero norm
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl Measure for Cosine {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.combine(self.shared(a, b), self.left(a), self.right(b))
    }

    fn name(&self) -> String {
        "Cosine".to_string()
    }
}

impl DecomposableMeasure for Cosine {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        dot(a, b)
    }

    fn left(&self, a: &SparseVector) -> f64 {
        a.magnitude()
    }

    fn right(&self, b: &SparseVector) -> f64 {
        b.magnitude()
    }

    fn combine(&self, shared: f64, left: f64, right: f64) -> f64 {
        let norm = left * right;
        if norm == 0.0 { 0.0 } else { shared / norm }
    }
}

/// Unnormalised dot product
#[derive(Debug, Clone, Copy, Default)]
pub struct DotProduct;

impl Measure for DotProduct {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        dot(a, b)
    }

    fn name(&self) -> String {
        "DotProduct".to_string()
    }
}

impl DecomposableMeasure for DotProduct {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        dot(a, b)
    }

    fn left(&self, _a: &SparseVector) -> f64 {
        0.0
    }

    fn right(&self, _b: &SparseVector) -> f64 {
        0.0
    }

    fn combine(&self, shared: f64, _left: f64, _right: f64) -> f64 {
        shared
    }
}
