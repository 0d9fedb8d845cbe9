//! Set-overlap measures generalised to weighted vectors
//!
//! All three share the min-intersection `Σ min(a_k, b_k)` over keys present in
//! both vectors and the L1 mass (`sum`) of each operand.

use super::{DecomposableMeasure, Measure};
use crate::structures::SparseVector;

#[inline]
fn min_intersection(a: &SparseVector, b: &SparseVector) -> f64 {
    a.shared_entries(b).map(|(x, y)| x.min(y)).sum()
}

/// Weighted Jaccard (Tanimoto) index: `Σmin / (|a| + |b| - Σmin)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Jaccard;

impl Measure for Jaccard {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.combine(self.shared(a, b), self.left(a), self.right(b))
    }

    fn name(&self) -> String {
        "Jaccard".to_string()
    }
}

impl DecomposableMeasure for Jaccard {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        min_intersection(a, b)
    }

    fn left(&self, a: &SparseVector) -> f64 {
        a.sum()
    }

    fn right(&self, b: &SparseVector) -> f64 {
        b.sum()
    }

    fn combine(&self, shared: f64, left: f64, right: f64) -> f64 {
        if shared == 0.0 {
            0.0
        } else {
            shared / (left + right - shared)
        }
    }
}

/// Weighted Dice coefficient: `2·Σmin / (|a| + |b|)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Dice;

impl Measure for Dice {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.combine(self.shared(a, b), self.left(a), self.right(b))
    }

    fn name(&self) -> String {
        "Dice".to_string()
    }
}

impl DecomposableMeasure for Dice {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        min_intersection(a, b)
    }

    fn left(&self, a: &SparseVector) -> f64 {
        a.sum()
    }

    fn right(&self, b: &SparseVector) -> f64 {
        b.sum()
    }

    fn combine(&self, shared: f64, left: f64, right: f64) -> f64 {
        if shared == 0.0 {
            0.0
        } else {
            2.0 * shared / (left + right)
        }
    }
}

/// Overlap coefficient: `Σmin / min(|a|, |b|)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Overlap;

impl Measure for Overlap {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.combine(self.shared(a, b), self.left(a), self.right(b))
    }

    fn name(&self) -> String {
        "Overlap".to_string()
    }
}

impl DecomposableMeasure for Overlap {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        min_intersection(a, b)
    }

    fn left(&self, a: &SparseVector) -> f64 {
        a.sum()
    }

    fn right(&self, b: &SparseVector) -> f64 {
        b.sum()
    }

    fn combine(&self, shared: f64, left: f64, right: f64) -> f64 {
        if shared == 0.0 {
            0.0
        } else {
            shared / left.min(right)
        }
    }
}
