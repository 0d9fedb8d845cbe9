//! Pair scoring strategies resolved once per engine run

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{DecomposableMeasure, Measure};
use crate::TokenId;
use crate::structures::IndexedVector;

/// Scores a pair of identified vectors.
///
/// Implementations are immutable once built and shared by reference across
/// the comparison loop.
pub trait PairScorer: Send + Sync {
    fn score(&self, a: &IndexedVector, b: &IndexedVector) -> f64;
}

/// Calls the measure directly for every pair
pub struct DirectScorer {
    measure: Arc<dyn Measure>,
}

impl DirectScorer {
    pub fn new(measure: Arc<dyn Measure>) -> Self {
        Self { measure }
    }
}

impl PairScorer for DirectScorer {
    #[inline]
    fn score(&self, a: &IndexedVector, b: &IndexedVector) -> f64 {
        self.measure.similarity(a.value(), b.value())
    }
}

/// Uses precomputed `left` terms for A and `right` terms for B, keyed by
/// vector id.
///
/// An id missing from a map has its term computed on the spot.
pub struct DecomposedScorer {
    measure: Arc<dyn DecomposableMeasure>,
    left: FxHashMap<TokenId, f64>,
    right: FxHashMap<TokenId, f64>,
}

impl DecomposedScorer {
    pub fn new(
        measure: Arc<dyn DecomposableMeasure>,
        left: FxHashMap<TokenId, f64>,
        right: FxHashMap<TokenId, f64>,
    ) -> Self {
        Self {
            measure,
            left,
            right,
        }
    }

    pub fn precomputed(&self) -> (usize, usize) {
        (self.left.len(), self.right.len())
    }
}

impl PairScorer for DecomposedScorer {
    #[inline]
    fn score(&self, a: &IndexedVector, b: &IndexedVector) -> f64 {
        let left = match self.left.get(&a.key()) {
            Some(&l) => l,
            None => self.measure.left(a.value()),
        };
        let right = match self.right.get(&b.key()) {
            Some(&r) => r,
            None => self.measure.right(b.value()),
        };
        let shared = self.measure.shared(a.value(), b.value());
        self.measure.combine(shared, left, right)
    }
}
