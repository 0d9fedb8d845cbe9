//! Rank correlation over the dense form of two vectors

use super::Measure;
use super::divergence::for_each_union;
use crate::error::{Error, Result};
use crate::structures::SparseVector;

/// Kendall's tau-b between two vectors, treating each of the
/// `max(min_cardinality, |A|, |B|)` dimensions as one paired observation.
///
/// Quadratic in the number of features stored in either vector, so best kept
/// to short vectors. Returns 0 when no pair of dimensions is concordant or
/// discordant.
#[derive(Debug, Clone, Copy)]
pub struct KendallsTau {
    min_cardinality: usize,
}

impl KendallsTau {
    pub const DEFAULT_MIN_CARDINALITY: usize = 1;

    pub fn new(min_cardinality: usize) -> Result<Self> {
        if min_cardinality == 0 {
            return Err(Error::Config(
                "kendalls tau min_cardinality must be at least 1".into(),
            ));
        }
        Ok(Self { min_cardinality })
    }

    pub fn min_cardinality(&self) -> usize {
        self.min_cardinality
    }
}

impl Default for KendallsTau {
    fn default() -> Self {
        Self {
            min_cardinality: Self::DEFAULT_MIN_CARDINALITY,
        }
    }
}

/// Sign with zero mapped to zero
fn sign(x: f64) -> i64 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

impl Measure for KendallsTau {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let n = self
            .min_cardinality
            .max(a.cardinality())
            .max(b.cardinality());

        let mut union = Vec::with_capacity(a.len() + b.len());
        for_each_union(a, b, |x, y| union.push((x, y)));
        // Dimensions where both vectors are zero
        let zeros = n.saturating_sub(union.len()) as f64;

        let mut cordance = 0i64;
        let mut a_ties = 0u64;
        let mut b_ties = 0u64;
        for (i, &(ai, bi)) in union.iter().enumerate() {
            for &(aj, bj) in &union[..i] {
                a_ties += u64::from(ai == aj);
                b_ties += u64::from(bi == bj);
                cordance += sign(ai - aj) * sign(bi - bj);
            }
        }

        // Overflow-prone from here on
        let mut cordance = cordance as f64;
        let mut a_ties = a_ties as f64;
        let mut b_ties = b_ties as f64;
        for &(x, y) in &union {
            cordance += (sign(x) * sign(y)) as f64 * zeros;
            if x == 0.0 {
                a_ties += zeros;
            }
            if y == 0.0 {
                b_ties += zeros;
            }
        }
        let zero_pairs = zeros * (zeros - 1.0).max(0.0) / 2.0;
        a_ties += zero_pairs;
        b_ties += zero_pairs;

        if cordance == 0.0 {
            return 0.0;
        }
        let n = n as f64;
        let n0 = n * (n - 1.0) / 2.0;
        cordance / ((n0 - a_ties) * (n0 - b_ties)).sqrt()
    }

    fn name(&self) -> String {
        format!("KendallsTau{{min_cardinality={}}}", self.min_cardinality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_agreement_and_reversal() {
        let a = SparseVector::from_dense(&[1.0, 2.0, 3.0]);
        let b = SparseVector::from_dense(&[3.0, 2.0, 1.0]);
        let tau = KendallsTau::default();
        assert!((tau.similarity(&a, &a) - 1.0).abs() < 1e-12);
        assert!((tau.similarity(&a, &b) + 1.0).abs() < 1e-12);
        assert_eq!(tau.similarity(&a, &b), tau.similarity(&b, &a));
    }

    #[test]
    fn test_zeros_count_as_ranks() {
        // Dense (0, 1, 2, 0) against (0, 2, 1, 0): 4 concordant, 1
        // discordant, one tie on each side
        let a = SparseVector::from_dense(&[0.0, 1.0, 2.0, 0.0]);
        let b = SparseVector::from_dense(&[0.0, 2.0, 1.0, 0.0]);
        let tau = KendallsTau::default().similarity(&a, &b);
        assert!((tau - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_single_shared_feature() {
        let a = SparseVector::from_dense(&[1.0, 0.0]);
        assert!((KendallsTau::default().similarity(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_is_zero() {
        let a = SparseVector::from_dense(&[1.0, 1.0]);
        let b = SparseVector::from_dense(&[1.0, 2.0]);
        assert_eq!(KendallsTau::default().similarity(&a, &b), 0.0);
        assert!(KendallsTau::new(0).is_err());
    }
}
