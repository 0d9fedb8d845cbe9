//! Distance and divergence measures.
//!
//! These return dissimilarities: 0 for identical inputs, growing as the
//! vectors diverge. Pair filters should bound them from above.

use super::Measure;
use crate::error::{Error, Result};
use crate::structures::SparseVector;

/// Visit every key present in either vector, passing `(a_k, b_k)` with 0 for
/// absent entries
pub(super) fn for_each_union(a: &SparseVector, b: &SparseVector, mut f: impl FnMut(f64, f64)) {
    let (ak, av) = (a.keys(), a.values());
    let (bk, bv) = (b.keys(), b.values());
    let (mut i, mut j) = (0, 0);
    while i < ak.len() && j < bk.len() {
        if ak[i] < bk[j] {
            f(av[i], 0.0);
            i += 1;
        } else if ak[i] > bk[j] {
            f(0.0, bv[j]);
            j += 1;
        } else {
            f(av[i], bv[j]);
            i += 1;
            j += 1;
        }
    }
    for &x in &av[i..] {
        f(x, 0.0);
    }
    for &y in &bv[j..] {
        f(0.0, y);
    }
}

/// Minkowski distance of order `p`
///
/// `p = 1` is Manhattan, `p = 2` Euclidean and `p = ∞` Chebyshev distance.
#[derive(Debug, Clone, Copy)]
pub struct Lp {
    power: f64,
}

impl Lp {
    pub const DEFAULT_POWER: f64 = 2.0;

    pub fn new(power: f64) -> Result<Self> {
        if power.is_nan() || power <= 0.0 {
            return Err(Error::Config(format!(
                "lp power must be positive, got {}",
                power
            )));
        }
        Ok(Self { power })
    }

    pub fn power(&self) -> f64 {
        self.power
    }
}

impl Default for Lp {
    fn default() -> Self {
        Self {
            power: Self::DEFAULT_POWER,
        }
    }
}

impl Measure for Lp {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let p = self.power;
        if p.is_infinite() {
            let mut max = 0.0f64;
            for_each_union(a, b, |x, y| max = max.max((x - y).abs()));
            return max;
        }

        let mut total = 0.0;
        if p == 1.0 {
            for_each_union(a, b, |x, y| total += (x - y).abs());
            total
        } else if p == 2.0 {
            for_each_union(a, b, |x, y| total += (x - y) * (x - y));
            total.sqrt()
        } else {
            for_each_union(a, b, |x, y| total += (x - y).abs().powf(p));
            total.powf(1.0 / p)
        }
    }

    fn name(&self) -> String {
        format!("Lp{{p={}}}", self.power)
    }
}

/// Jensen-Shannon divergence (base 2) between the L1-normalised vectors.
///
/// Bounded to `[0, 1]`; results within `EPSILON` of a bound snap to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct JensenShannon;

impl JensenShannon {
    const EPSILON: f64 = 1e-10;
}

impl Measure for JensenShannon {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let (a_sum, b_sum) = (a.sum(), b.sum());
        let mut divergence = 0.0;
        for_each_union(a, b, |x, y| {
            if x != 0.0 && y != 0.0 {
                let q = x / a_sum;
                let r = y / b_sum;
                let log_avg = (0.5 * (q + r)).log2();
                divergence += 0.5 * q * (q.log2() - log_avg) + 0.5 * r * (r.log2() - log_avg);
            } else if x != 0.0 {
                divergence += 0.5 * x / a_sum;
            } else {
                divergence += 0.5 * y / b_sum;
            }
        });

        if (divergence - 1.0).abs() < Self::EPSILON {
            1.0
        } else if divergence.abs() < Self::EPSILON {
            0.0
        } else {
            divergence
        }
    }

    fn name(&self) -> String {
        "JensenShannon".to_string()
    }
}

/// Kullback-Leibler divergence `D(A || B)` (base 2) with add-one smoothing.
///
/// Both vectors are treated as distributions over
/// `max(min_cardinality, |A|, |B|)` dimensions where every dimension gets one
/// extra count, so absent features never produce an infinite divergence.
#[derive(Debug, Clone, Copy)]
pub struct KullbackLeibler {
    min_cardinality: usize,
}

impl KullbackLeibler {
    pub const DEFAULT_MIN_CARDINALITY: usize = 1;

    pub fn new(min_cardinality: usize) -> Result<Self> {
        if min_cardinality == 0 {
            return Err(Error::Config("kl min_cardinality must be at least 1".into()));
        }
        Ok(Self { min_cardinality })
    }

    pub fn min_cardinality(&self) -> usize {
        self.min_cardinality
    }
}

impl Default for KullbackLeibler {
    fn default() -> Self {
        Self {
            min_cardinality: Self::DEFAULT_MIN_CARDINALITY,
        }
    }
}

impl Measure for KullbackLeibler {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let n = self
            .min_cardinality
            .max(a.cardinality())
            .max(b.cardinality()) as f64;
        let a_total = a.sum() + n;
        let b_total = b.sum() + n;

        // Smoothed probability of a feature absent from a vector
        let q0 = 1.0 / a_total;
        let r0 = 1.0 / b_total;
        let (log_q0, log_r0) = (q0.log2(), r0.log2());

        let mut divergence = 0.0;
        let mut union = 0usize;
        for_each_union(a, b, |x, y| {
            union += 1;
            let q = (x + 1.0) / a_total;
            let r = (y + 1.0) / b_total;
            divergence += q * (q.log2() - r.log2());
        });
        // Features absent from both vectors
        divergence += (n - union as f64) * q0 * (log_q0 - log_r0);
        divergence
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        "KullbackLeibler".to_string()
    }
}

/// Lee's alpha-skew divergence `D(B || alpha*A + (1-alpha)*B)` (base 2).
///
/// Approximates KL divergence from B to A as `alpha` approaches 1 while
/// staying finite when A lacks features of B. Alpha lies in `(0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct LeeSkew {
    alpha: f64,
}

impl LeeSkew {
    pub const DEFAULT_ALPHA: f64 = 0.99;

    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::Config(format!(
                "lee skew alpha must lie in (0, 1), got {}",
                alpha
            )));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for LeeSkew {
    fn default() -> Self {
        Self {
            alpha: Self::DEFAULT_ALPHA,
        }
    }
}

impl Measure for LeeSkew {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let (a_sum, b_sum) = (a.sum(), b.sum());
        let alpha = self.alpha;
        let mut divergence = 0.0;
        for_each_union(a, b, |x, y| {
            if y == 0.0 {
                return;
            }
            let q = if x == 0.0 { 0.0 } else { x / a_sum };
            let r = y / b_sum;
            let log_skew = (alpha * q + (1.0 - alpha) * r).log2();
            divergence += r * (r.log2() - log_skew);
        });
        divergence
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        format!("LeeSkew{{alpha={}}}", self.alpha)
    }
}

/// Lambda divergence (base 2): the lambda-weighted mean of the KL
/// divergences of each distribution from their lambda-weighted mixture.
///
/// Lambda 0.5 gives Jensen-Shannon divergence. Bounded to `[0, 1]`; results
/// within `EPSILON` of a bound snap to it.
#[derive(Debug, Clone, Copy)]
pub struct Lambda {
    lambda: f64,
}

impl Lambda {
    pub const DEFAULT_LAMBDA: f64 = 0.5;
    const EPSILON: f64 = 1e-15;

    pub fn new(lambda: f64) -> Result<Self> {
        if !(lambda > 0.0 && lambda < 1.0) {
            return Err(Error::Config(format!(
                "lambda must lie in (0, 1), got {}",
                lambda
            )));
        }
        Ok(Self { lambda })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Default for Lambda {
    fn default() -> Self {
        Self {
            lambda: Self::DEFAULT_LAMBDA,
        }
    }
}

impl Measure for Lambda {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let (a_sum, b_sum) = (a.sum(), b.sum());
        let l = self.lambda;
        let mut divergence = 0.0;
        for_each_union(a, b, |x, y| {
            if x != 0.0 && y != 0.0 {
                let q = x / a_sum;
                let r = y / b_sum;
                let log_mix = (l * q + (1.0 - l) * r).log2();
                divergence += l * q * (q.log2() - log_mix) + (1.0 - l) * r * (r.log2() - log_mix);
            } else if x != 0.0 {
                divergence -= l * (x / a_sum) * l.log2();
            } else {
                divergence -= (1.0 - l) * (y / b_sum) * (1.0 - l).log2();
            }
        });

        if (divergence - 1.0).abs() < Self::EPSILON {
            1.0
        } else if divergence.abs() < Self::EPSILON {
            0.0
        } else {
            divergence
        }
    }

    fn is_commutative(&self) -> bool {
        (self.lambda - 0.5).abs() < 1e-12
    }

    fn name(&self) -> String {
        format!("Lambda{{lambda={}}}", self.lambda)
    }
}
