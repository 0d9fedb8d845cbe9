//! Feature-inclusion measures over positive weights (Lin, Recall, Precision,
//! Weeds)
//!
//! Only features with strictly positive weight in both vectors contribute to
//! the shared term; per-vector terms are the positive mass of the operand.

use super::{DecomposableMeasure, Measure};
use crate::error::{Error, Result};
use crate::structures::SparseVector;

#[inline]
fn positive_sum(v: &SparseVector) -> f64 {
    v.values().iter().filter(|&&x| x > 0.0).sum()
}

#[inline]
fn positive_shared<'a>(
    a: &'a SparseVector,
    b: &'a SparseVector,
) -> impl Iterator<Item = (f64, f64)> + 'a {
    a.shared_entries(b).filter(|&(x, y)| x > 0.0 && y > 0.0)
}

#[inline]
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Lin's information-theoretic similarity.
///
/// Flagged non-commutative: it is normally paired with directional weightings
/// so callers may want to reverse it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lin;

impl Measure for Lin {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.combine(self.shared(a, b), self.left(a), self.right(b))
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        "Lin".to_string()
    }
}

impl DecomposableMeasure for Lin {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        positive_shared(a, b).map(|(x, y)| x + y).sum()
    }

    fn left(&self, a: &SparseVector) -> f64 {
        positive_sum(a)
    }

    fn right(&self, b: &SparseVector) -> f64 {
        positive_sum(b)
    }

    fn combine(&self, shared: f64, left: f64, right: f64) -> f64 {
        ratio(shared, left + right)
    }
}

/// Share of `a`'s positive mass found on features `b` also has
#[derive(Debug, Clone, Copy, Default)]
pub struct Recall;

impl Measure for Recall {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.combine(self.shared(a, b), self.left(a), self.right(b))
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        "Recall".to_string()
    }
}

impl DecomposableMeasure for Recall {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        positive_shared(a, b).map(|(x, _)| x).sum()
    }

    fn left(&self, a: &SparseVector) -> f64 {
        positive_sum(a)
    }

    fn right(&self, b: &SparseVector) -> f64 {
        positive_sum(b)
    }

    fn combine(&self, shared: f64, left: f64, _right: f64) -> f64 {
        ratio(shared, left)
    }
}

/// Share of `b`'s positive mass found on features `a` also has
#[derive(Debug, Clone, Copy, Default)]
pub struct Precision;

impl Measure for Precision {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.combine(self.shared(a, b), self.left(a), self.right(b))
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        "Precision".to_string()
    }
}

impl DecomposableMeasure for Precision {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        positive_shared(a, b).map(|(_, y)| y).sum()
    }

    fn left(&self, a: &SparseVector) -> f64 {
        positive_sum(a)
    }

    fn right(&self, b: &SparseVector) -> f64 {
        positive_sum(b)
    }

    fn combine(&self, shared: f64, _left: f64, right: f64) -> f64 {
        ratio(shared, right)
    }
}

/// Weeds & Weir co-occurrence retrieval: a blend of the harmonic and a
/// weighted arithmetic mean of precision and recall.
///
/// `sim = γ·HM(P, R) + (1 − γ)·(β·P + (1 − β)·R)`
#[derive(Debug, Clone, Copy)]
pub struct Weeds {
    beta: f64,
    gamma: f64,
}

impl Weeds {
    pub const DEFAULT_BETA: f64 = 0.5;
    pub const DEFAULT_GAMMA: f64 = 0.5;

    pub fn new(beta: f64, gamma: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&beta) {
            return Err(Error::Config(format!(
                "weeds beta must be within [0, 1], got {}",
                beta
            )));
        }
        if !(0.0..=1.0).contains(&gamma) {
            return Err(Error::Config(format!(
                "weeds gamma must be within [0, 1], got {}",
                gamma
            )));
        }
        Ok(Self { beta, gamma })
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Default for Weeds {
    fn default() -> Self {
        Self {
            beta: Self::DEFAULT_BETA,
            gamma: Self::DEFAULT_GAMMA,
        }
    }
}

impl Measure for Weeds {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let precision = Precision.similarity(a, b);
        let recall = Recall.similarity(a, b);

        let arithmetic = self.beta * precision + (1.0 - self.beta) * recall;
        let harmonic = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        self.gamma * harmonic + (1.0 - self.gamma) * arithmetic
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        format!("Weeds{{beta={},gamma={}}}", self.beta, self.gamma)
    }
}
