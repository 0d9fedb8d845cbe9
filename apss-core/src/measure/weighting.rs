//! Feature re-weighting applied to both operands before a measure runs
//!
//! Simple weightings depend only on the vector itself. Contextual ones also
//! read corpus-wide `FeatureMarginals` to compare a feature's weight within
//! the vector against its weight across the corpus.

use std::fmt;
use std::sync::Arc;

use super::marginals::FeatureMarginals;
use super::{Measure, Proximity};
use crate::TokenId;
use crate::error::{Error, Result};
use crate::structures::SparseVector;

/// Vector-to-vector transform applied before measuring
pub trait Weighting: Send + Sync + fmt::Debug {
    fn apply(&self, vector: &SparseVector) -> SparseVector;

    fn name(&self) -> String;
}

/// Rebuild `vector` with every stored value replaced by `f(key, value)`.
///
/// Zero and non-finite results are dropped.
fn elementwise(vector: &SparseVector, f: impl Fn(TokenId, f64) -> f64) -> SparseVector {
    let mut out = SparseVector::with_capacity(vector.cardinality(), vector.len());
    for (key, value) in vector.iter() {
        let weighted = f(key, value);
        if weighted.is_finite() {
            out.set(key, weighted);
        }
    }
    out
}

/// Scales every value by a constant factor
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    factor: f64,
}

impl Constant {
    pub const DEFAULT_FACTOR: f64 = 1.0;

    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl Default for Constant {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FACTOR)
    }
}

impl Weighting for Constant {
    fn apply(&self, vector: &SparseVector) -> SparseVector {
        elementwise(vector, |_, value| self.factor * value)
    }

    fn name(&self) -> String {
        format!("Constant{{factor={}}}", self.factor)
    }
}

/// Scales a vector to unit Euclidean length
#[derive(Debug, Clone, Copy, Default)]
pub struct L2UnitVector;

impl Weighting for L2UnitVector {
    fn apply(&self, vector: &SparseVector) -> SparseVector {
        let length = vector.magnitude();
        if length == 0.0 {
            return vector.clone();
        }
        elementwise(vector, |_, value| value / length)
    }

    fn name(&self) -> String {
        "L2UnitVector".to_string()
    }
}

/// Pearson's chi-squared statistic of the entry/feature contingency table
#[derive(Debug, Clone)]
pub struct ChiSquared {
    marginals: Arc<FeatureMarginals>,
}

impl ChiSquared {
    pub fn new(marginals: Arc<FeatureMarginals>) -> Self {
        Self { marginals }
    }
}

impl Weighting for ChiSquared {
    fn apply(&self, vector: &SparseVector) -> SparseVector {
        let n = self.marginals.grand_total();
        let sum = vector.sum();
        elementwise(vector, |key, value| {
            let o11 = value;
            // This entry with other features
            let o12 = sum - value;
            // Other entries with this feature
            let o21 = self.marginals.frequency(key) - value;
            let o22 = n - o11 - o12 - o21;
            let det = o11 * o22 - o12 * o21;
            n * det * det / ((o11 + o12) * (o11 + o21) * (o12 + o22) * (o21 + o22))
        })
    }

    fn name(&self) -> String {
        "ChiSquared".to_string()
    }
}

/// Dice coefficient between the entry and feature events
#[derive(Debug, Clone)]
pub struct DiceWeighting {
    marginals: Arc<FeatureMarginals>,
}

impl DiceWeighting {
    pub fn new(marginals: Arc<FeatureMarginals>) -> Self {
        Self { marginals }
    }
}

impl Weighting for DiceWeighting {
    fn apply(&self, vector: &SparseVector) -> SparseVector {
        let sum = vector.sum();
        let entry_prior = sum / self.marginals.grand_total();
        elementwise(vector, |key, value| {
            let joint = value / sum * entry_prior;
            2.0 * joint / (entry_prior + self.marginals.prior(key))
        })
    }

    fn name(&self) -> String {
        "DiceWeighting".to_string()
    }
}

/// Log-likelihood ratio of the feature given the entry against the feature
/// given every other entry
#[derive(Debug, Clone)]
pub struct Llr {
    marginals: Arc<FeatureMarginals>,
}

impl Llr {
    pub fn new(marginals: Arc<FeatureMarginals>) -> Self {
        Self { marginals }
    }
}

impl Weighting for Llr {
    fn apply(&self, vector: &SparseVector) -> SparseVector {
        let sum = vector.sum();
        let rest = self.marginals.grand_total() - sum;
        elementwise(vector, |key, value| {
            let h_a = (value / sum).log2();
            let h_0 = ((self.marginals.frequency(key) - value) / rest).log2();
            2.0 * (h_a - h_0)
        })
    }

    fn name(&self) -> String {
        "LLR".to_string()
    }
}

/// Squared pointwise mutual information, `log2(P(e,f)^2 / (P(e) P(f)))`
#[derive(Debug, Clone)]
pub struct SquaredPmi {
    marginals: Arc<FeatureMarginals>,
}

impl SquaredPmi {
    pub fn new(marginals: Arc<FeatureMarginals>) -> Self {
        Self { marginals }
    }
}

impl Weighting for SquaredPmi {
    fn apply(&self, vector: &SparseVector) -> SparseVector {
        let n = self.marginals.grand_total();
        let log_entry_prior = (vector.sum() / n).log2();
        elementwise(vector, |key, value| {
            2.0 * (value / n).log2() - (log_entry_prior + self.marginals.prior(key).log2())
        })
    }

    fn name(&self) -> String {
        "SquaredPMI".to_string()
    }
}

/// T-test of the joint distribution against the product of the marginals
#[derive(Debug, Clone)]
pub struct TTest {
    marginals: Arc<FeatureMarginals>,
}

impl TTest {
    pub fn new(marginals: Arc<FeatureMarginals>) -> Self {
        Self { marginals }
    }
}

impl Weighting for TTest {
    fn apply(&self, vector: &SparseVector) -> SparseVector {
        let sum = vector.sum();
        let entry_prior = sum / self.marginals.grand_total();
        elementwise(vector, |key, value| {
            let joint = value / sum * entry_prior;
            let product = entry_prior * self.marginals.prior(key);
            (joint - product) / product.sqrt()
        })
    }

    fn name(&self) -> String {
        "TTest".to_string()
    }
}

/// Measure evaluated over re-weighted operands
#[derive(Debug)]
pub struct Reweighted {
    inner: Proximity,
    weighting: Arc<dyn Weighting>,
}

impl Reweighted {
    pub fn new(inner: Proximity, weighting: Arc<dyn Weighting>) -> Self {
        Self { inner, weighting }
    }

    pub fn inner(&self) -> &Proximity {
        &self.inner
    }
}

impl Measure for Reweighted {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let a = self.weighting.apply(a);
        let b = self.weighting.apply(b);
        self.inner.similarity(&a, &b)
    }

    fn is_commutative(&self) -> bool {
        self.inner.is_commutative()
    }

    fn name(&self) -> String {
        format!("{}[{}]", self.inner.name(), self.weighting.name())
    }
}

/// Names accepted by `weighting_by_name`, in display order
pub const WEIGHTING_NAMES: &[&str] = &[
    "none", "constant", "l2", "chi2", "dice", "llr", "pmi2", "ttest",
];

/// Whether the named weighting reads corpus marginals
pub fn needs_marginals(name: &str) -> bool {
    matches!(
        normalise(name).as_str(),
        "chi2" | "chi-squared" | "dice" | "llr" | "pmi2" | "squared-pmi" | "ttest" | "t-test"
    )
}

fn normalise(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Resolve a weighting by (case-insensitive) name. `none` resolves to `None`.
///
/// Contextual weightings fail without `marginals`.
pub fn weighting_by_name(
    name: &str,
    factor: f64,
    marginals: Option<&Arc<FeatureMarginals>>,
) -> Result<Option<Arc<dyn Weighting>>> {
    let name = normalise(name);
    let contextual = || {
        marginals.cloned().ok_or_else(|| {
            Error::Config(format!("weighting {} needs feature marginals", name))
        })
    };
    let weighting: Arc<dyn Weighting> = match name.as_str() {
        "none" | "" => return Ok(None),
        "constant" => Arc::new(Constant::new(factor)),
        "l2" | "l2-unit-vector" | "unit" => Arc::new(L2UnitVector),
        "chi2" | "chi-squared" => Arc::new(ChiSquared::new(contextual()?)),
        "dice" => Arc::new(DiceWeighting::new(contextual()?)),
        "llr" => Arc::new(Llr::new(contextual()?)),
        "pmi2" | "squared-pmi" => Arc::new(SquaredPmi::new(contextual()?)),
        "ttest" | "t-test" => Arc::new(TTest::new(contextual()?)),
        other => {
            return Err(Error::Config(format!("unknown weighting: {}", other)));
        }
    };
    Ok(Some(weighting))
}
