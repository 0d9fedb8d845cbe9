//! Similarity measures over sparse vectors
//!
//! Two capabilities are modelled:
//! - `Measure`: computes a scalar similarity (or distance) between two vectors
//! - `DecomposableMeasure`: splits the computation into per-vector terms
//!   (`left`, `right`) that can be precomputed once per vector, a pairwise
//!   `shared` term, and a `combine` step
//!
//! Engines never dispatch on the capability in the hot loop. A `Proximity` is
//! resolved once into a `PairScorer` (see `scorer`) when an engine initialises.
//!
//! A `Weighting` can be layered over any measure with `Proximity::weighted`;
//! the result re-weights both operands on every comparison.

mod divergence;
mod inner_product;
mod lin;
pub mod marginals;
mod overlap;
mod rank;
mod scorer;
pub mod weighting;

use std::fmt;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::structures::SparseVector;

pub use divergence::{JensenShannon, KullbackLeibler, Lambda, LeeSkew, Lp};
pub use inner_product::{Cosine, DotProduct};
pub use lin::{Lin, Precision, Recall, Weeds};
pub use marginals::{Confusion, FeatureMarginals};
pub use overlap::{Dice, Jaccard, Overlap};
pub use rank::KendallsTau;
pub use scorer::{DecomposedScorer, DirectScorer, PairScorer};
pub use weighting::{Reweighted, Weighting};

/// Pure pairwise similarity function
pub trait Measure: Send + Sync + fmt::Debug {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64;

    /// Whether `similarity(a, b) == similarity(b, a)` for all inputs
    fn is_commutative(&self) -> bool {
        true
    }

    fn name(&self) -> String;
}

/// Measure whose similarity is `combine(shared(a, b), left(a), right(b))`
///
/// Implementors must keep `similarity` consistent with that decomposition.
pub trait DecomposableMeasure: Measure {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64;

    /// Term depending only on the first operand
    fn left(&self, a: &SparseVector) -> f64;

    /// Term depending only on the second operand
    fn right(&self, b: &SparseVector) -> f64;

    fn combine(&self, shared: f64, left: f64, right: f64) -> f64;
}

/// A measure tagged with the capability it offers
#[derive(Debug, Clone)]
pub enum Proximity {
    Direct(Arc<dyn Measure>),
    Decomposable(Arc<dyn DecomposableMeasure>),
}

impl Proximity {
    pub fn direct<M: Measure + 'static>(measure: M) -> Self {
        Proximity::Direct(Arc::new(measure))
    }

    pub fn decomposable<M: DecomposableMeasure + 'static>(measure: M) -> Self {
        Proximity::Decomposable(Arc::new(measure))
    }

    pub fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        match self {
            Proximity::Direct(m) => m.similarity(a, b),
            Proximity::Decomposable(m) => m.similarity(a, b),
        }
    }

    pub fn is_commutative(&self) -> bool {
        match self {
            Proximity::Direct(m) => m.is_commutative(),
            Proximity::Decomposable(m) => m.is_commutative(),
        }
    }

    pub fn is_decomposable(&self) -> bool {
        matches!(self, Proximity::Decomposable(_))
    }

    pub fn name(&self) -> String {
        match self {
            Proximity::Direct(m) => m.name(),
            Proximity::Decomposable(m) => m.name(),
        }
    }

    /// Evaluate this measure over operands passed through `weighting`.
    ///
    /// The result is always direct: weighted vectors are not cached between
    /// comparisons, so no term can be precomputed.
    pub fn weighted(self, weighting: Arc<dyn Weighting>) -> Self {
        Proximity::direct(Reweighted::new(self, weighting))
    }

    /// Swap the operands of this measure.
    ///
    /// Reversing a commutative measure has no effect, so it is returned
    /// unchanged with a warning.
    pub fn reversed(self) -> Self {
        if self.is_commutative() {
            warn!(
                "[measure] reversing commutative measure {} has no effect",
                self.name()
            );
            return self;
        }
        match self {
            Proximity::Direct(m) => Proximity::Direct(Arc::new(Reversed::new(m))),
            Proximity::Decomposable(m) => Proximity::Decomposable(Arc::new(Reversed::new(m))),
        }
    }
}

impl Default for Proximity {
    fn default() -> Self {
        Proximity::decomposable(Jaccard)
    }
}

/// Wraps a measure so that `similarity(a, b)` evaluates `inner(b, a)`
#[derive(Debug)]
pub struct Reversed<M: ?Sized> {
    inner: Arc<M>,
}

impl<M: ?Sized> Reversed<M> {
    pub fn new(inner: Arc<M>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<M> {
        &self.inner
    }
}

impl Measure for Reversed<dyn Measure> {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.inner.similarity(b, a)
    }

    fn is_commutative(&self) -> bool {
        self.inner.is_commutative()
    }

    fn name(&self) -> String {
        format!("Reversed{{{}}}", self.inner.name())
    }
}

impl Measure for Reversed<dyn DecomposableMeasure> {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.inner.similarity(b, a)
    }

    fn is_commutative(&self) -> bool {
        self.inner.is_commutative()
    }

    fn name(&self) -> String {
        format!("Reversed{{{}}}", self.inner.name())
    }
}

impl DecomposableMeasure for Reversed<dyn DecomposableMeasure> {
    fn shared(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        self.inner.shared(b, a)
    }

    fn left(&self, a: &SparseVector) -> f64 {
        self.inner.right(a)
    }

    fn right(&self, b: &SparseVector) -> f64 {
        self.inner.left(b)
    }

    fn combine(&self, shared: f64, left: f64, right: f64) -> f64 {
        self.inner.combine(shared, right, left)
    }
}

/// Tunable parameters for the parameterised measures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureParams {
    /// Exponent for the Lp-space distance (`f64::INFINITY` for Chebyshev)
    pub lp_power: f64,
    /// Weeds: weight of precision against recall in the arithmetic mean
    pub weeds_beta: f64,
    /// Weeds: weight of the harmonic mean against the arithmetic mean
    pub weeds_gamma: f64,
    /// Lee skew divergence: weight of A in the mixture compared with B
    pub lee_alpha: f64,
    /// Lambda divergence: weight of A in the mixture
    pub lambda: f64,
    /// Smallest number of dimensions assumed by KL divergence and Kendall's tau
    pub min_cardinality: usize,
    /// Factor for the `constant` weighting
    pub weighting_factor: f64,
}

impl Default for MeasureParams {
    fn default() -> Self {
        Self {
            lp_power: Lp::DEFAULT_POWER,
            weeds_beta: Weeds::DEFAULT_BETA,
            weeds_gamma: Weeds::DEFAULT_GAMMA,
            lee_alpha: LeeSkew::DEFAULT_ALPHA,
            lambda: Lambda::DEFAULT_LAMBDA,
            min_cardinality: KullbackLeibler::DEFAULT_MIN_CARDINALITY,
            weighting_factor: weighting::Constant::DEFAULT_FACTOR,
        }
    }
}

/// Canonical names accepted by `by_name`, in display order
pub const MEASURE_NAMES: &[&str] = &[
    "jaccard",
    "dice",
    "overlap",
    "cosine",
    "dot",
    "lin",
    "recall",
    "precision",
    "weeds",
    "lp",
    "manhattan",
    "euclidean",
    "chebyshev",
    "js",
    "kl",
    "lee",
    "lambda",
    "tau",
    "confusion",
];

/// Whether the named measure reads corpus marginals
pub fn needs_marginals(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("confusion")
}

/// Resolve a measure by name with default parameters
pub fn by_name(name: &str) -> Result<Proximity> {
    by_name_with(name, &MeasureParams::default())
}

/// Resolve a measure by (case-insensitive) name or alias
pub fn by_name_with(name: &str, params: &MeasureParams) -> Result<Proximity> {
    by_name_in(name, params, None)
}

/// Resolve a measure that may depend on corpus `marginals`.
///
/// Measures listed by `needs_marginals` fail without them.
pub fn by_name_in(
    name: &str,
    params: &MeasureParams,
    marginals: Option<&Arc<FeatureMarginals>>,
) -> Result<Proximity> {
    let proximity = match name.trim().to_ascii_lowercase().as_str() {
        "jaccard" | "tanimoto" => Proximity::decomposable(Jaccard),
        "dice" => Proximity::decomposable(Dice),
        "overlap" => Proximity::decomposable(Overlap),
        "cosine" | "cos" => Proximity::decomposable(Cosine),
        "dot" | "dotproduct" | "dot-product" => Proximity::decomposable(DotProduct),
        "lin" => Proximity::decomposable(Lin),
        "recall" => Proximity::decomposable(Recall),
        "precision" => Proximity::decomposable(Precision),
        "weeds" => Proximity::direct(Weeds::new(params.weeds_beta, params.weeds_gamma)?),
        "lp" | "minkowski" => Proximity::direct(Lp::new(params.lp_power)?),
        "manhattan" | "l1" => Proximity::direct(Lp::new(1.0)?),
        "euclidean" | "l2" => Proximity::direct(Lp::new(2.0)?),
        "chebyshev" | "linf" => Proximity::direct(Lp::new(f64::INFINITY)?),
        "js" | "jensen-shannon" | "jensenshannon" => Proximity::direct(JensenShannon),
        "kl" | "kullback-leibler" | "kldivergence" => {
            Proximity::direct(KullbackLeibler::new(params.min_cardinality)?)
        }
        "lee" | "lee-skew" | "leeskew" => Proximity::direct(LeeSkew::new(params.lee_alpha)?),
        "lambda" => Proximity::direct(Lambda::new(params.lambda)?),
        "tau" | "kendall" | "kendalls-tau" => {
            Proximity::direct(KendallsTau::new(params.min_cardinality)?)
        }
        "confusion" => {
            let marginals = marginals.ok_or_else(|| {
                Error::Config("measure confusion needs feature marginals".into())
            })?;
            Proximity::direct(Confusion::new(Arc::clone(marginals)))
        }
        other => {
            return Err(Error::Config(format!("unknown measure: {}", other)));
        }
    };
    Ok(proximity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(entries: &[(u32, f64)]) -> SparseVector {
        let mut v = SparseVector::new(8);
        for &(k, x) in entries {
            v.set(k, x);
        }
        v
    }

    #[test]
    fn test_default_is_jaccard() {
        let p = Proximity::default();
        assert!(p.is_decomposable());
        assert_eq!(p.name(), "Jaccard");
    }

    #[test]
    fn test_by_name_aliases() {
        assert_eq!(by_name("JACCARD").unwrap().name(), "Jaccard");
        assert_eq!(by_name(" cos ").unwrap().name(), "Cosine");
        assert!(!by_name("weeds").unwrap().is_decomposable());
        assert!(by_name("js").unwrap().is_commutative());
        assert!(!by_name("kl").unwrap().is_commutative());
        assert_eq!(by_name("Kendall").unwrap().name(), "KendallsTau{min_cardinality=1}");

        let marginals = Arc::new(FeatureMarginals::default());
        for name in MEASURE_NAMES {
            let resolved = by_name_in(name, &MeasureParams::default(), Some(&marginals));
            assert!(resolved.is_ok(), "{} should resolve", name);
        }
    }

    #[test]
    fn test_marginal_measures_need_marginals() {
        assert!(needs_marginals("Confusion"));
        assert!(!needs_marginals("lin"));
        assert!(matches!(by_name("confusion"), Err(Error::Config(_))));
    }

    #[test]
    fn test_by_name_unknown() {
        assert!(matches!(by_name("nope"), Err(Error::Config(_))));
    }

    #[test]
    fn test_by_name_rejects_bad_params() {
        let params = MeasureParams {
            lp_power: -1.0,
            ..Default::default()
        };
        assert!(matches!(by_name_with("lp", &params), Err(Error::Config(_))));

        let params = MeasureParams {
            weeds_beta: 1.5,
            ..Default::default()
        };
        assert!(by_name_with("weeds", &params).is_err());

        let params = MeasureParams {
            lee_alpha: 1.0,
            lambda: 0.0,
            min_cardinality: 0,
            ..Default::default()
        };
        for name in ["lee", "lambda", "kl", "tau"] {
            assert!(by_name_with(name, &params).is_err(), "{} should reject", name);
        }
    }

    #[test]
    fn test_weighted_is_direct() {
        let a = vector(&[(1, 3.0), (2, 4.0)]);
        let b = vector(&[(1, 6.0), (2, 8.0)]);
        let p = Proximity::decomposable(DotProduct).weighted(Arc::new(weighting::L2UnitVector));
        assert!(!p.is_decomposable());
        assert!((p.similarity(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reverse_commutative_is_noop() {
        let p = Proximity::decomposable(Jaccard).reversed();
        assert_eq!(p.name(), "Jaccard");
    }

    #[test]
    fn test_reversed_recall_is_precision() {
        let a = vector(&[(1, 1.0), (3, 2.0)]);
        let b = vector(&[(1, 1.0), (2, 1.0)]);

        let reversed = Proximity::decomposable(Recall).reversed();
        assert!(reversed.is_decomposable());
        assert_eq!(reversed.name(), "Reversed{Recall}");

        let precision = Proximity::decomposable(Precision);
        let expected = precision.similarity(&a, &b);
        assert!((reversed.similarity(&a, &b) - expected).abs() < 1e-12);

        // Decomposed evaluation agrees with the direct one
        if let Proximity::Decomposable(m) = &reversed {
            let s = m.combine(m.shared(&a, &b), m.left(&a), m.right(&b));
            assert!((s - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reversed_direct() {
        let a = vector(&[(1, 1.0), (3, 2.0)]);
        let b = vector(&[(1, 1.0), (2, 1.0)]);
        let weeds = Weeds::new(1.0, 0.0).unwrap();
        let forward = weeds.similarity(&b, &a);
        let reversed = Proximity::direct(weeds).reversed();
        assert!(!reversed.is_decomposable());
        assert!((reversed.similarity(&a, &b) - forward).abs() < 1e-12);
    }
}
