//! Corpus-wide feature totals and the measures that depend on them

use std::sync::Arc;

use log::debug;

use super::Measure;
use crate::TokenId;
use crate::error::Result;
use crate::source::SeekableSource;
use crate::structures::{IndexedVector, SparseVector};

/// Total weight of every feature across a corpus.
///
/// `prior(f)` is the share of the grand total held by feature `f`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMarginals {
    totals: Vec<f64>,
    grand_total: f64,
    vectors: u64,
}

impl FeatureMarginals {
    pub fn from_vectors<'a>(vectors: impl IntoIterator<Item = &'a SparseVector>) -> Self {
        let mut marginals = Self::default();
        for v in vectors {
            marginals.add(v);
        }
        marginals
    }

    /// Sum every vector of `source`, leaving its position unchanged
    pub fn scan<S>(source: &mut S) -> Result<Self>
    where
        S: SeekableSource<Item = IndexedVector> + ?Sized,
    {
        let start = source.position()?;
        let mut marginals = Self::default();
        while source.has_next()? {
            marginals.add(source.read()?.value());
        }
        source.seek(&start)?;
        debug!(
            "[marginals] {} vectors, {} features, grand total {}",
            marginals.vectors,
            marginals.num_features(),
            marginals.grand_total
        );
        Ok(marginals)
    }

    fn add(&mut self, vector: &SparseVector) {
        if let Some(&last) = vector.keys().last() {
            if last as usize >= self.totals.len() {
                self.totals.resize(last as usize + 1, 0.0);
            }
        }
        for (key, value) in vector.iter() {
            self.totals[key as usize] += value;
        }
        self.grand_total += vector.sum();
        self.vectors += 1;
    }

    /// Total weight of `key`, zero for unseen features
    pub fn frequency(&self, key: TokenId) -> f64 {
        self.totals.get(key as usize).copied().unwrap_or(0.0)
    }

    pub fn grand_total(&self) -> f64 {
        self.grand_total
    }

    pub fn prior(&self, key: TokenId) -> f64 {
        if self.grand_total == 0.0 {
            0.0
        } else {
            self.frequency(key) / self.grand_total
        }
    }

    /// Number of features with a non-zero total
    pub fn num_features(&self) -> usize {
        self.totals.iter().filter(|&&t| t != 0.0).count()
    }

    /// Number of vectors summed
    pub fn vectors(&self) -> u64 {
        self.vectors
    }
}

/// Confusion probability: the chance of substituting B for A given the
/// contexts they share, `sum_f P(f|A) P(f|B) P(A) / P(f)`.
#[derive(Debug, Clone)]
pub struct Confusion {
    marginals: Arc<FeatureMarginals>,
}

impl Confusion {
    pub fn new(marginals: Arc<FeatureMarginals>) -> Self {
        Self { marginals }
    }
}

impl Measure for Confusion {
    fn similarity(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        let grand_total = self.marginals.grand_total();
        if grand_total == 0.0 {
            return 0.0;
        }
        let (a_sum, b_sum) = (a.sum(), b.sum());
        let entry_prior = a_sum / grand_total;

        let (ak, av) = (a.keys(), a.values());
        let (bk, bv) = (b.keys(), b.values());
        let (mut i, mut j) = (0, 0);
        let mut total = 0.0;
        while i < ak.len() && j < bk.len() {
            if ak[i] < bk[j] {
                i += 1;
            } else if ak[i] > bk[j] {
                j += 1;
            } else {
                let feature_prior = self.marginals.prior(ak[i]);
                let (q, r) = (av[i] / a_sum, bv[j] / b_sum);
                if q * r * entry_prior * feature_prior > 0.0 {
                    total += q * r * entry_prior / feature_prior;
                }
                i += 1;
                j += 1;
            }
        }
        total
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        "Confusion".to_string()
    }
}
