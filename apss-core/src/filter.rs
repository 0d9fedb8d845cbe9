//! Record and pair predicates
//!
//! Filters are plain shared closures so they can be handed to every engine
//! instance of a threaded run.

use std::sync::Arc;

use crate::structures::{IndexedVector, WeightedPair};

/// Shared predicate over `T`
pub type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Predicate applied to input vectors before they are compared
pub type RecordFilter = Filter<IndexedVector>;

/// Predicate applied to scored pairs before they are emitted
pub type PairFilter = Filter<WeightedPair>;

pub fn accept_all<T: 'static>() -> Filter<T> {
    Arc::new(|_: &T| true)
}

pub fn reject_all<T: 'static>() -> Filter<T> {
    Arc::new(|_: &T| false)
}

/// Accept pairs whose similarity is at least `threshold`
pub fn min_similarity(threshold: f64) -> PairFilter {
    Arc::new(move |pair: &WeightedPair| pair.weight >= threshold)
}

/// Accept pairs whose similarity is at most `threshold`
pub fn max_similarity(threshold: f64) -> PairFilter {
    Arc::new(move |pair: &WeightedPair| pair.weight <= threshold)
}

/// Reject pairs that relate a token to itself
pub fn exclude_identity() -> PairFilter {
    Arc::new(|pair: &WeightedPair| !pair.record.is_identity())
}

/// Accept vectors with at least `min` stored features
pub fn min_entries(min: usize) -> RecordFilter {
    Arc::new(move |v: &IndexedVector| v.value().len() >= min)
}

/// Conjunction of `filters`; an empty list accepts everything
pub fn all_of<T: 'static>(filters: Vec<Filter<T>>) -> Filter<T> {
    match filters.len() {
        0 => accept_all(),
        1 => filters.into_iter().next().unwrap_or_else(accept_all),
        _ => Arc::new(move |x: &T| filters.iter().all(|f| f(x))),
    }
}
