//! Record types flowing through the engines: identified vectors in, weighted pairs out

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::TokenId;

/// A value tagged with the external id it was enumerated under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Indexed<V> {
    key: TokenId,
    value: V,
}

impl<V> Indexed<V> {
    pub fn new(key: TokenId, value: V) -> Self {
        Self { key, value }
    }

    #[inline]
    pub fn key(&self) -> TokenId {
        self.key
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }
}

/// Ordered pair of token ids.
///
/// The derived ordering (first id, then second id) is the index order used
/// to sort output batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenPair {
    pub id1: TokenId,
    pub id2: TokenId,
}

impl TokenPair {
    pub fn new(id1: TokenId, id2: TokenId) -> Self {
        Self { id1, id2 }
    }

    /// True when both ids are the same token
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.id1 == self.id2
    }
}

/// A record with an associated scalar weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weighted<T> {
    pub record: T,
    pub weight: f64,
}

impl<T> Weighted<T> {
    pub fn new(record: T, weight: f64) -> Self {
        Self { record, weight }
    }

    #[inline]
    pub fn record(&self) -> &T {
        &self.record
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl<T: Ord> Weighted<T> {
    /// Compare by record only, ignoring the weight
    pub fn record_order(a: &Self, b: &Self) -> Ordering {
        a.record.cmp(&b.record)
    }
}
