//! Packed sparse vector of `f64` weights over `u32` feature keys
//!
//! Non-zero entries live in two parallel arrays ordered by key:
//! - `keys`: strictly increasing feature ids
//! - `values`: the weight of `keys[i]` at `values[i]`
//!
//! Lookup and mutation use binary search over the packed keys, which keeps
//! per-vector overhead to 12 bytes per stored feature. A running `sum` of the
//! stored values is maintained on every mutation so that L1-style measures
//! never have to rescan the vector.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::TokenId;
use crate::error::{Error, Result};

/// Backing storage grows by this factor when an insert runs out of room.
const GROWTH_FACTOR: f64 = 1.5;

/// Sparse vector with a fixed (but growable on `set`) number of dimensions
#[derive(Debug, Clone, Default)]
pub struct SparseVector {
    cardinality: usize,
    keys: Vec<TokenId>,
    values: Vec<f64>,
    sum: f64,
}

impl SparseVector {
    /// Create an empty vector over `cardinality` dimensions
    pub fn new(cardinality: usize) -> Self {
        Self {
            cardinality,
            keys: Vec::new(),
            values: Vec::new(),
            sum: 0.0,
        }
    }

    /// Create an empty vector with room for `capacity` entries.
    ///
    /// The capacity is clamped to the cardinality, since a vector can never
    /// hold more entries than it has dimensions.
    pub fn with_capacity(cardinality: usize, capacity: usize) -> Self {
        let capacity = capacity.min(cardinality);
        Self {
            cardinality,
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            sum: 0.0,
        }
    }

    /// Build a compact vector from a dense array, one dimension per element
    pub fn from_dense(dense: &[f64]) -> Self {
        let mut vec = Self::new(dense.len());
        for (key, &value) in dense.iter().enumerate() {
            vec.set(key as TokenId, value);
        }
        vec.compact();
        vec
    }

    /// Assemble a vector from raw parallel arrays.
    ///
    /// Keys must be strictly increasing and below `cardinality`. Zero values
    /// are accepted as-is; call [`compact`](Self::compact) to drop them.
    pub fn from_parts(keys: Vec<TokenId>, values: Vec<f64>, cardinality: usize) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(Error::InvalidVector(format!(
                "keys.len() {} != values.len() {}",
                keys.len(),
                values.len()
            )));
        }
        if let Some(pos) = keys.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Error::InvalidVector(format!(
                "keys not strictly increasing at offset {}: {} >= {}",
                pos,
                keys[pos],
                keys[pos + 1]
            )));
        }
        if let Some(&last) = keys.last() {
            if last as usize >= cardinality {
                return Err(Error::KeyOutOfBounds {
                    key: last,
                    cardinality,
                });
            }
        }
        let sum = values.iter().sum();
        Ok(Self {
            cardinality,
            keys,
            values,
            sum,
        })
    }

    /// Total number of dimensions (not the number of stored entries)
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Number of stored entries
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no entries are stored
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Allocated entry slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.keys.capacity()
    }

    /// Sum of all stored values
    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    #[inline]
    pub fn keys(&self) -> &[TokenId] {
        &self.keys
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate `(key, value)` entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, f64)> + '_ {
        self.keys.iter().copied().zip(self.values.iter().copied())
    }

    /// Value stored for `key`, or 0.0 if absent
    pub fn get(&self, key: TokenId) -> Result<f64> {
        if key as usize >= self.cardinality {
            return Err(Error::KeyOutOfBounds {
                key,
                cardinality: self.cardinality,
            });
        }
        Ok(self
            .keys
            .binary_search(&key)
            .map_or(0.0, |i| self.values[i]))
    }

    /// True if `key` has a stored entry
    pub fn contains_key(&self, key: TokenId) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Set the value of `key`.
    ///
    /// Zero values are never stored: setting an existing key to zero removes
    /// it. Setting a key beyond the cardinality grows the cardinality.
    pub fn set(&mut self, key: TokenId, value: f64) {
        if key as usize >= self.cardinality {
            self.cardinality = key as usize + 1;
        }

        match self.keys.binary_search(&key) {
            Ok(i) => {
                if value == 0.0 {
                    self.remove_at(i);
                } else {
                    self.sum += value - self.values[i];
                    self.values[i] = value;
                }
            }
            Err(i) => {
                if value == 0.0 {
                    return;
                }
                self.ensure_capacity(self.keys.len() + 1);
                self.keys.insert(i, key);
                self.values.insert(i, value);
                self.sum += value;
            }
        }
    }

    /// Remove the entry for `key`, returning its value if it was stored
    pub fn remove(&mut self, key: TokenId) -> Option<f64> {
        match self.keys.binary_search(&key) {
            Ok(i) => Some(self.remove_at(i)),
            Err(_) => None,
        }
    }

    fn remove_at(&mut self, index: usize) -> f64 {
        self.keys.remove(index);
        let value = self.values.remove(index);
        self.sum -= value;
        value
    }

    fn ensure_capacity(&mut self, required: usize) {
        let capacity = self.keys.capacity();
        if required <= capacity {
            return;
        }
        let grown = ((capacity as f64 * GROWTH_FACTOR) as usize + 1).min(self.cardinality);
        let target = required.max(grown);
        self.keys.reserve_exact(target - self.keys.len());
        self.values.reserve_exact(target - self.values.len());
    }

    /// Drop any stored zeros and trim storage to the number of entries
    pub fn compact(&mut self) {
        let mut to = 0;
        for from in 0..self.keys.len() {
            if self.values[from] != 0.0 {
                self.keys[to] = self.keys[from];
                self.values[to] = self.values[from];
                to += 1;
            }
        }
        self.keys.truncate(to);
        self.values.truncate(to);
        self.keys.shrink_to_fit();
        self.values.shrink_to_fit();
    }

    /// Copy of the entries with keys in `[from, to)`, same cardinality
    pub fn slice(&self, from: TokenId, to: TokenId) -> SparseVector {
        let start = self.keys.partition_point(|&k| k < from);
        let end = self.keys.partition_point(|&k| k < to).max(start);
        let values = self.values[start..end].to_vec();
        Self {
            cardinality: self.cardinality,
            keys: self.keys[start..end].to_vec(),
            sum: values.iter().sum(),
            values,
        }
    }

    /// Euclidean norm of the stored values
    pub fn magnitude(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Expand to a dense array of `cardinality` elements
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.cardinality];
        for (k, v) in self.iter() {
            dense[k as usize] = v;
        }
        dense
    }

    /// Merge-join over the keys stored in both vectors.
    ///
    /// Yields `(self_value, other_value)` for each shared key in key order,
    /// in O(|self| + |other|).
    pub fn shared_entries<'a>(&'a self, other: &'a SparseVector) -> SharedEntries<'a> {
        SharedEntries {
            a: self,
            b: other,
            i: 0,
            j: 0,
        }
    }
}

/// Iterator returned by [`SparseVector::shared_entries`]
pub struct SharedEntries<'a> {
    a: &'a SparseVector,
    b: &'a SparseVector,
    i: usize,
    j: usize,
}

impl Iterator for SharedEntries<'_> {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.a.keys.len() && self.j < self.b.keys.len() {
            match self.a.keys[self.i].cmp(&self.b.keys[self.j]) {
                Ordering::Less => self.i += 1,
                Ordering::Greater => self.j += 1,
                Ordering::Equal => {
                    let item = (self.a.values[self.i], self.b.values[self.j]);
                    self.i += 1;
                    self.j += 1;
                    return Some(item);
                }
            }
        }
        None
    }
}

impl From<&[f64]> for SparseVector {
    fn from(dense: &[f64]) -> Self {
        Self::from_dense(dense)
    }
}

// Values compare by bit pattern so that 0.0/-0.0 and NaN behave consistently
// with `Hash`.
impl PartialEq for SparseVector {
    fn eq(&self, other: &Self) -> bool {
        self.cardinality == other.cardinality
            && self.keys == other.keys
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for SparseVector {}

impl Hash for SparseVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cardinality.hash(state);
        self.keys.len().hash(state);
        for (k, v) in self.iter() {
            k.hash(state);
            v.to_bits().hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut v = SparseVector::new(10);
        v.set(5, 2.0);
        v.set(1, 1.0);
        v.set(8, 3.0);

        assert_eq!(v.keys(), &[1, 5, 8]);
        assert_eq!(v.get(5).unwrap(), 2.0);
        assert_eq!(v.get(2).unwrap(), 0.0);
        assert_eq!(v.sum(), 6.0);
    }

    #[test]
    fn test_get_out_of_bounds() {
        let v = SparseVector::new(3);
        assert!(matches!(
            v.get(3),
            Err(Error::KeyOutOfBounds {
                key: 3,
                cardinality: 3
            })
        ));
    }

    #[test]
    fn test_set_grows_cardinality() {
        let mut v = SparseVector::new(2);
        v.set(9, 1.5);
        assert_eq!(v.cardinality(), 10);
        assert_eq!(v.get(9).unwrap(), 1.5);
    }

    #[test]
    fn test_set_zero_removes() {
        let mut v = SparseVector::new(4);
        v.set(2, 4.0);
        v.set(2, 0.0);
        assert!(v.is_empty());
        assert_eq!(v.sum(), 0.0);

        // zero on an absent key is a no-op
        v.set(3, 0.0);
        assert!(v.is_empty());
    }

    #[test]
    fn test_update_adjusts_sum() {
        let mut v = SparseVector::new(4);
        v.set(0, 1.0);
        v.set(0, 5.0);
        assert_eq!(v.len(), 1);
        assert_eq!(v.sum(), 5.0);
    }

    #[test]
    fn test_remove() {
        let mut v = SparseVector::from_dense(&[1.0, 2.0, 3.0]);
        assert_eq!(v.remove(1), Some(2.0));
        assert_eq!(v.remove(1), None);
        assert_eq!(v.keys(), &[0, 2]);
        assert_eq!(v.sum(), 4.0);
    }

    #[test]
    fn test_from_dense_round_trip() {
        let dense = [0.0, 1.5, 0.0, -2.0, 0.0];
        let v = SparseVector::from_dense(&dense);
        assert_eq!(v.cardinality(), 5);
        assert_eq!(v.len(), 2);
        assert_eq!(v.to_dense(), dense.to_vec());
    }

    #[test]
    fn test_compact_drops_zeros() {
        let mut v = SparseVector::from_parts(vec![0, 2, 4], vec![1.0, 0.0, 3.0], 5).unwrap();
        v.compact();
        assert_eq!(v.keys(), &[0, 4]);
        assert_eq!(v.values(), &[1.0, 3.0]);

        let before = v.clone();
        v.compact();
        assert_eq!(v, before);
    }

    #[test]
    fn test_from_parts_validation() {
        assert!(matches!(
            SparseVector::from_parts(vec![1, 1], vec![1.0, 1.0], 5),
            Err(Error::InvalidVector(_))
        ));
        assert!(matches!(
            SparseVector::from_parts(vec![1], vec![1.0, 2.0], 5),
            Err(Error::InvalidVector(_))
        ));
        assert!(matches!(
            SparseVector::from_parts(vec![7], vec![1.0], 5),
            Err(Error::KeyOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_slice() {
        let v = SparseVector::from_dense(&[1.0, 2.0, 0.0, 4.0, 5.0]);
        let s = v.slice(1, 4);
        assert_eq!(s.cardinality(), 5);
        assert_eq!(s.keys(), &[1, 3]);
        assert_eq!(s.sum(), 6.0);

        assert!(v.slice(4, 1).is_empty());
    }

    #[test]
    fn test_magnitude() {
        let v = SparseVector::from_dense(&[3.0, 0.0, 4.0]);
        assert!((v.magnitude() - 5.0).abs() < 1e-12);
        assert_eq!(SparseVector::new(3).magnitude(), 0.0);
    }

    #[test]
    fn test_equality_uses_bits() {
        let a = SparseVector::from_parts(vec![0], vec![f64::NAN], 1).unwrap();
        let b = SparseVector::from_parts(vec![0], vec![f64::NAN], 1).unwrap();
        assert_eq!(a, b);

        let pos = SparseVector::from_parts(vec![0], vec![0.0], 1).unwrap();
        let neg = SparseVector::from_parts(vec![0], vec![-0.0], 1).unwrap();
        assert_ne!(pos, neg);

        let mut other_card = a.clone();
        other_card.set(3, f64::NAN);
        assert_ne!(a, other_card);
    }

    #[test]
    fn test_shared_entries() {
        let a = SparseVector::from_parts(vec![0, 2, 4], vec![1.0, 2.0, 3.0], 6).unwrap();
        let b = SparseVector::from_parts(vec![1, 2, 4, 5], vec![4.0, 5.0, 6.0, 7.0], 6).unwrap();
        let shared: Vec<_> = a.shared_entries(&b).collect();
        assert_eq!(shared, vec![(2.0, 5.0), (3.0, 6.0)]);
    }

    #[test]
    fn test_capacity_never_exceeds_cardinality() {
        let mut v = SparseVector::new(4);
        for k in 0..4 {
            v.set(k, 1.0);
            assert!(v.len() <= v.capacity());
        }
        assert_eq!(v.len(), 4);
    }
}
