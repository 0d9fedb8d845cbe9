mod records;
mod sparse_vector;

pub use records::{Indexed, TokenPair, Weighted};
pub use sparse_vector::{SharedEntries, SparseVector};

/// A sparse vector tagged with its entry id
pub type IndexedVector = Indexed<SparseVector>;

/// A similarity-weighted pair of entry ids
pub type WeightedPair = Weighted<TokenPair>;
