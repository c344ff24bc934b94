//! Compact bitset representation for taxon sets.
//!
//! # Overview
//! Every node of a rooted tree carries the set of taxa below it. Taxa are
//! small integers handed out by [`crate::taxa::TaxonSet`], so a set of taxa
//! is stored as one bit per taxon.
//!
//! # Example
//! For a universe [a, b, c, d] mapped to indices [0, 1, 2, 3]:
//! - Cluster {a, c} → bitset `0b0101` (bits 0 and 2 set)
//! - Cluster {b, c, d} → bitset `0b1110` (bits 1, 2, 3 set)

/// A compact bitset for representing which taxa sit below a node.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large trees.
/// Each u64 word holds 64 taxon indices. All bitsets of one computation share
/// the same word count, so the derived `Eq`, `Hash` and `Ord` compare sets.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Parameters
    /// - `words`: Number of u64 words needed. Calculate as `(num_taxa + 63) / 64`
    ///
    /// # Example
    /// ```
    /// # use hybridization_number::bitset::Bitset;
    /// // For 100 taxa we need 2 words (128 bits)
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Builds a bitset from a list of taxon indices.
    ///
    /// # Example
    /// ```
    /// # use hybridization_number::bitset::Bitset;
    /// let bs = Bitset::from_indices(1, [0, 5]);
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    pub fn from_indices<I: IntoIterator<Item = usize>>(words: usize, indices: I) -> Self {
        let mut bs = Bitset::zeros(words);
        for idx in indices {
            bs.set(idx);
        }
        bs
    }

    /// Sets the bit at the given index to 1.
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;     // Equivalent to idx / 64
        let bit = idx & 63;      // Equivalent to idx % 64
        self.0[word] |= 1u64 << bit;
    }

    /// Returns true if the taxon `idx` is in the set.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        self.0
            .get(idx >> 6)
            .is_some_and(|w| w & (1u64 << (idx & 63)) != 0)
    }

    /// Performs bitwise OR with another bitset (union operation).
    ///
    /// Merges two taxon sets: `self` becomes `self ∪ other`
    ///
    /// # Example
    /// ```
    /// # use hybridization_number::bitset::Bitset;
    /// let mut left = Bitset::zeros(1);
    /// left.set(0);   // {0}
    ///
    /// let mut right = Bitset::zeros(1);
    /// right.set(1);  // {1}
    ///
    /// left.or_assign(&right);  // {0} ∪ {1} = {0, 1}
    /// assert_eq!(left.0[0], 0b11);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Removes every taxon of `other` from `self` (set difference).
    #[inline]
    pub fn and_not_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a &= !*b;
        }
    }

    /// Counts the number of set bits (population count).
    ///
    /// # Example
    /// ```
    /// # use hybridization_number::bitset::Bitset;
    /// let bs = Bitset::from_indices(1, [0, 2, 5]);
    /// assert_eq!(bs.count_ones(), 3);
    /// ```
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// True if the two sets share at least one taxon.
    #[inline]
    pub fn intersects(&self, other: &Bitset) -> bool {
        self.0.iter().zip(&other.0).any(|(a, b)| a & b != 0)
    }

    /// True if every taxon of `self` is also in `other`.
    #[inline]
    pub fn is_subset(&self, other: &Bitset) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a & !b == 0)
    }

    /// Smallest taxon index in the set, if any.
    pub fn first_one(&self) -> Option<usize> {
        self.0
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| (i << 6) + w.trailing_zeros() as usize)
    }

    /// Iterates over the set taxon indices in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(i, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some((i << 6) + bit)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_basic() {
        let mut bs = Bitset::zeros(1);
        bs.set(0);
        bs.set(2);
        assert_eq!(bs.0[0], 0b0101);
        assert!(bs.contains(2));
        assert!(!bs.contains(1));
        assert!(!bs.contains(500));
    }

    #[test]
    fn test_bitset_or_and_difference() {
        let mut bs1 = Bitset::from_indices(1, [0, 1]);
        let bs2 = Bitset::from_indices(1, [2, 3]);

        bs1.or_assign(&bs2);
        assert_eq!(bs1.0[0], 0b1111);

        bs1.and_not_assign(&bs2);
        assert_eq!(bs1.0[0], 0b0011);
    }

    /// Visual example: how bitsets relate nested clusters
    ///
    /// ```text
    ///           root
    ///          /    \
    ///        node1   d
    ///        /   \
    ///       a    node2
    ///            /   \
    ///           b     c
    /// ```
    ///
    /// - node2: {b, c} → `0b0110`
    /// - node1: {a, b, c} → `0b0111`
    #[test]
    fn test_subset_and_intersection() {
        let node2 = Bitset::from_indices(1, [1, 2]);
        let node1 = Bitset::from_indices(1, [0, 1, 2]);
        let d = Bitset::from_indices(1, [3]);

        assert!(node2.is_subset(&node1));
        assert!(!node1.is_subset(&node2));
        assert!(node1.intersects(&node2));
        assert!(!node1.intersects(&d));
        assert!(Bitset::zeros(1).is_subset(&d));
    }

    #[test]
    fn test_large_sets() {
        // More than 64 taxa (multiple words)
        let bs = Bitset::from_indices(2, [0, 63, 64, 127]);

        assert_eq!(bs.count_ones(), 4);
        assert_eq!(bs.0[0], 1u64 | (1u64 << 63));
        assert_eq!(bs.0[1], 1u64 | (1u64 << 63));
        assert_eq!(bs.iter_ones().collect::<Vec<_>>(), vec![0, 63, 64, 127]);
        assert_eq!(bs.first_one(), Some(0));
    }

    #[test]
    fn test_first_one_and_empty() {
        let empty = Bitset::zeros(2);
        assert!(empty.is_empty());
        assert_eq!(empty.first_one(), None);

        let bs = Bitset::from_indices(2, [70, 90]);
        assert_eq!(bs.first_one(), Some(70));
        assert!(!bs.is_empty());
    }
}
