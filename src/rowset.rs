//! Compact row-index sets for query supports.
//!
//! Supports and missing sets are combined many times per search round, so they are
//! stored as bit sets backed by `u64` words. The set grows as needed when inserting
//! rows beyond the current capacity, and equality ignores trailing zero words.

use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};

/// A set of row indices backed by a vector of u64 words.
#[derive(Clone, Default)]
pub struct RowSet {
    /// Storage: each u64 holds 64 rows
    words: Vec<u64>,
    /// Number of set bits (cached for O(1) len())
    count: usize,
}

impl RowSet {
    /// Number of bits per word.
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty row set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty row set able to hold `capacity` rows without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; Self::words_for(capacity)],
            count: 0,
        }
    }

    /// Creates the set `{0, 1, ..., n_rows - 1}`.
    pub fn full(n_rows: usize) -> Self {
        let mut words = vec![u64::MAX; n_rows / Self::BITS_PER_WORD];
        let rem = n_rows % Self::BITS_PER_WORD;
        if rem > 0 {
            words.push((1u64 << rem) - 1);
        }
        Self { words, count: n_rows }
    }

    /// Creates the set of indices at which `flags` is true.
    pub fn from_bools(flags: &[bool]) -> Self {
        let mut set = Self::with_capacity(flags.len());
        for (i, &f) in flags.iter().enumerate() {
            if f {
                set.insert(i);
            }
        }
        set
    }

    /// Returns a vector of `n_rows` flags, true for rows in the set.
    pub fn to_bools(&self, n_rows: usize) -> Vec<bool> {
        (0..n_rows).map(|i| self.contains(i)).collect()
    }

    #[inline]
    fn words_for(bits: usize) -> usize {
        (bits + Self::BITS_PER_WORD - 1) / Self::BITS_PER_WORD
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    /// Returns the number of rows in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the set holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if `row` is in the set.
    #[inline]
    pub fn contains(&self, row: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(row);
        match self.words.get(word_idx) {
            Some(word) => (word >> bit_idx) & 1 != 0,
            None => false,
        }
    }

    /// Adds `row`. Returns true if it was not previously present.
    #[inline]
    pub fn insert(&mut self, row: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(row);

        // Grow if necessary
        if word_idx >= self.words.len() {
            self.words.resize(word_idx + 1, 0);
        }

        let mask = 1u64 << bit_idx;
        let was_clear = (self.words[word_idx] & mask) == 0;
        if was_clear {
            self.words[word_idx] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Removes `row`. Returns true if it was present.
    #[inline]
    pub fn remove(&mut self, row: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(row);
        if word_idx >= self.words.len() {
            return false;
        }
        let mask = 1u64 << bit_idx;
        let was_set = (self.words[word_idx] & mask) != 0;
        if was_set {
            self.words[word_idx] &= !mask;
            self.count -= 1;
        }
        was_set
    }

    /// Removes all rows.
    pub fn clear(&mut self) {
        self.words.clear();
        self.count = 0;
    }

    /// Returns an iterator over the rows in increasing order.
    pub fn iter(&self) -> RowSetIter<'_> {
        RowSetIter {
            set: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    fn from_words(mut words: Vec<u64>) -> Self {
        while words.last() == Some(&0) {
            words.pop();
        }
        let count = words.iter().map(|w| w.count_ones() as usize).sum();
        Self { words, count }
    }

    fn zip_words(&self, other: &Self, f: impl Fn(u64, u64) -> u64) -> Self {
        let n = self.words.len().max(other.words.len());
        let words = (0..n)
            .map(|i| {
                let a = self.words.get(i).copied().unwrap_or(0);
                let b = other.words.get(i).copied().unwrap_or(0);
                f(a, b)
            })
            .collect();
        Self::from_words(words)
    }

    pub fn union(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a | b)
    }

    pub fn intersection(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a & b)
    }

    pub fn difference(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a & !b)
    }

    /// Size of the intersection, without materializing it.
    pub fn intersection_len(&self, other: &Self) -> usize {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Returns true if every row of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.words.iter().enumerate().all(|(i, &a)| {
            let b = other.words.get(i).copied().unwrap_or(0);
            a & !b == 0
        })
    }

    /// Jaccard similarity `|A ∩ B| / |A ∪ B|`; two empty sets have similarity 0.
    pub fn jaccard(&self, other: &Self) -> f64 {
        let inter = self.intersection_len(other);
        let union = self.len() + other.len() - inter;
        if union == 0 {
            0.0
        } else {
            inter as f64 / union as f64
        }
    }
}

impl PartialEq for RowSet {
    fn eq(&self, other: &Self) -> bool {
        if self.count != other.count {
            return false;
        }
        let n = self.words.len().max(other.words.len());
        (0..n).all(|i| self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0))
    }
}

impl Eq for RowSet {}

impl fmt::Debug for RowSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for RowSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<usize> for RowSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for row in iter {
            self.insert(row);
        }
    }
}

impl BitOr for &RowSet {
    type Output = RowSet;

    fn bitor(self, rhs: Self) -> RowSet {
        self.union(rhs)
    }
}

impl BitAnd for &RowSet {
    type Output = RowSet;

    fn bitand(self, rhs: Self) -> RowSet {
        self.intersection(rhs)
    }
}

impl Sub for &RowSet {
    type Output = RowSet;

    fn sub(self, rhs: Self) -> RowSet {
        self.difference(rhs)
    }
}

/// Iterator over the rows of a [`RowSet`].
pub struct RowSetIter<'a> {
    set: &'a RowSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for RowSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_idx = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // Clear lowest set bit
                return Some(self.word_idx * RowSet::BITS_PER_WORD + bit_idx);
            }
            self.word_idx += 1;
            if self.word_idx >= self.set.words.len() {
                return None;
            }
            self.current_word = self.set.words[self.word_idx];
        }
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = usize;
    type IntoIter = RowSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let rs = RowSet::new();
        assert!(rs.is_empty());
        assert_eq!(rs.len(), 0);
        assert!(!rs.contains(0));
        assert!(!rs.contains(100));
    }

    #[test]
    fn test_insert_remove() {
        let mut rs = RowSet::with_capacity(100);
        assert!(rs.insert(42));
        assert!(!rs.insert(42)); // Already set
        assert!(rs.contains(42));
        assert!(rs.remove(42));
        assert!(!rs.remove(42));
        assert!(rs.is_empty());
    }

    #[test]
    fn test_full() {
        let rs = RowSet::full(70);
        assert_eq!(rs.len(), 70);
        assert!(rs.contains(0));
        assert!(rs.contains(69));
        assert!(!rs.contains(70));
        assert_eq!(RowSet::full(64).iter().count(), 64);
    }

    #[test]
    fn test_iter_across_words() {
        let rs: RowSet = [65, 3, 10, 64, 5].into_iter().collect();
        assert_eq!(rs.iter().collect::<Vec<_>>(), vec![3, 5, 10, 64, 65]);
    }

    #[test]
    fn test_set_operations() {
        let a: RowSet = [1, 2, 3, 100].into_iter().collect();
        let b: RowSet = [2, 3, 4].into_iter().collect();
        assert_eq!((&a | &b).iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 100]);
        assert_eq!((&a & &b).iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!((&a - &b).iter().collect::<Vec<_>>(), vec![1, 100]);
        assert_eq!((&b - &a).len(), 1);
        assert!((&a & &b).is_subset(&a));
        assert!(!a.is_subset(&b));
    }

    #[test]
    fn test_equality_ignores_capacity() {
        let mut a = RowSet::with_capacity(1000);
        a.insert(3);
        let b: RowSet = [3].into_iter().collect();
        assert_eq!(a, b);
        let c = &a - &b;
        assert_eq!(c, RowSet::new());
    }

    #[test]
    fn test_jaccard() {
        let a: RowSet = [0, 1, 2, 3].into_iter().collect();
        let b: RowSet = [2, 3, 4, 5].into_iter().collect();
        assert!((a.jaccard(&b) - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(a.jaccard(&a), 1.0);
        assert_eq!(RowSet::new().jaccard(&RowSet::new()), 0.0);
    }

    #[test]
    fn test_bools_round_trip() {
        let flags = [true, false, false, true, true];
        let rs = RowSet::from_bools(&flags);
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.to_bools(5), flags.to_vec());
    }
}
