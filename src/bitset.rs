//! Growable bit set used for variable masks, clause masks and literal sets.
//!
//! Two bit sets compare equal (and hash equally) when they contain the same
//! indices, regardless of how many trailing zero words each one carries. This
//! makes them usable directly as cache keys.

use std::hash::{Hash, Hasher};

/// A simple bit set backed by a vector of u64 words.
///
/// The bit set grows automatically when bits beyond the current capacity
/// are set.
#[derive(Debug, Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
    /// Number of set bits (cached for O(1) `len()`).
    count: usize,
}

impl BitSet {
    const BITS_PER_WORD: usize = 64;

    /// Creates a new empty bit set with the given capacity (in bits).
    pub fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(Self::BITS_PER_WORD);
        Self {
            words: vec![0; num_words],
            count: 0,
        }
    }

    /// Creates an empty bit set with no pre-allocated capacity.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    /// Returns true if the bit at the given index is set.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        match self.words.get(word_idx) {
            Some(word) => (word >> bit_idx) & 1 != 0,
            None => false,
        }
    }

    /// Sets the bit at the given index. Returns true if the bit was not previously set.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        if word_idx >= self.words.len() {
            self.words.resize(word_idx + 1, 0);
        }
        let mask = 1u64 << bit_idx;
        let was_clear = self.words[word_idx] & mask == 0;
        if was_clear {
            self.words[word_idx] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Clears the bit at the given index. Returns true if the bit was previously set.
    #[inline]
    pub fn remove(&mut self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        if word_idx >= self.words.len() {
            return false;
        }
        let mask = 1u64 << bit_idx;
        let was_set = self.words[word_idx] & mask != 0;
        if was_set {
            self.words[word_idx] &= !mask;
            self.count -= 1;
        }
        was_set
    }

    /// Clears all bits, keeping the allocation.
    pub fn clear(&mut self) {
        self.words.fill(0);
        self.count = 0;
    }

    /// Sets every bit yielded by the iterator.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = usize>) {
        for index in iter {
            self.insert(index);
        }
    }

    /// In-place union: `self |= other`.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= *o;
        }
        self.recount();
    }

    /// Returns `self & other`.
    pub fn intersection(&self, other: &BitSet) -> BitSet {
        let words: Vec<u64> = self.words.iter().zip(&other.words).map(|(a, b)| a & b).collect();
        let mut result = BitSet { words, count: 0 };
        result.recount();
        result
    }

    /// Returns `self \ other`.
    pub fn difference(&self, other: &BitSet) -> BitSet {
        let words: Vec<u64> = self
            .words
            .iter()
            .enumerate()
            .map(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0))
            .collect();
        let mut result = BitSet { words, count: 0 };
        result.recount();
        result
    }

    /// Returns true if `self` and `other` share at least one bit.
    pub fn intersects(&self, other: &BitSet) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    /// Returns true if every bit of `self` is also set in `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0) == 0)
    }

    fn recount(&mut self) {
        self.count = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }

    /// Words with trailing zero words stripped; the basis of `Eq` and `Hash`.
    fn significant_words(&self) -> &[u64] {
        let end = self.words.iter().rposition(|&w| w != 0).map_or(0, |i| i + 1);
        &self.words[..end]
    }

    /// Returns an iterator over all set bit indices, in increasing order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            bitset: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.significant_words() == other.significant_words()
    }
}

impl Eq for BitSet {}

impl Hash for BitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut bs = BitSet::empty();
        bs.extend(iter);
        bs
    }
}

/// Iterator over set bits in a BitSet.
pub struct BitSetIter<'a> {
    bitset: &'a BitSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_idx = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit_idx);
            }
            self.word_idx += 1;
            if self.word_idx >= self.bitset.words.len() {
                return None;
            }
            self.current_word = self.bitset.words[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_log::test;

    use super::*;
    use crate::literal::Literal;

    #[test]
    fn test_literal_slots() {
        let mut trail = BitSet::empty();
        assert!(trail.is_empty());
        assert!(!trail.contains(Literal::positive(7).index()));

        assert!(trail.insert(Literal::positive(7).index()));
        assert!(!trail.insert(Literal::positive(7).index()));
        assert!(!trail.contains(Literal::negative(7).index()));
        // Slots beyond the initial capacity grow the set.
        assert!(trail.insert(Literal::negative(500).index()));
        assert_eq!(trail.len(), 2);

        assert!(trail.remove(Literal::positive(7).index()));
        assert!(!trail.remove(Literal::positive(7).index()));
        assert_eq!(trail.iter().map(Literal::from_index).collect::<Vec<_>>(), vec![Literal::negative(500)]);
    }

    #[test]
    fn test_iter() {
        let bs: BitSet = [5, 10, 3, 64, 65].into_iter().collect();
        let indices: Vec<_> = bs.iter().collect();
        assert_eq!(indices, vec![3, 5, 10, 64, 65]);
    }

    #[test]
    fn test_set_operations() {
        let a: BitSet = [1, 2, 3, 70].into_iter().collect();
        let b: BitSet = [2, 3, 4].into_iter().collect();

        let i = a.intersection(&b);
        assert_eq!(i.iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(i.len(), 2);

        let d = a.difference(&b);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![1, 70]);

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 70]);
        assert_eq!(u.len(), 5);

        assert!(a.intersects(&b));
        assert!(i.is_subset(&a));
        assert!(i.is_subset(&b));
        assert!(!a.is_subset(&b));
    }

    #[test]
    fn test_eq_ignores_capacity() {
        let mut big = BitSet::new(1024);
        big.insert(3);
        let mut small = BitSet::empty();
        small.insert(3);
        assert_eq!(big, small);

        let mut keys = HashSet::new();
        keys.insert(big);
        assert!(keys.contains(&small));

        // Removing the high bit leaves a trailing zero word behind.
        let mut grown: BitSet = [3, 900].into_iter().collect();
        grown.remove(900);
        assert_eq!(grown, small);
        assert!(keys.contains(&grown));
    }

    #[test]
    fn test_clear_keeps_equality() {
        let mut clauses: BitSet = [1, 50, 99].into_iter().collect();
        clauses.clear();
        assert!(clauses.is_empty());
        assert_eq!(clauses, BitSet::new(10));
    }
}
