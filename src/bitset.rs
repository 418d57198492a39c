//! Growable BitSet backed by a Vec<u64>.
//! Used as the archetype signature: bit `i` set means component type `i` is stored.
//!
//! Signatures with different backing lengths compare and hash as if the
//! shorter one were zero-padded.

use std::fmt;
use std::hash::{Hash, Hasher};

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new BitSet capable of holding at least `capacity` bits.
    pub fn with_capacity(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(WORD_BITS);
        Self {
            words: vec![0; num_words],
        }
    }

    /// Build a set with exactly the given positions set.
    pub fn from_slice(positions: &[usize]) -> Self {
        positions.iter().copied().collect()
    }

    /// Number of bits the backing store can hold without growing.
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    /// Set the bit at `index` to true.
    /// Doubles the backing store until it covers `index`.
    pub fn set(&mut self, index: usize) {
        let (word_idx, bit_idx) = split(index);
        self.ensure_word(word_idx);
        self.words[word_idx] |= 1u64 << bit_idx;
    }

    /// Clear the bit at `index`. Out-of-range positions are already clear.
    pub fn clear(&mut self, index: usize) {
        let (word_idx, bit_idx) = split(index);
        if let Some(word) = self.words.get_mut(word_idx) {
            *word &= !(1u64 << bit_idx);
        }
    }

    /// Flip the bit at `index`, growing like [`BitSet::set`].
    pub fn toggle(&mut self, index: usize) {
        let (word_idx, bit_idx) = split(index);
        self.ensure_word(word_idx);
        self.words[word_idx] ^= 1u64 << bit_idx;
    }

    /// Check if the bit at `index` is set.
    pub fn contains(&self, index: usize) -> bool {
        let (word_idx, bit_idx) = split(index);
        match self.words.get(word_idx) {
            Some(word) => (word & (1u64 << bit_idx)) != 0,
            None => false,
        }
    }

    /// Set every bit the current backing store can hold.
    pub fn set_all(&mut self) {
        self.words.fill(u64::MAX);
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Population count across all words.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns true if this set shares any set bits with `other`.
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| (a & b) != 0)
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        !self.intersects(other)
    }

    /// Returns true if every bit set here is also set in `other`.
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.words.iter().enumerate().all(|(i, &word)| {
            let theirs = other.words.get(i).copied().unwrap_or(0);
            word & !theirs == 0
        })
    }

    /// Copy of this set with `index` also set.
    pub fn with(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.set(index);
        next
    }

    /// Copy of this set with `index` cleared.
    pub fn without(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.clear(index);
        next
    }

    /// Ascending list of set positions.
    pub fn to_vec(&self) -> Vec<usize> {
        self.ones().collect()
    }

    /// Raw backing words, least significant first.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns iterator over indices of set bits
    pub fn ones(&self) -> OnesIter<'_> {
        OnesIter {
            bitset: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    fn ensure_word(&mut self, word_idx: usize) {
        if word_idx < self.words.len() {
            return;
        }
        let mut len = self.words.len().max(1);
        while len <= word_idx {
            len *= 2;
        }
        self.words.resize(len, 0);
    }

    /// Words with trailing zero words trimmed, the canonical form for eq/hash.
    fn significant_words(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |i| i + 1);
        &self.words[..len]
    }
}

#[inline]
fn split(index: usize) -> (usize, usize) {
    (index / WORD_BITS, index % WORD_BITS)
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for BitSet {}

impl Hash for BitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        for index in iter {
            set.set(index);
        }
        set
    }
}

/// Hexadecimal dump, most significant word first, 16 digits per word.
impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.words.is_empty() {
            return write!(f, "0");
        }
        for word in self.words.iter().rev() {
            write!(f, "{word:016x}")?;
        }
        Ok(())
    }
}

pub struct OnesIter<'a> {
    bitset: &'a BitSet,
    word_idx: usize,
    current_word: u64,
}

impl<'a> Iterator for OnesIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let trailing = self.current_word.trailing_zeros();
                self.current_word &= !(1u64 << trailing); // Clear the bit we just found
                return Some(self.word_idx * WORD_BITS + trailing as usize);
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
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(set: &BitSet) -> u64 {
        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_round_trip_across_words() {
        let set = BitSet::from_slice(&[1000, 64, 0, 63, 31, 32, 64, 0]);
        assert_eq!(set.to_vec(), vec![0, 31, 32, 63, 64, 1000]);
        assert_eq!(set.count_ones(), 6);
    }

    #[test]
    fn test_set_grows_by_doubling() {
        let mut set = BitSet::with_capacity(64);
        assert_eq!(set.capacity(), 64);
        set.set(200);
        assert_eq!(set.capacity(), 256);
        assert!(set.contains(200));
    }

    #[test]
    fn test_clear_and_test_out_of_range_do_not_grow() {
        let mut set = BitSet::with_capacity(10);
        set.clear(500);
        assert!(!set.contains(500));
        assert_eq!(set.capacity(), 64);

        set.toggle(100);
        assert!(set.contains(100));
        set.toggle(100);
        assert!(!set.contains(100));
    }

    #[test]
    fn test_mixed_operations() {
        let mut set = BitSet::with_capacity(64);
        for i in [10, 20, 30, 40] {
            set.set(i);
        }
        set.toggle(20);
        set.toggle(25);
        assert!(!set.contains(20));
        assert!(set.contains(25));
        assert_eq!(set.count_ones(), 4);

        set.clear(30);
        assert_eq!(set.count_ones(), 3);

        set.set_all();
        assert_eq!(set.count_ones(), 64);
        set.clear_all();
        assert_eq!(set.count_ones(), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_empty_set_operations() {
        let mut set = BitSet::with_capacity(0);
        set.set_all();
        set.clear_all();
        assert_eq!(set.count_ones(), 0);
        assert_eq!(set.to_string(), "0");
    }

    #[test]
    fn test_equality_ignores_backing_length() {
        let short = BitSet::from_slice(&[1, 5]);
        let mut long = BitSet::with_capacity(512);
        long.set(1);
        long.set(5);
        assert_eq!(short, long);
        assert_eq!(hash_of(&short), hash_of(&long));

        long.set(300);
        assert_ne!(short, long);
        assert_eq!(BitSet::new(), BitSet::with_capacity(256));
    }

    #[test]
    fn test_subset_and_disjoint() {
        let pos_vel = BitSet::from_slice(&[0, 1]);
        let pos_vel_health = BitSet::from_slice(&[0, 1, 2]);
        let health = BitSet::from_slice(&[2]);

        assert!(pos_vel.is_subset_of(&pos_vel_health));
        assert!(!pos_vel_health.is_subset_of(&pos_vel));
        assert!(BitSet::new().is_subset_of(&pos_vel));
        assert!(health.is_disjoint(&pos_vel));
        assert!(health.intersects(&pos_vel_health));
    }

    #[test]
    fn test_with_without() {
        let base = BitSet::from_slice(&[3]);
        assert_eq!(base.with(70).to_vec(), vec![3, 70]);
        assert_eq!(base.without(3), BitSet::new());
        assert_eq!(base.to_vec(), vec![3]);
    }

    #[test]
    fn test_display_hex() {
        let set = BitSet::from_slice(&[0, 4, 64]);
        assert_eq!(
            set.to_string(),
            "00000000000000010000000000000011"
        );
    }
}
