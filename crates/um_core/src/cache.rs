//! Pre-decoded mirror of array 0.
//!
//! Re-decoding a word on every fetch costs roughly 30% of steady-state
//! throughput for a dispatch-loop-heavy guest, so array 0 is decoded once on
//! load and kept in sync with every store into it instead.

use crate::decode::{self, Instruction};

/// The decoded form of a single array-0 slot, or the raw opcode nibble that
/// made decoding fail. The error is captured once and reproduced verbatim if
/// the finger ever reaches it instead of being re-parsed.
pub type CacheEntry = Result<Instruction, u32>;

#[derive(Default)]
pub struct DecodeCache {
    entries: Vec<CacheEntry>,
}

impl DecodeCache {
    pub fn rebuild(words: &[u32]) -> Self {
        let entries = words.iter().map(|&w| decode::decode(w)).collect();
        DecodeCache { entries }
    }

    /// Re-decode exactly one slot, following an `amend` on array 0.
    pub fn invalidate(&mut self, index: usize, word: u32) {
        self.entries[index] = decode::decode(word);
    }

    pub fn get(&self, index: usize) -> Option<CacheEntry> {
        self.entries.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Instruction;

    #[test]
    fn rebuild_mirrors_array_length() {
        let words = vec![7 << 28, 7 << 28, 7 << 28];
        let cache = DecodeCache::rebuild(&words);
        assert_eq!(cache.len(), words.len());
        assert_eq!(cache.get(0), Some(Ok(Instruction::Halt)));
    }

    #[test]
    fn invalidate_redecodes_a_single_slot() {
        let mut cache = DecodeCache::rebuild(&[7 << 28, 7 << 28]);
        cache.invalidate(1, 3 << 28); // add
        assert_eq!(cache.get(0), Some(Ok(Instruction::Halt)));
        assert!(matches!(cache.get(1), Some(Ok(Instruction::Add { .. }))));
    }

    #[test]
    fn invalid_opcode_is_cached_as_an_error() {
        let cache = DecodeCache::rebuild(&[14 << 28]);
        assert_eq!(cache.get(0), Some(Err(14)));
    }
}
