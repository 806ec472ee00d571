// Candidate verification for the delta encoder.
//
// A window is looked up by weak sum first; each candidate is then confirmed
// with the strong sum, computed at most once per window. Among confirmed
// blocks the one that extends the pending copy wins, otherwise the lowest
// index. Windows shorter than a block can only be the final basis block.

use super::rolling::{RollingChecksum, WeakSum};
use super::strong::{StrongKind, StrongSum};
use super::table::HashIndex;

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

/// Outcome of probing one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// No block has this weak sum.
    Miss,
    /// Weak sum matched but no candidate's strong sum did.
    FalseMatch,
    /// Window is identical to this block.
    Hit(usize),
}

/// Verifies windows against a [`HashIndex`].
#[derive(Clone, Copy)]
pub struct Matcher<'a> {
    index: &'a HashIndex,
    strong_kind: StrongKind,
    strong_len: usize,
    block_len: usize,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a HashIndex) -> Self {
        let sig = index.signature();
        Self {
            index,
            strong_kind: sig.magic().strong_kind(),
            strong_len: sig.strong_len() as usize,
            block_len: sig.block_len() as usize,
        }
    }

    pub fn index(&self) -> &'a HashIndex {
        self.index
    }

    /// Index of the final block, if any.
    #[inline]
    pub fn last_block(&self) -> Option<usize> {
        self.index.len().checked_sub(1)
    }

    #[inline]
    fn strong_of(&self, data: &[u8]) -> StrongSum {
        self.strong_kind.truncated(data, self.strong_len)
    }

    /// Find a block equal to `window`, whose weak sum is `weak`.
    ///
    /// `expected` is the block that would continue the pending copy.
    pub fn find(&self, weak: u32, window: &[u8], expected: Option<usize>) -> Probe {
        let short = window.len() < self.block_len;
        let last = self.last_block();
        let mut strong: Option<StrongSum> = None;
        let mut seen = false;
        let mut first_hit = None;

        for i in self.index.candidates(weak) {
            if short && Some(i) != last {
                continue;
            }
            seen = true;
            let sum = *strong.get_or_insert_with(|| self.strong_of(window));
            if self.index.block(i).strong != sum {
                continue;
            }
            if Some(i) == expected {
                return Probe::Hit(i);
            }
            if first_hit.is_none() {
                first_hit = Some(i);
            }
            if expected.is_none_or(|e| i > e) {
                break;
            }
        }

        match first_hit {
            Some(i) => Probe::Hit(i),
            None if seen => Probe::FalseMatch,
            None => Probe::Miss,
        }
    }

    /// Look for a prefix of `window` equal to the final block.
    ///
    /// Used when the whole window did not match and the final block is
    /// next in line: either the pending copy stops right before it, or it is
    /// the only block and nothing is pending. That block may be shorter than
    /// `block_len` and followed by new bytes. Returns the prefix length.
    pub fn probe_tail(&self, window: &[u8], expected: Option<usize>) -> Option<usize> {
        let last = self.last_block()?;
        let next_in_line = match expected {
            Some(e) => e == last,
            None => last == 0,
        };
        if !next_in_line {
            return None;
        }
        let block = self.index.block(last);
        let mut sum = WeakSum::new(self.index.signature().magic().weak_kind());
        for (n, &b) in window.iter().enumerate() {
            let len = n + 1;
            if len >= window.len() || len >= self.block_len {
                break;
            }
            sum.roll_in(b);
            if sum.digest() == block.weak && self.strong_of(&window[..len]) == block.strong {
                return Some(len);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::magic::SignatureMagic;
    use crate::format::signature::Signature;

    fn index_of(basis: &[u8], block_len: u32, magic: SignatureMagic) -> HashIndex {
        let mut sig = Signature::new(magic, block_len, 8).unwrap();
        for chunk in basis.chunks(block_len as usize) {
            let block = sig.checksum_block(chunk);
            sig.push(block).unwrap();
        }
        HashIndex::build(sig).unwrap()
    }

    fn weak(magic: SignatureMagic, data: &[u8]) -> u32 {
        WeakSum::of(magic.weak_kind(), data)
    }

    #[test]
    fn distinct_blocks_are_found() {
        let m = SignatureMagic::RkBlake2;
        let index = index_of(b"abcdefghijkl", 4, m);
        let matcher = Matcher::new(&index);
        assert_eq!(matcher.find(weak(m, b"efgh"), b"efgh", None), Probe::Hit(1));
        assert_eq!(matcher.find(weak(m, b"zzzz"), b"zzzz", None), Probe::Miss);
    }

    #[test]
    fn identical_blocks_prefer_continuation() {
        let m = SignatureMagic::Blake2;
        let index = index_of(&[b'A'; 16], 4, m);
        let matcher = Matcher::new(&index);
        let w = weak(m, b"AAAA");
        assert_eq!(matcher.find(w, b"AAAA", None), Probe::Hit(0));
        assert_eq!(matcher.find(w, b"AAAA", Some(2)), Probe::Hit(2));
        // Continuation beyond the last block falls back to the lowest.
        assert_eq!(matcher.find(w, b"AAAA", Some(4)), Probe::Hit(0));
    }

    #[test]
    fn weak_collision_is_false_match() {
        let m = SignatureMagic::Md4;
        // Rollsum is order-insensitive in s1 but not s2; swap two pairs so
        // both accumulators agree.
        let index = index_of(b"abba", 4, m);
        let matcher = Matcher::new(&index);
        assert_eq!(weak(m, b"abba"), weak(m, b"baab"));
        assert_eq!(matcher.find(weak(m, b"baab"), b"baab", None), Probe::FalseMatch);
    }

    #[test]
    fn short_window_only_matches_final_block() {
        let m = SignatureMagic::RkMd4;
        let index = index_of(b"abcdab", 4, m);
        let matcher = Matcher::new(&index);
        assert_eq!(matcher.find(weak(m, b"ab"), b"ab", None), Probe::Hit(1));
        let index = index_of(b"abcd", 4, m);
        let matcher = Matcher::new(&index);
        assert_eq!(matcher.find(weak(m, b"abc"), b"abc", None), Probe::Miss);
    }

    #[test]
    fn tail_probe_finds_short_final_block() {
        let m = SignatureMagic::RkBlake2;
        let index = index_of(b"AAAAAAAAAA", 4, m); // AAAA AAAA AA
        let matcher = Matcher::new(&index);
        assert_eq!(matcher.probe_tail(b"AAXX", Some(2)), Some(2));
        assert_eq!(matcher.probe_tail(b"AAX", Some(2)), Some(2));
        assert_eq!(matcher.probe_tail(b"AAXX", Some(1)), None);
        assert_eq!(matcher.probe_tail(b"AAXX", None), None);
        assert_eq!(matcher.probe_tail(b"BBXX", Some(2)), None);
    }

    #[test]
    fn tail_probe_on_single_short_block() {
        let m = SignatureMagic::Md4;
        let index = index_of(b"AAA", 8, m);
        let matcher = Matcher::new(&index);
        assert_eq!(matcher.probe_tail(b"AAAX", None), Some(3));
        assert_eq!(matcher.probe_tail(b"AAAXYZWV", None), Some(3));
        assert_eq!(matcher.probe_tail(b"AAA", None), None);
        assert_eq!(matcher.probe_tail(b"BAAX", None), None);
    }

    #[test]
    fn empty_index_never_matches() {
        let index = index_of(b"", 4, SignatureMagic::Blake2);
        let matcher = Matcher::new(&index);
        assert_eq!(matcher.last_block(), None);
        assert_eq!(matcher.find(0, b"", None), Probe::Miss);
        assert_eq!(matcher.probe_tail(b"abc", Some(0)), None);
    }
}
