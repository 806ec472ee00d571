// Weak-sum index over a loaded signature.
//
// Buckets come from `HashCfg` and hold chains of block indices. Indices are
// stored with HASH_OFFSET added so that 0 means "empty". Chains are linked
// in reverse build order, which makes iteration visit blocks in ascending
// index order.

use super::rolling::HashCfg;
use crate::error::{Error, Result};
use crate::format::signature::{BlockSig, Signature};

const HASH_OFFSET: u32 = 1;

/// Read-only lookup from weak sum to candidate blocks.
///
/// Built once from a complete [`Signature`]; safe to share between any
/// number of concurrent delta jobs.
#[derive(Debug, Clone)]
pub struct HashIndex {
    sig: Signature,
    cfg: HashCfg,
    /// `heads[bucket]` = first block index in the bucket + HASH_OFFSET, or 0.
    heads: Vec<u32>,
    /// `next[block]` = following block index in the same bucket + HASH_OFFSET, or 0.
    next: Vec<u32>,
}

impl HashIndex {
    /// Index every block of `sig`.
    pub fn build(sig: Signature) -> Result<Self> {
        let n = sig.len();
        if n >= (u32::MAX - HASH_OFFSET) as usize {
            return Err(Error::param(format!("signature has too many blocks ({n})")));
        }
        let cfg = HashCfg::new(n);
        let mut heads = Vec::new();
        heads.try_reserve_exact(cfg.size)?;
        heads.resize(cfg.size, 0u32);
        let mut next = Vec::new();
        next.try_reserve_exact(n)?;
        next.resize(n, 0u32);

        for (i, block) in sig.blocks().iter().enumerate().rev() {
            let bucket = cfg.bucket(block.weak);
            next[i] = heads[bucket];
            heads[bucket] = i as u32 + HASH_OFFSET;
        }

        log::debug!(
            "hash index: {} blocks in {} buckets (block_len {}, strong_len {})",
            n,
            cfg.size,
            sig.block_len(),
            sig.strong_len()
        );
        Ok(Self {
            sig,
            cfg,
            heads,
            next,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    pub fn into_signature(self) -> Signature {
        self.sig
    }

    /// Number of indexed blocks.
    pub fn len(&self) -> usize {
        self.sig.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sig.is_empty()
    }

    /// Block `index` of the underlying signature.
    #[inline]
    pub fn block(&self, index: usize) -> &BlockSig {
        &self.sig.blocks()[index]
    }

    /// Blocks whose weak sum equals `weak`, in ascending index order.
    #[inline]
    pub fn candidates(&self, weak: u32) -> Candidates<'_> {
        let cursor = if self.heads.is_empty() {
            0
        } else {
            self.heads[self.cfg.bucket(weak)]
        };
        Candidates {
            index: self,
            weak,
            cursor,
        }
    }

}

/// Iterator over block indices sharing a weak sum.
pub struct Candidates<'a> {
    index: &'a HashIndex,
    weak: u32,
    cursor: u32,
}

impl Iterator for Candidates<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.cursor != 0 {
            let i = (self.cursor - HASH_OFFSET) as usize;
            self.cursor = self.index.next[i];
            if self.index.sig.blocks()[i].weak == self.weak {
                return Some(i);
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
    use crate::hash::strong::StrongSum;

    fn sig_with_weaks(weaks: &[u32]) -> Signature {
        let mut sig = Signature::new(SignatureMagic::Blake2, 16, 4).unwrap();
        for (i, &weak) in weaks.iter().enumerate() {
            let strong = StrongSum::from_slice(&(i as u32).to_be_bytes()).unwrap();
            sig.push(BlockSig { weak, strong }).unwrap();
        }
        sig
    }

    #[test]
    fn empty_signature_has_no_candidates() {
        let index = HashIndex::build(sig_with_weaks(&[])).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.candidates(0).count(), 0);
        assert!(index.candidates(12345).next().is_none());
    }

    #[test]
    fn duplicate_weaks_are_all_returned_in_order() {
        let index = HashIndex::build(sig_with_weaks(&[7, 9, 7, 7, 11])).unwrap();
        assert_eq!(index.candidates(7).collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(index.candidates(9).collect::<Vec<_>>(), vec![1]);
        assert_eq!(index.candidates(8).count(), 0);
    }

    #[test]
    fn bucket_collisions_filter_by_exact_weak() {
        // Fewer buckets than distinct weak sums forces sharing.
        let weaks: Vec<u32> = (0..200u32).map(|i| i.wrapping_mul(0x9E37_79B9)).collect();
        let index = HashIndex::build(sig_with_weaks(&weaks)).unwrap();
        assert!(index.cfg.size < weaks.len());
        let mut per_bucket = vec![0usize; index.cfg.size];
        for &w in &weaks {
            per_bucket[index.cfg.bucket(w)] += 1;
        }
        assert!(per_bucket.iter().any(|&n| n >= 2));
        for (i, &w) in weaks.iter().enumerate() {
            assert_eq!(index.candidates(w).collect::<Vec<_>>(), vec![i]);
        }
    }

    #[test]
    fn index_keeps_signature() {
        let sig = sig_with_weaks(&[1, 2, 3]);
        let index = HashIndex::build(sig.clone()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.block(1).weak, 2);
        assert_eq!(index.into_signature(), sig);
    }

    #[test]
    fn index_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<HashIndex>();
    }
}
