// Strong block digests: MD4 (legacy, 16 bytes) and BLAKE2b-256.
//
// Signatures store only the first `strong_len` bytes of the digest.

use std::fmt;

use blake2::Blake2b;
use blake2::digest::consts::U32;
use digest::Digest;
use md4::Md4;

type Blake2b256 = Blake2b<U32>;

/// Longest strong sum any magic can carry.
pub const MAX_STRONG_LEN: usize = 32;

/// MD4 digest length.
pub const MD4_SUM_LEN: usize = 16;

/// BLAKE2b digest length as used by librsync signatures.
pub const BLAKE2_SUM_LEN: usize = 32;

/// Which strong hash a signature uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrongKind {
    Md4,
    Blake2,
}

impl StrongKind {
    /// Full untruncated digest length.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md4 => MD4_SUM_LEN,
            Self::Blake2 => BLAKE2_SUM_LEN,
        }
    }

    /// Full digest of `data`.
    pub fn digest(self, data: &[u8]) -> StrongSum {
        let mut sum = StrongSum::default();
        match self {
            Self::Md4 => {
                let out = Md4::digest(data);
                sum.bytes[..MD4_SUM_LEN].copy_from_slice(&out);
                sum.len = MD4_SUM_LEN as u8;
            }
            Self::Blake2 => {
                let out = Blake2b256::digest(data);
                sum.bytes.copy_from_slice(&out);
                sum.len = BLAKE2_SUM_LEN as u8;
            }
        }
        sum
    }

    /// Digest of `data` truncated to `len` bytes.
    pub fn truncated(self, data: &[u8], len: usize) -> StrongSum {
        self.digest(data).truncate(len)
    }
}

/// A (possibly truncated) strong digest stored inline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StrongSum {
    bytes: [u8; MAX_STRONG_LEN],
    len: u8,
}

impl StrongSum {
    /// Build from raw stored bytes. Returns `None` if longer than 32 bytes.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() > MAX_STRONG_LEN {
            return None;
        }
        let mut sum = Self::default();
        sum.bytes[..data.len()].copy_from_slice(data);
        sum.len = data.len() as u8;
        Some(sum)
    }

    /// Keep the first `len` bytes (no-op if already shorter).
    pub fn truncate(mut self, len: usize) -> Self {
        let len = len.min(self.len as usize);
        self.bytes[len..].fill(0);
        self.len = len as u8;
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for StrongSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.as_bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
