// Signature parameter negotiation.
//
// `recommend` fills in whatever the caller left unspecified from the
// expected basis size, and rejects explicit values that cannot work.

use std::fmt;

use crate::error::{Error, Result};
use crate::format::magic::SignatureMagic;
use crate::format::signature::check_strong_len;

/// Block length when the basis size is unknown.
pub const DEFAULT_BLOCK_LEN: u32 = 2048;

/// Block length for small bases (up to `SMALL_FILE_LIMIT` bytes).
pub const SMALL_FILE_BLOCK_LEN: u32 = 256;

/// Largest basis that still gets `SMALL_FILE_BLOCK_LEN` blocks.
pub const SMALL_FILE_LIMIT: u64 = 256 * 256;

/// Minimum safe strong length when the basis size is unknown.
pub const DEFAULT_MIN_STRONG_LEN: u32 = 12;

/// How the strong sum length should be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrongLenRequest {
    /// Minimum when the basis size is known, otherwise the full digest.
    #[default]
    Default,
    /// Smallest length still safe against accidental collisions.
    Minimum,
    /// Full untruncated digest.
    Maximum,
    /// Exactly this many bytes.
    Exact(u32),
}

/// Parameters for building a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureArgs {
    pub magic: SignatureMagic,
    pub block_len: u32,
    pub strong_len: u32,
}

impl Default for SignatureArgs {
    fn default() -> Self {
        Self {
            magic: SignatureMagic::default(),
            block_len: DEFAULT_BLOCK_LEN,
            strong_len: SignatureMagic::default().max_strong_len() as u32,
        }
    }
}

impl SignatureArgs {
    /// Explicit parameters, validated.
    pub fn new(magic: SignatureMagic, block_len: u32, strong_len: u32) -> Result<Self> {
        let args = Self {
            magic,
            block_len,
            strong_len,
        };
        args.validate()?;
        Ok(args)
    }

    /// Recommended parameters for a basis of `old_size` bytes.
    pub fn for_size(old_size: Option<u64>) -> Self {
        recommend(old_size, None, None, StrongLenRequest::Default).unwrap_or_default()
    }

    /// Check the combination is usable.
    pub fn validate(&self) -> Result<()> {
        if self.block_len == 0 {
            return Err(Error::param("block length must be non-zero"));
        }
        check_strong_len(self.magic, self.strong_len).map_err(Error::Param)
    }
}

impl fmt::Display for SignatureArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "magic={} ({:#010x}) block_len={} strong_len={}",
            self.magic.name(),
            self.magic.as_u32(),
            self.block_len,
            self.strong_len
        )
    }
}

/// Floor of log2, with `ln2(0) == 0`.
fn ln2(v: u64) -> u32 {
    if v == 0 { 0 } else { 63 - v.leading_zeros() }
}

/// Block length recommended for a basis of `size` bytes.
pub fn recommended_block_len(size: Option<u64>) -> u32 {
    match size {
        None => DEFAULT_BLOCK_LEN,
        Some(n) if n <= SMALL_FILE_LIMIT => SMALL_FILE_BLOCK_LEN,
        Some(n) => (n.isqrt() & !127) as u32,
    }
}

/// Smallest strong length that keeps accidental collisions unlikely.
pub fn min_strong_len(size: Option<u64>, block_len: u32, magic: SignatureMagic) -> u32 {
    let max = magic.max_strong_len() as u32;
    let min = match size {
        None => DEFAULT_MIN_STRONG_LEN,
        Some(n) => {
            let blocks = (n / u64::from(block_len.max(1))).saturating_add(1);
            2 + (ln2(n.saturating_add(1 << 24)) + ln2(blocks) + 7) / 8
        }
    };
    min.min(max)
}

/// Fill in unspecified signature parameters.
///
/// `old_size` is the expected basis length if known. Explicit values are
/// checked: a zero block length or a strong length outside the digest
/// range is a parameter error. An exact strong length below the safe
/// minimum is accepted with a warning.
pub fn recommend(
    old_size: Option<u64>,
    magic: Option<SignatureMagic>,
    block_len: Option<u32>,
    strong_len: StrongLenRequest,
) -> Result<SignatureArgs> {
    let magic = magic.unwrap_or_default();
    let block_len = match block_len {
        Some(0) => return Err(Error::param("block length must be non-zero")),
        Some(n) => n,
        None => recommended_block_len(old_size),
    };
    let max = magic.max_strong_len() as u32;
    let min = min_strong_len(old_size, block_len, magic);
    let strong_len = match strong_len {
        StrongLenRequest::Default if old_size.is_some() => min,
        StrongLenRequest::Default | StrongLenRequest::Maximum => max,
        StrongLenRequest::Minimum => min,
        StrongLenRequest::Exact(n) => {
            check_strong_len(magic, n).map_err(Error::Param)?;
            if n < min {
                log::warn!(
                    "strong length {n} is below the recommended minimum {min} for this basis"
                );
            }
            n
        }
    };
    let args = SignatureArgs {
        magic,
        block_len,
        strong_len,
    };
    log::debug!("recommended signature parameters: {args}");
    Ok(args)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
