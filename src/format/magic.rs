// Stream magic numbers (big-endian u32 at the start of every stream).
//
// A signature magic fixes both the weak-sum family and the strong hash;
// the two are never chosen independently.

use crate::error::{Error, Result};
use crate::hash::rolling::WeakKind;
use crate::hash::strong::StrongKind;

/// Delta stream magic, "rs\x026".
pub const DELTA_MAGIC: u32 = 0x7273_0236;

/// Signature format identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum SignatureMagic {
    /// Rollsum + MD4, "rs\x016". Legacy; MD4 is not collision resistant.
    Md4 = 0x7273_0136,
    /// Rollsum + BLAKE2b, "rs\x017".
    Blake2 = 0x7273_0137,
    /// Rabin-Karp + MD4, "rs\x01F".
    RkMd4 = 0x7273_0146,
    /// Rabin-Karp + BLAKE2b, "rs\x01G".
    #[default]
    RkBlake2 = 0x7273_0147,
}

impl SignatureMagic {
    pub const ALL: [SignatureMagic; 4] = [Self::Md4, Self::Blake2, Self::RkMd4, Self::RkBlake2];

    /// Parse a raw magic value.
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0x7273_0136 => Ok(Self::Md4),
            0x7273_0137 => Ok(Self::Blake2),
            0x7273_0146 => Ok(Self::RkMd4),
            0x7273_0147 => Ok(Self::RkBlake2),
            other => Err(Error::BadMagic(other)),
        }
    }

    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub const fn weak_kind(self) -> WeakKind {
        match self {
            Self::Md4 | Self::Blake2 => WeakKind::Rollsum,
            Self::RkMd4 | Self::RkBlake2 => WeakKind::RabinKarp,
        }
    }

    pub const fn strong_kind(self) -> StrongKind {
        match self {
            Self::Md4 | Self::RkMd4 => StrongKind::Md4,
            Self::Blake2 | Self::RkBlake2 => StrongKind::Blake2,
        }
    }

    /// Longest strong sum this magic allows.
    pub const fn max_strong_len(self) -> usize {
        self.strong_kind().digest_len()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Md4 => "md4",
            Self::Blake2 => "blake2",
            Self::RkMd4 => "rk-md4",
            Self::RkBlake2 => "rk-blake2",
        }
    }
}

/// Check a delta stream header.
pub fn check_delta_magic(value: u32) -> Result<()> {
    if value == DELTA_MAGIC {
        Ok(())
    } else {
        Err(Error::BadMagic(value))
    }
}
