// Weak rolling checksums matching librsync.
//
// Two families, selected by the signature magic:
//   - **Rollsum**: the classic rsync two-accumulator sum (16-bit halves,
//     each byte offset by 31).
//   - **Rabin-Karp**: polynomial hash mod 2^32 with librsync's multiplier,
//     its modular inverse for O(1) roll-out, and a seed of 1.
//
// Both support roll-in, roll-out and rotate in O(1); none of them rescans
// the window.

// ---------------------------------------------------------------------------
// Constants matching librsync
// ---------------------------------------------------------------------------

/// Offset added to every byte by the classic rollsum.
pub const ROLLSUM_CHAR_OFFSET: u16 = 31;

/// Rabin-Karp initial hash value.
pub const RABINKARP_SEED: u32 = 1;

/// Rabin-Karp multiplier.
pub const RABINKARP_MULT: u32 = 0x0810_4225;

/// Multiplicative inverse of `RABINKARP_MULT` mod 2^32.
pub const RABINKARP_INVM: u32 = 0x98f0_09ad;

/// `RABINKARP_MULT - 1`: removes the seed's contribution on roll-out.
pub const RABINKARP_ADJ: u32 = 0x0810_4224;

/// Common contract of the rolling checksum families.
pub trait RollingChecksum {
    /// Add one byte at the end of the window.
    fn roll_in(&mut self, byte: u8);
    /// Remove one byte from the start of the window.
    fn roll_out(&mut self, byte: u8);
    /// Remove `out` from the start and append `inp` at the end.
    fn rotate(&mut self, out: u8, inp: u8);
    /// Current 32-bit checksum value.
    fn digest(&self) -> u32;
    /// Number of bytes in the window.
    fn count(&self) -> usize;

    /// Append every byte of `buf`.
    fn update(&mut self, buf: &[u8]) {
        for &b in buf {
            self.roll_in(b);
        }
    }
}

// ---------------------------------------------------------------------------
// Classic rollsum
// ---------------------------------------------------------------------------

/// rsync's classic rolling sum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rollsum {
    count: usize,
    s1: u16,
    s2: u16,
}

impl Rollsum {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RollingChecksum for Rollsum {
    #[inline(always)]
    fn roll_in(&mut self, byte: u8) {
        self.s1 = self
            .s1
            .wrapping_add(u16::from(byte).wrapping_add(ROLLSUM_CHAR_OFFSET));
        self.s2 = self.s2.wrapping_add(self.s1);
        self.count += 1;
    }

    #[inline(always)]
    fn roll_out(&mut self, byte: u8) {
        let c = u16::from(byte).wrapping_add(ROLLSUM_CHAR_OFFSET);
        self.s1 = self.s1.wrapping_sub(c);
        // Only the low 16 bits of count matter under wrapping arithmetic.
        self.s2 = self.s2.wrapping_sub((self.count as u16).wrapping_mul(c));
        self.count -= 1;
    }

    #[inline(always)]
    fn rotate(&mut self, out: u8, inp: u8) {
        let out_c = u16::from(out).wrapping_add(ROLLSUM_CHAR_OFFSET);
        self.s1 = self.s1.wrapping_add(u16::from(inp)).wrapping_sub(u16::from(out));
        self.s2 = self
            .s2
            .wrapping_add(self.s1)
            .wrapping_sub((self.count as u16).wrapping_mul(out_c));
    }

    #[inline(always)]
    fn digest(&self) -> u32 {
        (u32::from(self.s2) << 16) | u32::from(self.s1)
    }

    fn count(&self) -> usize {
        self.count
    }
}

// ---------------------------------------------------------------------------
// Rabin-Karp
// ---------------------------------------------------------------------------

/// Rabin-Karp rolling hash, mod 2^32.
///
/// `mult` tracks `RABINKARP_MULT^count` so the oldest byte's weight is known
/// without rescanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RabinKarp {
    count: usize,
    hash: u32,
    mult: u32,
}

impl Default for RabinKarp {
    fn default() -> Self {
        Self {
            count: 0,
            hash: RABINKARP_SEED,
            mult: 1,
        }
    }
}

impl RabinKarp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RollingChecksum for RabinKarp {
    #[inline(always)]
    fn roll_in(&mut self, byte: u8) {
        self.hash = self
            .hash
            .wrapping_mul(RABINKARP_MULT)
            .wrapping_add(u32::from(byte));
        self.mult = self.mult.wrapping_mul(RABINKARP_MULT);
        self.count += 1;
    }

    #[inline(always)]
    fn roll_out(&mut self, byte: u8) {
        self.count -= 1;
        self.mult = self.mult.wrapping_mul(RABINKARP_INVM);
        self.hash = self
            .hash
            .wrapping_sub(self.mult.wrapping_mul(u32::from(byte).wrapping_add(RABINKARP_ADJ)));
    }

    #[inline(always)]
    fn rotate(&mut self, out: u8, inp: u8) {
        self.hash = self
            .hash
            .wrapping_mul(RABINKARP_MULT)
            .wrapping_add(u32::from(inp))
            .wrapping_sub(self.mult.wrapping_mul(u32::from(out).wrapping_add(RABINKARP_ADJ)));
    }

    #[inline(always)]
    fn digest(&self) -> u32 {
        self.hash
    }

    fn count(&self) -> usize {
        self.count
    }
}

// ---------------------------------------------------------------------------
// Family dispatch
// ---------------------------------------------------------------------------

/// Which weak checksum family a signature uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeakKind {
    Rollsum,
    RabinKarp,
}

/// A weak checksum of either family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeakSum {
    Rollsum(Rollsum),
    RabinKarp(RabinKarp),
}

impl WeakSum {
    /// Empty checksum of the given family.
    pub fn new(kind: WeakKind) -> Self {
        match kind {
            WeakKind::Rollsum => Self::Rollsum(Rollsum::new()),
            WeakKind::RabinKarp => Self::RabinKarp(RabinKarp::new()),
        }
    }

    /// Checksum of `data` in one call.
    pub fn of(kind: WeakKind, data: &[u8]) -> u32 {
        let mut sum = Self::new(kind);
        sum.update(data);
        sum.digest()
    }

    pub fn kind(&self) -> WeakKind {
        match self {
            Self::Rollsum(_) => WeakKind::Rollsum,
            Self::RabinKarp(_) => WeakKind::RabinKarp,
        }
    }

    /// Forget every byte, keeping the family.
    pub fn reset(&mut self) {
        *self = Self::new(self.kind());
    }
}

impl RollingChecksum for WeakSum {
    #[inline(always)]
    fn roll_in(&mut self, byte: u8) {
        match self {
            Self::Rollsum(s) => s.roll_in(byte),
            Self::RabinKarp(s) => s.roll_in(byte),
        }
    }

    #[inline(always)]
    fn roll_out(&mut self, byte: u8) {
        match self {
            Self::Rollsum(s) => s.roll_out(byte),
            Self::RabinKarp(s) => s.roll_out(byte),
        }
    }

    #[inline(always)]
    fn rotate(&mut self, out: u8, inp: u8) {
        match self {
            Self::Rollsum(s) => s.rotate(out, inp),
            Self::RabinKarp(s) => s.rotate(out, inp),
        }
    }

    #[inline(always)]
    fn digest(&self) -> u32 {
        match self {
            Self::Rollsum(s) => s.digest(),
            Self::RabinKarp(s) => s.digest(),
        }
    }

    fn count(&self) -> usize {
        match self {
            Self::Rollsum(s) => s.count(),
            Self::RabinKarp(s) => s.count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bucket index computation
// ---------------------------------------------------------------------------

/// Hash table sizing for weak-sum buckets.
#[derive(Clone, Debug)]
pub struct HashCfg {
    /// Number of buckets (power of 2).
    pub size: usize,
    /// Bit shift: `32 - log2(size)`.
    pub shift: u32,
    /// `size - 1`.
    pub mask: u64,
}

impl HashCfg {
    /// Create a hash config for the given number of slots.
    ///
    /// Picks the smallest power of two >= `slots`, then uses one bit less,
    /// so buckets average about two entries.
    pub fn new(slots: usize) -> Self {
        let bits = size_hashtable_bits(slots);
        let size = 1usize << bits;
        Self {
            size,
            shift: 32 - bits as u32,
            mask: (size as u64) - 1,
        }
    }

    /// Compute bucket index from a weak sum.
    ///
    /// `(sum >> shift) ^ (sum & mask)` folds the high bits into range.
    #[inline(always)]
    pub fn bucket(&self, weak: u32) -> usize {
        let c = u64::from(weak);
        ((c >> self.shift) ^ (c & self.mask)) as usize
    }
}

/// Hash table bit width from slot count, capped at 28.
fn size_hashtable_bits(slots: usize) -> usize {
    let max_bits = 28usize;
    for i in 3..=max_bits {
        if slots < (1 << i) {
            return i - 1;
        }
    }
    max_bits
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [WeakKind; 2] = [WeakKind::Rollsum, WeakKind::RabinKarp];

    fn sample(len: usize) -> Vec<u8> {
        let mut s = 0x2545_f491u32;
        (0..len)
            .map(|_| {
                s ^= s << 13;
                s ^= s >> 17;
                s ^= s << 5;
                s as u8
            })
            .collect()
    }

    #[test]
    fn inverse_constant_is_correct() {
        assert_eq!(RABINKARP_MULT.wrapping_mul(RABINKARP_INVM), 1);
        assert_eq!(RABINKARP_ADJ, RABINKARP_MULT - 1);
    }

    #[test]
    fn empty_digests() {
        assert_eq!(WeakSum::of(WeakKind::Rollsum, b""), 0);
        assert_eq!(WeakSum::of(WeakKind::RabinKarp, b""), RABINKARP_SEED);
    }

    #[test]
    fn single_byte_digests() {
        // s1 = s2 = 0 + 31.
        assert_eq!(WeakSum::of(WeakKind::Rollsum, &[0]), 0x001F_001F);
        // 1 * MULT + 0.
        assert_eq!(WeakSum::of(WeakKind::RabinKarp, &[0]), RABINKARP_MULT);
    }

    #[test]
    fn rotate_matches_fresh_sum() {
        let data = sample(4096);
        let window = 64;
        for kind in KINDS {
            let mut rolling = WeakSum::new(kind);
            rolling.update(&data[..window]);
            for start in 1..data.len() - window {
                rolling.rotate(data[start - 1], data[start + window - 1]);
                assert_eq!(
                    rolling.digest(),
                    WeakSum::of(kind, &data[start..start + window]),
                    "{kind:?} mismatch at {start}"
                );
            }
        }
    }

    #[test]
    fn roll_out_matches_fresh_sum() {
        let data = sample(300);
        for kind in KINDS {
            let mut sum = WeakSum::new(kind);
            sum.update(&data);
            for start in 1..=data.len() {
                sum.roll_out(data[start - 1]);
                assert_eq!(sum.digest(), WeakSum::of(kind, &data[start..]));
                assert_eq!(sum.count(), data.len() - start);
            }
            assert_eq!(sum.count(), 0);
            assert_eq!(sum.digest(), WeakSum::of(kind, b""));
        }
    }

    #[test]
    fn mixed_roll_in_and_out() {
        for kind in KINDS {
            let mut sum = WeakSum::new(kind);
            sum.update(b"prefix");
            let before = sum.clone();
            sum.roll_in(b'z');
            sum.roll_out(b'p');
            sum.roll_in(b'p');
            // Window is now "refixzp"; rebuild and compare.
            assert_eq!(sum.digest(), WeakSum::of(kind, b"refixzp"));
            assert_ne!(sum, before);
        }
    }

    #[test]
    fn long_windows_wrap_cleanly() {
        // Large windows overflow the 16-bit rollsum halves many times.
        let data = sample(200_000);
        let window = 70_000;
        let mut sum = WeakSum::new(WeakKind::Rollsum);
        sum.update(&data[..window]);
        for start in 1..=10 {
            sum.rotate(data[start - 1], data[start + window - 1]);
        }
        assert_eq!(sum.digest(), WeakSum::of(WeakKind::Rollsum, &data[10..10 + window]));
    }

    #[test]
    fn reset_keeps_family() {
        let mut sum = WeakSum::new(WeakKind::RabinKarp);
        sum.update(b"abc");
        sum.reset();
        assert_eq!(sum.kind(), WeakKind::RabinKarp);
        assert_eq!(sum.count(), 0);
        assert_eq!(sum.digest(), RABINKARP_SEED);
    }

    #[test]
    fn hash_cfg_buckets_in_range() {
        let cfg = HashCfg::new(1000);
        assert!(cfg.size.is_power_of_two());
        for w in [0u32, 1, 0xFFFF, 0xDEAD_BEEF, u32::MAX] {
            assert!(cfg.bucket(w) < cfg.size);
        }
    }

    #[test]
    fn hash_cfg_small_slot_counts() {
        assert_eq!(HashCfg::new(0).size, 4);
        assert_eq!(HashCfg::new(7).size, 4);
        assert_eq!(HashCfg::new(8).size, 8);
    }
}
