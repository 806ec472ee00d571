// Big-endian fixed-width integers used in signature and delta streams.
//
// Delta command parameters pick the narrowest of 1, 2, 4 or 8 bytes that
// holds the value; headers are always 4 bytes.

/// Smallest of 1/2/4/8 bytes that can hold `val`.
#[inline]
pub fn int_len(val: u64) -> usize {
    if val <= 0xFF {
        1
    } else if val <= 0xFFFF {
        2
    } else if val <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}

/// Append the low `len` bytes of `val`, most significant first.
///
/// `len` must be 1..=8 and wide enough for `val`.
#[inline]
pub fn put(out: &mut Vec<u8>, val: u64, len: usize) {
    debug_assert!((1..=8).contains(&len));
    debug_assert!(len == 8 || val >> (len * 8) == 0);
    out.extend_from_slice(&val.to_be_bytes()[8 - len..]);
}

/// Append a 4-byte header field.
#[inline]
pub fn put_u32(out: &mut Vec<u8>, val: u32) {
    out.extend_from_slice(&val.to_be_bytes());
}

/// Read a `data.len()`-byte big-endian integer (at most 8 bytes).
#[inline]
pub fn get(data: &[u8]) -> u64 {
    debug_assert!(data.len() <= 8);
    data.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Read a 4-byte header field from the start of `data`.
#[inline]
pub fn get_u32(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}
