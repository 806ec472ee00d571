// Delta command opcodes and their encoding.
//
// Opcode layout (one byte, followed by 0..=16 parameter bytes):
//
//   0x00          END
//   0x01..=0x40   LITERAL of 1..=64 bytes, length is the opcode itself
//   0x41..=0x44   LITERAL, length in the next 1/2/4/8 bytes
//   0x45..=0x54   COPY, offset then length, widths from {1,2,4,8}
//                 (offset width major: 0x45 = N1_N1, 0x49 = N2_N1, ...)
//   0x55..=0xFF   reserved

use super::magic;
use super::netint;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_END: u8 = 0x00;
pub const OP_LITERAL_1: u8 = 0x01;
pub const OP_LITERAL_64: u8 = 0x40;
pub const OP_LITERAL_N1: u8 = 0x41;
pub const OP_LITERAL_N8: u8 = 0x44;
pub const OP_COPY_N1_N1: u8 = 0x45;
pub const OP_COPY_N8_N8: u8 = 0x54;

/// Literals up to this length are encoded in the opcode alone.
pub const MAX_IMMEDIATE_LITERAL: u64 = 64;

/// Parameter widths in opcode order.
const WIDTHS: [u8; 4] = [1, 2, 4, 8];

const fn width_index(len: usize) -> u8 {
    match len {
        1 => 0,
        2 => 1,
        4 => 2,
        _ => 3,
    }
}

/// What an opcode does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    End,
    Literal,
    Copy,
}

/// Decoded opcode: its kind, immediate length and parameter widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub kind: OpKind,
    /// Literal length carried by the opcode itself (0 if none).
    pub immediate: u64,
    /// Width of the first parameter (literal length or copy offset).
    pub len_1: u8,
    /// Width of the second parameter (copy length).
    pub len_2: u8,
}

impl OpInfo {
    /// Total parameter bytes following the opcode.
    pub const fn param_len(&self) -> usize {
        self.len_1 as usize + self.len_2 as usize
    }
}

/// Decode an opcode byte. Returns `None` for reserved values.
pub fn lookup(op: u8) -> Option<OpInfo> {
    Some(match op {
        OP_END => OpInfo {
            kind: OpKind::End,
            immediate: 0,
            len_1: 0,
            len_2: 0,
        },
        OP_LITERAL_1..=OP_LITERAL_64 => OpInfo {
            kind: OpKind::Literal,
            immediate: u64::from(op),
            len_1: 0,
            len_2: 0,
        },
        OP_LITERAL_N1..=OP_LITERAL_N8 => OpInfo {
            kind: OpKind::Literal,
            immediate: 0,
            len_1: WIDTHS[(op - OP_LITERAL_N1) as usize],
            len_2: 0,
        },
        OP_COPY_N1_N1..=OP_COPY_N8_N8 => {
            let idx = op - OP_COPY_N1_N1;
            OpInfo {
                kind: OpKind::Copy,
                immediate: 0,
                len_1: WIDTHS[(idx / 4) as usize],
                len_2: WIDTHS[(idx % 4) as usize],
            }
        }
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append a literal command header for `len` following bytes.
///
/// Returns the header size in bytes. `len` must be non-zero.
pub fn put_literal_header(out: &mut Vec<u8>, len: u64) -> usize {
    debug_assert!(len > 0);
    if len <= MAX_IMMEDIATE_LITERAL {
        out.push(len as u8);
        1
    } else {
        let width = netint::int_len(len);
        out.push(OP_LITERAL_N1 + width_index(width));
        netint::put(out, len, width);
        1 + width
    }
}

/// Append a copy command. Returns the command size in bytes.
pub fn put_copy(out: &mut Vec<u8>, offset: u64, len: u64) -> usize {
    let off_width = netint::int_len(offset);
    let len_width = netint::int_len(len);
    out.push(OP_COPY_N1_N1 + width_index(off_width) * 4 + width_index(len_width));
    netint::put(out, offset, off_width);
    netint::put(out, len, len_width);
    1 + off_width + len_width
}

// ---------------------------------------------------------------------------
// Whole-stream parsing
// ---------------------------------------------------------------------------

/// One decoded delta command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Copy `len` bytes of the basis starting at `offset`.
    Copy { offset: u64, len: u64 },
    /// Emit these bytes verbatim.
    Literal(Vec<u8>),
}

impl Command {
    /// Number of output bytes this command produces.
    pub fn output_len(&self) -> u64 {
        match self {
            Self::Copy { len, .. } => *len,
            Self::Literal(bytes) => bytes.len() as u64,
        }
    }
}

/// Parse a complete in-memory delta stream into its commands.
///
/// Fails on a bad header, reserved opcodes, truncation, or a missing END.
pub fn parse_commands(delta: &[u8]) -> Result<Vec<Command>> {
    let header = netint::get_u32(delta).ok_or_else(|| Error::corrupt("delta header truncated"))?;
    magic::check_delta_magic(header)?;

    let mut commands = Vec::new();
    let mut pos = 4usize;
    loop {
        let op = *delta
            .get(pos)
            .ok_or_else(|| Error::corrupt("delta ended without END command"))?;
        pos += 1;
        let info = lookup(op).ok_or_else(|| Error::corrupt(format!("unknown opcode {op:#04x}")))?;
        let params = delta
            .get(pos..pos + info.param_len())
            .ok_or_else(|| Error::corrupt("command parameters truncated"))?;
        pos += info.param_len();
        match info.kind {
            OpKind::End => return Ok(commands),
            OpKind::Literal => {
                let len = if info.len_1 == 0 {
                    info.immediate
                } else {
                    netint::get(params)
                };
                let avail = (delta.len() - pos) as u64;
                if len > avail {
                    return Err(Error::corrupt("literal data truncated"));
                }
                let len = len as usize;
                commands.push(Command::Literal(delta[pos..pos + len].to_vec()));
                pos += len;
            }
            OpKind::Copy => {
                let (off, len) = params.split_at(info.len_1 as usize);
                let offset = netint::get(off);
                let len = netint::get(len);
                validate_copy(offset, len)?;
                commands.push(Command::Copy { offset, len });
            }
        }
    }
}

/// Reject copies that can never be satisfied.
pub(crate) fn validate_copy(offset: u64, len: u64) -> Result<()> {
    if len == 0 {
        return Err(Error::corrupt(format!("zero-length copy at offset {offset}")));
    }
    if offset.checked_add(len).is_none() {
        return Err(Error::corrupt(format!(
            "copy range overflows: offset {offset} len {len}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn with_header(body: &[u8]) -> Vec<u8> {
        let mut out = magic::DELTA_MAGIC.to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn opcode_table_covers_format() {
        assert_eq!(lookup(0x00).unwrap().kind, OpKind::End);
        let lit = lookup(0x40).unwrap();
        assert_eq!((lit.kind, lit.immediate, lit.param_len()), (OpKind::Literal, 64, 0));
        let lit_n8 = lookup(0x44).unwrap();
        assert_eq!((lit_n8.len_1, lit_n8.len_2), (8, 0));
        let c = lookup(0x45).unwrap();
        assert_eq!((c.kind, c.len_1, c.len_2), (OpKind::Copy, 1, 1));
        let c = lookup(0x4A).unwrap();
        assert_eq!((c.len_1, c.len_2), (2, 2));
        let c = lookup(0x54).unwrap();
        assert_eq!((c.len_1, c.len_2), (8, 8));
        for op in 0x55..=0xFFu8 {
            assert!(lookup(op).is_none(), "{op:#x} should be reserved");
        }
    }

    #[test]
    fn literal_headers() {
        let mut out = Vec::new();
        assert_eq!(put_literal_header(&mut out, 1), 1);
        assert_eq!(put_literal_header(&mut out, 64), 1);
        assert_eq!(put_literal_header(&mut out, 65), 2);
        assert_eq!(put_literal_header(&mut out, 300), 3);
        assert_eq!(out, [0x01, 0x40, 0x41, 65, 0x42, 0x01, 0x2C]);
    }

    #[test]
    fn copy_commands_pick_narrow_widths() {
        let mut out = Vec::new();
        assert_eq!(put_copy(&mut out, 0, 10), 3);
        assert_eq!(out, [0x45, 0x00, 0x0A]);

        out.clear();
        assert_eq!(put_copy(&mut out, 0x1_0000, 0x100), 7);
        // offset width 4 (index 2), length width 2 (index 1).
        assert_eq!(out[0], 0x45 + 2 * 4 + 1);

        out.clear();
        put_copy(&mut out, u64::MAX - 1, 1);
        assert_eq!(out[0], 0x45 + 3 * 4);
        assert_eq!(out.len(), 1 + 8 + 1);
    }

    #[test]
    fn parse_mixed_stream() {
        let mut body = Vec::new();
        put_copy(&mut body, 512, 2048);
        put_literal_header(&mut body, 3);
        body.extend_from_slice(b"xyz");
        body.push(OP_END);
        let cmds = parse_commands(&with_header(&body)).unwrap();
        assert_eq!(
            cmds,
            vec![
                Command::Copy { offset: 512, len: 2048 },
                Command::Literal(b"xyz".to_vec())
            ]
        );
        assert_eq!(cmds[0].output_len() + cmds[1].output_len(), 2051);
    }

    #[test]
    fn parse_rejects_missing_end() {
        let mut body = Vec::new();
        put_literal_header(&mut body, 2);
        body.extend_from_slice(b"ab");
        let err = parse_commands(&with_header(&body)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn parse_rejects_reserved_opcode() {
        let err = parse_commands(&with_header(&[0x55])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn parse_rejects_truncated_literal() {
        let err = parse_commands(&with_header(&[0x05, b'a', b'b'])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn parse_rejects_zero_copy() {
        let err = parse_commands(&with_header(&[0x45, 0x00, 0x00, 0x00])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn parse_rejects_wrong_magic() {
        let err = parse_commands(b"rs\x01G\x00").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadMagic);
    }
}
