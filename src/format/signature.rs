// Signature model and its serialized form.
//
//   magic:u32 | block_len:u32 | strong_len:u32 | (weak:u32 | strong[strong_len])*
//
// Block offsets are implicit (index * block_len). The final block may cover
// fewer than block_len basis bytes; the stream does not record how many.

use super::magic::SignatureMagic;
use super::netint;
use crate::error::{Error, Result};
use crate::hash::rolling::WeakSum;
use crate::hash::strong::StrongSum;

/// Size of the fixed signature header.
pub const SIG_HEADER_LEN: usize = 12;

/// Checksums of one basis block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSig {
    pub weak: u32,
    pub strong: StrongSum,
}

/// Per-block checksums of a basis file plus the parameters used to make them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    magic: SignatureMagic,
    block_len: u32,
    strong_len: u32,
    blocks: Vec<BlockSig>,
}

impl Signature {
    /// Empty signature with validated parameters.
    pub fn new(magic: SignatureMagic, block_len: u32, strong_len: u32) -> Result<Self> {
        if block_len == 0 {
            return Err(Error::param("block length must be non-zero"));
        }
        check_strong_len(magic, strong_len).map_err(Error::Param)?;
        Ok(Self {
            magic,
            block_len,
            strong_len,
            blocks: Vec::new(),
        })
    }

    pub fn magic(&self) -> SignatureMagic {
        self.magic
    }

    pub fn block_len(&self) -> u32 {
        self.block_len
    }

    pub fn strong_len(&self) -> u32 {
        self.strong_len
    }

    pub fn blocks(&self) -> &[BlockSig] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Basis offset of block `index`.
    #[inline]
    pub fn block_offset(&self, index: usize) -> u64 {
        index as u64 * u64::from(self.block_len)
    }

    /// Bytes per serialized block record.
    pub fn record_len(&self) -> usize {
        4 + self.strong_len as usize
    }

    /// Serialized size of the whole signature.
    pub fn encoded_len(&self) -> usize {
        SIG_HEADER_LEN + self.blocks.len() * self.record_len()
    }

    /// Compute the checksums of one basis block with this signature's algorithms.
    pub fn checksum_block(&self, data: &[u8]) -> BlockSig {
        BlockSig {
            weak: WeakSum::of(self.magic.weak_kind(), data),
            strong: self
                .magic
                .strong_kind()
                .truncated(data, self.strong_len as usize),
        }
    }

    /// Append a block. Its strong sum must have exactly `strong_len` bytes.
    pub fn push(&mut self, block: BlockSig) -> Result<()> {
        if block.strong.len() != self.strong_len as usize {
            return Err(Error::param(format!(
                "strong sum is {} bytes, signature uses {}",
                block.strong.len(),
                self.strong_len
            )));
        }
        self.blocks.try_reserve(1)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Push a block decoded from the stream (length already checked).
    pub(crate) fn push_record(&mut self, record: &[u8]) -> Result<()> {
        self.blocks.try_reserve(1)?;
        self.blocks.push(read_block(record));
        Ok(())
    }

    /// Header bytes for this signature.
    pub fn header(&self) -> [u8; SIG_HEADER_LEN] {
        let mut out = [0u8; SIG_HEADER_LEN];
        out[..4].copy_from_slice(&self.magic.as_u32().to_be_bytes());
        out[4..8].copy_from_slice(&self.block_len.to_be_bytes());
        out[8..].copy_from_slice(&self.strong_len.to_be_bytes());
        out
    }

    /// Serialize to the signature stream format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.header());
        for block in &self.blocks {
            write_block(&mut out, block);
        }
        out
    }

    /// Parse a complete in-memory signature stream.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = data
            .get(..SIG_HEADER_LEN)
            .ok_or_else(|| Error::corrupt("signature header truncated"))?;
        let mut sig = parse_header(header)?;
        let body = &data[SIG_HEADER_LEN..];
        let record = sig.record_len();
        if body.len() % record != 0 {
            return Err(Error::corrupt(format!(
                "signature ends inside a block record ({} trailing bytes)",
                body.len() % record
            )));
        }
        sig.blocks.try_reserve_exact(body.len() / record)?;
        for chunk in body.chunks_exact(record) {
            sig.blocks.push(read_block(chunk));
        }
        Ok(sig)
    }
}

/// Validate a strong length against a magic, returning a message on failure.
pub(crate) fn check_strong_len(
    magic: SignatureMagic,
    strong_len: u32,
) -> std::result::Result<(), String> {
    let max = magic.max_strong_len();
    if strong_len == 0 || strong_len as usize > max {
        return Err(format!(
            "strong length {strong_len} out of range 1..={max} for {}",
            magic.name()
        ));
    }
    Ok(())
}

/// Parse and validate the 12-byte header into an empty signature.
///
/// Header values come from the stream, so range failures are `Corrupt`.
pub fn parse_header(header: &[u8]) -> Result<Signature> {
    let field = |at: usize| {
        netint::get_u32(&header[at..]).ok_or_else(|| Error::corrupt("signature header truncated"))
    };
    if header.len() < SIG_HEADER_LEN {
        return Err(Error::corrupt("signature header truncated"));
    }
    let magic = SignatureMagic::from_u32(field(0)?)?;
    let block_len = field(4)?;
    let strong_len = field(8)?;
    if block_len == 0 {
        return Err(Error::corrupt("signature declares zero block length"));
    }
    check_strong_len(magic, strong_len).map_err(Error::Corrupt)?;
    Ok(Signature {
        magic,
        block_len,
        strong_len,
        blocks: Vec::new(),
    })
}

/// Append one serialized block record.
pub(crate) fn write_block(out: &mut Vec<u8>, block: &BlockSig) {
    netint::put_u32(out, block.weak);
    out.extend_from_slice(block.strong.as_bytes());
}

/// Decode one record of `4 + strong_len` bytes.
pub(crate) fn read_block(record: &[u8]) -> BlockSig {
    let (weak, strong) = record.split_at(4);
    BlockSig {
        weak: u32::from_be_bytes([weak[0], weak[1], weak[2], weak[3]]),
        strong: StrongSum::from_slice(strong).unwrap_or_default(),
    }
}
