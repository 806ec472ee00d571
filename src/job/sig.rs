// Signature generation: basis bytes in, signature stream out.

use super::scoop::{Scoop, Tube};
use super::{Buffers, JobOptions, Stats, Status, Step};
use crate::error::{Error, ErrorKind, Result};
use crate::format::signature::{self, Signature};
use crate::hash::config::SignatureArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Blocks,
    Done,
}

/// Streams a basis file into its serialized signature.
pub struct SignatureJob {
    /// Parameters and checksum algorithms; blocks are never stored.
    template: Signature,
    phase: Phase,
    failed: Option<ErrorKind>,
    scoop: Scoop,
    tube: Tube,
    chunk: usize,
    stats: Stats,
}

impl SignatureJob {
    pub fn new(args: &SignatureArgs, opts: &JobOptions) -> Result<Self> {
        opts.validate()?;
        let template = Signature::new(args.magic, args.block_len, args.strong_len)?;
        let mut stats = Stats::new("signature");
        stats.block_len = u64::from(args.block_len);
        log::debug!("signature job: {args}");
        Ok(Self {
            template,
            phase: Phase::Header,
            failed: None,
            scoop: Scoop::default(),
            tube: Tube::default(),
            chunk: opts.io_chunk_size,
            stats,
        })
    }

    fn advance(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<Status> {
        let block_len = self.template.block_len() as usize;
        loop {
            self.tube.drain(bufs, &mut self.stats);
            if !self.tube.is_empty() {
                return Ok(Status::Blocked);
            }
            match self.phase {
                Phase::Header => {
                    self.tube.push(&self.template.header())?;
                    self.phase = Phase::Blocks;
                }
                Phase::Blocks => {
                    // Batch records until the tube holds about one chunk.
                    while self.tube.len() < self.chunk {
                        let full = self.scoop.fill(bufs, block_len, &mut self.stats)?;
                        if !full && !bufs.input_finished() {
                            self.tube.drain(bufs, &mut self.stats);
                            return Ok(Status::Blocked);
                        }
                        if self.scoop.is_empty() {
                            self.phase = Phase::Done;
                            break;
                        }
                        let n = self.scoop.len().min(block_len);
                        let block = self.template.checksum_block(&self.scoop.data()[..n]);
                        self.tube.reserve(self.template.record_len())?;
                        signature::write_block(self.tube.queue(), &block);
                        self.scoop.advance(n);
                        self.stats.sig_blocks += 1;
                    }
                }
                Phase::Done => {
                    log::debug!("{}", self.stats);
                    return Ok(Status::Done);
                }
            }
        }
    }
}

impl Step for SignatureJob {
    fn step(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<Status> {
        if let Some(kind) = self.failed {
            return Err(Error::Halted(kind));
        }
        if self.phase == Phase::Done && self.tube.is_empty() {
            return Ok(Status::Done);
        }
        self.stats.mark_started();
        let status = self.advance(bufs).inspect_err(|e| self.failed = Some(e.kind()))?;
        if status == Status::Done {
            self.stats.mark_finished();
        }
        Ok(status)
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
