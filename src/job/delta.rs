// Delta encoding: new-file bytes in, delta stream out.
//
// A block-sized window slides over the input. A verified match emits (or
// extends) a COPY and jumps the window a whole block; otherwise the first
// window byte joins the pending literal and the window moves one byte. At
// end of input the window shrinks so a short final block can still match.

use super::scoop::{Scoop, Tube};
use super::{Buffers, JobOptions, Stats, Status, Step};
use crate::error::{Error, ErrorKind, Result};
use crate::format::command::{self, OP_END};
use crate::format::magic::DELTA_MAGIC;
use crate::hash::matching::{Matcher, Probe};
use crate::hash::rolling::{RollingChecksum, WeakSum};
use crate::hash::table::HashIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Scanning,
    Flush,
    Done,
}

/// Copy waiting to be merged with the next contiguous match.
#[derive(Debug, Clone, Copy)]
struct PendingCopy {
    offset: u64,
    len: u64,
    /// Block that would continue this copy.
    next_block: usize,
}

/// Streams a new file into a delta against an indexed signature.
pub struct DeltaJob<'a> {
    matcher: Matcher<'a>,
    block_len: usize,
    weak: WeakSum,
    phase: Phase,
    failed: Option<ErrorKind>,
    scoop: Scoop,
    tube: Tube,
    literal: Vec<u8>,
    pending: Option<PendingCopy>,
    chunk: usize,
    stats: Stats,
}

impl<'a> DeltaJob<'a> {
    pub fn new(index: &'a HashIndex, opts: &JobOptions) -> Result<Self> {
        opts.validate()?;
        let sig = index.signature();
        let mut stats = Stats::new("delta");
        stats.block_len = u64::from(sig.block_len());
        stats.sig_blocks = sig.len() as u64;
        log::debug!(
            "delta job: {} blocks of {} bytes ({})",
            sig.len(),
            sig.block_len(),
            sig.magic().name()
        );
        Ok(Self {
            matcher: Matcher::new(index),
            block_len: sig.block_len() as usize,
            weak: WeakSum::new(sig.magic().weak_kind()),
            phase: Phase::Header,
            failed: None,
            scoop: Scoop::default(),
            tube: Tube::default(),
            literal: Vec::new(),
            pending: None,
            chunk: opts.io_chunk_size,
            stats,
        })
    }

    fn advance(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<Status> {
        loop {
            self.tube.drain(bufs, &mut self.stats);
            if !self.tube.is_empty() {
                return Ok(Status::Blocked);
            }
            match self.phase {
                Phase::Header => {
                    self.tube.push(&DELTA_MAGIC.to_be_bytes())?;
                    self.phase = Phase::Scanning;
                }
                Phase::Scanning => {
                    if !self.scan(bufs)? {
                        self.tube.drain(bufs, &mut self.stats);
                        return Ok(Status::Blocked);
                    }
                }
                Phase::Flush => {
                    self.flush_copy()?;
                    self.flush_literal()?;
                    self.tube.push(&[OP_END])?;
                    self.phase = Phase::Done;
                }
                Phase::Done => {
                    log::debug!("{}", self.stats);
                    return Ok(Status::Done);
                }
            }
        }
    }

    /// Scan until about one chunk of output is queued.
    ///
    /// Returns false when more input is needed.
    fn scan(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<bool> {
        while self.tube.len() < self.chunk {
            let full = self.scoop.fill(bufs, self.block_len, &mut self.stats)?;
            if !full && !bufs.input_finished() {
                return Ok(false);
            }
            let data = self.scoop.data();
            let w = data.len().min(self.block_len);
            if w == 0 {
                self.phase = Phase::Flush;
                return Ok(true);
            }
            while self.weak.count() < w {
                self.weak.roll_in(data[self.weak.count()]);
            }

            let window = &data[..w];
            let first = window[0];
            let incoming = data.get(w).copied();
            let expected = self.pending.map(|p| p.next_block);
            let probe = self.matcher.find(self.weak.digest(), window, expected);
            if probe == Probe::FalseMatch {
                self.stats.false_matches += 1;
            }
            let matched = match probe {
                Probe::Hit(block) => Some((block, w)),
                Probe::Miss | Probe::FalseMatch => self
                    .matcher
                    .probe_tail(window, expected)
                    .and_then(|len| self.matcher.last_block().map(|block| (block, len))),
            };

            match matched {
                Some((block, len)) => {
                    self.flush_literal()?;
                    self.add_copy(block, len as u64)?;
                    self.scoop.advance(len);
                    self.weak.reset();
                }
                None => {
                    self.flush_copy()?;
                    self.literal.try_reserve(1)?;
                    self.literal.push(first);
                    match incoming {
                        Some(b) => self.weak.rotate(first, b),
                        None => self.weak.roll_out(first),
                    }
                    self.scoop.advance(1);
                    if self.literal.len() >= self.chunk {
                        self.flush_literal()?;
                    }
                }
            }
        }
        Ok(true)
    }

    fn add_copy(&mut self, block: usize, len: u64) -> Result<()> {
        let offset = self.matcher.index().signature().block_offset(block);
        if let Some(p) = self.pending.as_mut()
            && p.offset + p.len == offset
        {
            p.len += len;
            p.next_block = block + 1;
            return Ok(());
        }
        self.flush_copy()?;
        self.pending = Some(PendingCopy {
            offset,
            len,
            next_block: block + 1,
        });
        Ok(())
    }

    fn flush_copy(&mut self) -> Result<()> {
        let Some(p) = self.pending.take() else {
            return Ok(());
        };
        log::trace!("COPY offset={} len={}", p.offset, p.len);
        self.tube.reserve(17)?;
        let n = command::put_copy(self.tube.queue(), p.offset, p.len);
        self.stats.copy_cmds += 1;
        self.stats.copy_bytes += p.len;
        self.stats.copy_cmdbytes += n as u64;
        Ok(())
    }

    fn flush_literal(&mut self) -> Result<()> {
        if self.literal.is_empty() {
            return Ok(());
        }
        let len = self.literal.len() as u64;
        log::trace!("LITERAL len={len}");
        self.tube.reserve(9 + self.literal.len())?;
        let n = command::put_literal_header(self.tube.queue(), len);
        self.tube.queue().extend_from_slice(&self.literal);
        self.literal.clear();
        self.stats.lit_cmds += 1;
        self.stats.lit_bytes += len;
        self.stats.lit_cmdbytes += n as u64;
        Ok(())
    }
}

impl Step for DeltaJob<'_> {
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
