// Patch application: delta stream in, reconstructed file out.
//
// Basis bytes for COPY commands come from a `BasisSource`, which may
// return fewer bytes than asked; the job keeps asking for the remainder.
// An empty read before a copy is satisfied means the basis is too short.

use std::io;

use super::scoop::{Scoop, Tube};
use super::{Buffers, JobOptions, Stats, Status, Step};
use crate::error::{Error, ErrorKind, Result};
use crate::format::command::{self, OpKind};
use crate::format::magic;
use crate::format::netint;

// ---------------------------------------------------------------------------
// Basis access
// ---------------------------------------------------------------------------

/// Random-access reader for the basis file.
pub trait BasisSource {
    /// Return up to `len` bytes starting at `offset`.
    ///
    /// A shorter result is fine; an empty result means the basis ends
    /// at or before `offset`.
    fn read(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>>;
}

impl BasisSource for &[u8] {
    fn read(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(Vec::new());
        };
        if start >= self.len() {
            return Ok(Vec::new());
        }
        let end = start + len.min(self.len() - start);
        Ok(self[start..end].to_vec())
    }
}

impl BasisSource for Vec<u8> {
    fn read(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        BasisSource::read(&mut self.as_slice(), offset, len)
    }
}

impl<B: BasisSource + ?Sized> BasisSource for &mut B {
    fn read(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        (**self).read(offset, len)
    }
}

/// Adapts a closure `(offset, len) -> io::Result<Vec<u8>>` into a basis.
pub struct FnBasis<F>(pub F);

impl<F> BasisSource for FnBasis<F>
where
    F: FnMut(u64, usize) -> io::Result<Vec<u8>>,
{
    fn read(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        (self.0)(offset, len)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Command,
    Literal { remaining: u64 },
    Copy { offset: u64, remaining: u64 },
    Done,
}

/// Applies a delta stream to a basis.
pub struct PatchJob<'a> {
    basis: Box<dyn BasisSource + 'a>,
    phase: Phase,
    failed: Option<ErrorKind>,
    scoop: Scoop,
    tube: Tube,
    chunk: usize,
    stats: Stats,
}

impl<'a> PatchJob<'a> {
    pub fn new(basis: impl BasisSource + 'a, opts: &JobOptions) -> Result<Self> {
        opts.validate()?;
        log::debug!("patch job: io_chunk_size {}", opts.io_chunk_size);
        Ok(Self {
            basis: Box::new(basis),
            phase: Phase::Header,
            failed: None,
            scoop: Scoop::default(),
            tube: Tube::default(),
            chunk: opts.io_chunk_size,
            stats: Stats::new("patch"),
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
                    if !self.scoop.fill(bufs, 4, &mut self.stats)? {
                        return self.starved(bufs, "delta header truncated");
                    }
                    let m = netint::get_u32(self.scoop.data())
                        .ok_or(Error::Internal("delta header not buffered"))?;
                    magic::check_delta_magic(m)?;
                    self.scoop.advance(4);
                    self.phase = Phase::Command;
                }
                Phase::Command => {
                    if !self.scoop.fill(bufs, 1, &mut self.stats)? {
                        return self.starved(bufs, "delta ended without END command");
                    }
                    let op = self.scoop.data()[0];
                    let info = command::lookup(op)
                        .ok_or_else(|| Error::corrupt(format!("unknown opcode {op:#04x}")))?;
                    let need = 1 + info.param_len();
                    if !self.scoop.fill(bufs, need, &mut self.stats)? {
                        return self.starved(bufs, "command parameters truncated");
                    }
                    let params = &self.scoop.data()[1..need];
                    self.phase = match info.kind {
                        OpKind::End => Phase::Done,
                        OpKind::Literal => {
                            let len = if info.len_1 == 0 {
                                info.immediate
                            } else {
                                netint::get(params)
                            };
                            log::trace!("LITERAL len={len}");
                            self.stats.lit_cmds += 1;
                            self.stats.lit_bytes += len;
                            self.stats.lit_cmdbytes += need as u64;
                            Phase::Literal { remaining: len }
                        }
                        OpKind::Copy => {
                            let (off, len) = params.split_at(info.len_1 as usize);
                            let offset = netint::get(off);
                            let len = netint::get(len);
                            command::validate_copy(offset, len)?;
                            log::trace!("COPY offset={offset} len={len}");
                            self.stats.copy_cmds += 1;
                            self.stats.copy_bytes += len;
                            self.stats.copy_cmdbytes += need as u64;
                            Phase::Copy {
                                offset,
                                remaining: len,
                            }
                        }
                    };
                    self.scoop.advance(need);
                }
                Phase::Literal { remaining: 0 } => self.phase = Phase::Command,
                Phase::Literal { remaining } => {
                    let want = remaining.min(self.chunk as u64) as usize;
                    let data = bufs.take_in(want);
                    if data.is_empty() {
                        return self.starved(bufs, "literal data truncated");
                    }
                    self.stats.in_bytes += data.len() as u64;
                    self.tube.push(data)?;
                    self.phase = Phase::Literal {
                        remaining: remaining - data.len() as u64,
                    };
                }
                Phase::Copy { remaining: 0, .. } => self.phase = Phase::Command,
                Phase::Copy { offset, remaining } => {
                    let want = remaining.min(self.chunk as u64) as usize;
                    let mut data = self.basis.read(offset, want)?;
                    if data.is_empty() {
                        return Err(Error::corrupt(format!(
                            "basis ended at offset {offset} with {remaining} bytes of copy left"
                        )));
                    }
                    data.truncate(want);
                    let n = data.len() as u64;
                    self.tube.push(&data)?;
                    self.phase = Phase::Copy {
                        offset: offset + n,
                        remaining: remaining - n,
                    };
                }
                Phase::Done => {
                    log::debug!("{}", self.stats);
                    return Ok(Status::Done);
                }
            }
        }
    }

    /// No input available: wait for more, or fail if the stream has ended.
    fn starved(&self, bufs: &Buffers<'_, '_>, what: &str) -> Result<Status> {
        if bufs.input_finished() {
            Err(Error::corrupt(what))
        } else {
            Ok(Status::Blocked)
        }
    }
}

impl Step for PatchJob<'_> {
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
