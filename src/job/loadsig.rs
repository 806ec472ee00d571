// Signature loading: signature stream in, `Signature` value out.

use super::scoop::Scoop;
use super::{Buffers, Stats, Status, Step};
use crate::error::{Error, ErrorKind, Result};
use crate::format::signature::{self, SIG_HEADER_LEN, Signature};

#[derive(Debug, PartialEq, Eq)]
enum Phase {
    Header,
    Blocks,
    Done,
}

/// Parses a signature stream incrementally. Produces no output bytes.
pub struct LoadSignatureJob {
    phase: Phase,
    failed: Option<ErrorKind>,
    scoop: Scoop,
    sig: Option<Signature>,
    stats: Stats,
}

impl Default for LoadSignatureJob {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSignatureJob {
    pub fn new() -> Self {
        Self {
            phase: Phase::Header,
            failed: None,
            scoop: Scoop::default(),
            sig: None,
            stats: Stats::new("loadsig"),
        }
    }

    /// The loaded signature. Only available once the job is done.
    pub fn into_signature(self) -> Result<Signature> {
        match (self.phase, self.sig) {
            (Phase::Done, Some(sig)) => Ok(sig),
            _ => Err(Error::param("signature is not completely loaded")),
        }
    }

    fn advance(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<Status> {
        loop {
            match self.phase {
                Phase::Header => {
                    if !self.scoop.fill(bufs, SIG_HEADER_LEN, &mut self.stats)? {
                        if bufs.input_finished() {
                            return Err(Error::corrupt(format!(
                                "signature header truncated after {} bytes",
                                self.scoop.len()
                            )));
                        }
                        return Ok(Status::Blocked);
                    }
                    let sig = signature::parse_header(&self.scoop.data()[..SIG_HEADER_LEN])?;
                    self.scoop.advance(SIG_HEADER_LEN);
                    self.stats.block_len = u64::from(sig.block_len());
                    log::debug!(
                        "loading {} signature: block_len {}, strong_len {}",
                        sig.magic().name(),
                        sig.block_len(),
                        sig.strong_len()
                    );
                    self.sig = Some(sig);
                    self.phase = Phase::Blocks;
                }
                Phase::Blocks => {
                    let Some(sig) = self.sig.as_mut() else {
                        return Err(Error::Internal("signature header missing"));
                    };
                    let record = sig.record_len();
                    if !self.scoop.fill(bufs, record, &mut self.stats)? {
                        if !bufs.input_finished() {
                            return Ok(Status::Blocked);
                        }
                        if !self.scoop.is_empty() {
                            return Err(Error::corrupt(format!(
                                "signature ends inside block {} ({} of {} bytes)",
                                sig.len(),
                                self.scoop.len(),
                                record
                            )));
                        }
                        self.phase = Phase::Done;
                        continue;
                    }
                    sig.push_record(&self.scoop.data()[..record])?;
                    self.scoop.advance(record);
                    self.stats.sig_blocks += 1;
                }
                Phase::Done => {
                    log::debug!("{}", self.stats);
                    return Ok(Status::Done);
                }
            }
        }
    }
}

impl Step for LoadSignatureJob {
    fn step(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<Status> {
        if let Some(kind) = self.failed {
            return Err(Error::Halted(kind));
        }
        if self.phase == Phase::Done {
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
