// Streaming jobs.
//
// Every operation is a state machine advanced by `Step::step` over a
// caller-owned input slice and output slice. A step consumes and produces
// as much as those slices allow and returns `Blocked` (call again) or
// `Done`. Unconsumed input stays in the caller's slice; bytes a job has
// already taken are retained internally.

mod scoop;

pub mod delta;
pub mod loadsig;
pub mod patch;
pub mod sig;

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub use delta::DeltaJob;
pub use loadsig::LoadSignatureJob;
pub use patch::{BasisSource, FnBasis, PatchJob};
pub use sig::SignatureJob;

/// Default bound on driver reads, pending literals and basis reads.
pub const DEFAULT_IO_CHUNK_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-job tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    /// Upper bound for one I/O transfer and for buffered literal data.
    pub io_chunk_size: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            io_chunk_size: DEFAULT_IO_CHUNK_SIZE,
        }
    }
}

impl JobOptions {
    pub fn with_io_chunk_size(io_chunk_size: usize) -> Self {
        Self { io_chunk_size }
    }

    pub fn validate(&self) -> Result<()> {
        if self.io_chunk_size == 0 {
            return Err(Error::param("io_chunk_size must be non-zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Caller-owned input and output for one `step` call.
pub struct Buffers<'i, 'o> {
    pub input: &'i [u8],
    /// Bytes of `input` consumed so far.
    pub in_pos: usize,
    /// `input` is the last chunk; no more will follow.
    pub eof_in: bool,
    pub output: &'o mut [u8],
    /// Bytes of `output` written so far.
    pub out_pos: usize,
}

impl<'i, 'o> Buffers<'i, 'o> {
    pub fn new(input: &'i [u8], eof_in: bool, output: &'o mut [u8]) -> Self {
        Self {
            input,
            in_pos: 0,
            eof_in,
            output,
            out_pos: 0,
        }
    }

    /// Unconsumed input.
    #[inline]
    pub fn avail_in(&self) -> &'i [u8] {
        &self.input[self.in_pos..]
    }

    /// Free output space.
    #[inline]
    pub fn avail_out(&self) -> usize {
        self.output.len() - self.out_pos
    }

    /// Take up to `max` bytes of input.
    #[inline]
    pub(crate) fn take_in(&mut self, max: usize) -> &'i [u8] {
        let avail = self.avail_in();
        let n = max.min(avail.len());
        self.in_pos += n;
        &avail[..n]
    }

    /// Copy as much of `data` as fits; returns the count written.
    #[inline]
    pub(crate) fn put_out(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.avail_out());
        self.output[self.out_pos..self.out_pos + n].copy_from_slice(&data[..n]);
        self.out_pos += n;
        n
    }

    /// All input consumed and no more is coming.
    #[inline]
    pub fn input_finished(&self) -> bool {
        self.eof_in && self.in_pos == self.input.len()
    }
}

// ---------------------------------------------------------------------------
// Step contract
// ---------------------------------------------------------------------------

/// Result of a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Call again with more input and/or output space.
    Blocked,
    /// Operation complete.
    Done,
}

/// A resumable streaming operation.
pub trait Step {
    /// Advance as far as `bufs` allows.
    ///
    /// Once an error has been returned, every later call fails with
    /// [`Error::Halted`] carrying the same kind. Once `Done` has been
    /// returned, later calls return `Done` without touching `bufs`.
    fn step(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<Status>;

    /// Counters accumulated so far.
    fn stats(&self) -> &Stats;
}

// ---------------------------------------------------------------------------
// Job enum
// ---------------------------------------------------------------------------

/// Any of the four streaming operations.
pub enum Job<'a> {
    Signature(SignatureJob),
    LoadSignature(LoadSignatureJob),
    Delta(DeltaJob<'a>),
    Patch(PatchJob<'a>),
}

impl Job<'_> {
    /// Operation name as shown in stats.
    pub fn name(&self) -> &'static str {
        self.stats().op
    }
}

impl Step for Job<'_> {
    fn step(&mut self, bufs: &mut Buffers<'_, '_>) -> Result<Status> {
        match self {
            Self::Signature(j) => j.step(bufs),
            Self::LoadSignature(j) => j.step(bufs),
            Self::Delta(j) => j.step(bufs),
            Self::Patch(j) => j.step(bufs),
        }
    }

    fn stats(&self) -> &Stats {
        match self {
            Self::Signature(j) => j.stats(),
            Self::LoadSignature(j) => j.stats(),
            Self::Delta(j) => j.stats(),
            Self::Patch(j) => j.stats(),
        }
    }
}

impl From<SignatureJob> for Job<'_> {
    fn from(j: SignatureJob) -> Self {
        Self::Signature(j)
    }
}

impl From<LoadSignatureJob> for Job<'_> {
    fn from(j: LoadSignatureJob) -> Self {
        Self::LoadSignature(j)
    }
}

impl<'a> From<DeltaJob<'a>> for Job<'a> {
    fn from(j: DeltaJob<'a>) -> Self {
        Self::Delta(j)
    }
}

impl<'a> From<PatchJob<'a>> for Job<'a> {
    fn from(j: PatchJob<'a>) -> Self {
        Self::Patch(j)
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counters for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Operation name: "signature", "loadsig", "delta" or "patch".
    pub op: &'static str,
    pub lit_cmds: u64,
    pub lit_bytes: u64,
    /// Header bytes spent on literal commands.
    pub lit_cmdbytes: u64,
    pub copy_cmds: u64,
    pub copy_bytes: u64,
    /// Bytes spent on copy commands.
    pub copy_cmdbytes: u64,
    /// Signature blocks generated or loaded.
    pub sig_blocks: u64,
    pub block_len: u64,
    /// Weak-sum hits rejected by the strong sum.
    pub false_matches: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
    /// First `step` call.
    pub started: Option<Instant>,
    /// Step that returned `Done`.
    pub finished: Option<Instant>,
}

impl Stats {
    pub(crate) fn new(op: &'static str) -> Self {
        Self {
            op,
            ..Self::default()
        }
    }

    pub(crate) fn mark_started(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    pub(crate) fn mark_finished(&mut self) {
        if self.finished.is_none() {
            self.finished = Some(Instant::now());
        }
    }

    /// Wall time from first step to completion.
    pub fn elapsed(&self) -> Option<Duration> {
        Some(self.finished?.saturating_duration_since(self.started?))
    }

    /// Input throughput in MB/s, once the job is done.
    pub fn in_mb_per_sec(&self) -> Option<f64> {
        let secs = self.elapsed()?.as_secs_f64();
        (secs > 0.0).then(|| self.in_bytes as f64 / secs / 1e6)
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} statistics:", self.op)?;
        if self.lit_cmds > 0 {
            write!(
                f,
                " literal[{} cmds, {} bytes, {} cmdbytes]",
                self.lit_cmds, self.lit_bytes, self.lit_cmdbytes
            )?;
        }
        if self.copy_cmds > 0 || self.false_matches > 0 {
            write!(
                f,
                " copy[{} cmds, {} bytes, {} cmdbytes, {} false]",
                self.copy_cmds, self.copy_bytes, self.copy_cmdbytes, self.false_matches
            )?;
        }
        if self.sig_blocks > 0 {
            write!(
                f,
                " signature[{} blocks, {} bytes per block]",
                self.sig_blocks, self.block_len
            )?;
        }
        write!(f, " in {} bytes, out {} bytes", self.in_bytes, self.out_bytes)?;
        if let (Some(elapsed), Some(rate)) = (self.elapsed(), self.in_mb_per_sec()) {
            write!(f, ", {:.3} s ({rate:.1} MB/s)", elapsed.as_secs_f64())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_track_positions() {
        let input = b"hello";
        let mut out = [0u8; 3];
        let mut bufs = Buffers::new(input, true, &mut out);
        assert_eq!(bufs.take_in(2), b"he");
        assert_eq!(bufs.avail_in(), b"llo");
        assert_eq!(bufs.put_out(b"abcd"), 3);
        assert_eq!(bufs.avail_out(), 0);
        assert!(!bufs.input_finished());
        bufs.take_in(10);
        assert!(bufs.input_finished());
        assert_eq!(&out, b"abc");
    }

    #[test]
    fn options_reject_zero_chunk() {
        assert!(JobOptions::default().validate().is_ok());
        assert_eq!(
            JobOptions::with_io_chunk_size(0).validate().unwrap_err().kind(),
            crate::error::ErrorKind::Param
        );
    }

    #[test]
    fn stats_display() {
        let mut s = Stats::new("delta");
        s.lit_cmds = 1;
        s.lit_bytes = 1;
        s.lit_cmdbytes = 1;
        s.copy_cmds = 1;
        s.copy_bytes = 4096;
        s.copy_cmdbytes = 4;
        s.in_bytes = 4097;
        s.out_bytes = 11;
        assert_eq!(
            s.to_string(),
            "delta statistics: literal[1 cmds, 1 bytes, 1 cmdbytes] \
             copy[1 cmds, 4096 bytes, 4 cmdbytes, 0 false] in 4097 bytes, out 11 bytes"
        );
    }

    #[test]
    fn stats_timing() {
        let mut s = Stats::new("signature");
        assert_eq!(s.elapsed(), None);
        let t0 = Instant::now();
        s.started = Some(t0);
        s.finished = Some(t0 + Duration::from_secs(2));
        s.in_bytes = 4_000_000;
        assert_eq!(s.elapsed(), Some(Duration::from_secs(2)));
        assert_eq!(s.in_mb_per_sec(), Some(2.0));
        assert!(s.to_string().ends_with("in 4000000 bytes, out 0 bytes, 2.000 s (2.0 MB/s)"));

        s.mark_started();
        assert_eq!(s.started, Some(t0));
    }
}
