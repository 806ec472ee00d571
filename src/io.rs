// File-level helpers for signature, delta and patch.
//
// Inputs are streamed through `BufReader`s and outputs written through
// `BufWriter`s; only the signature is held in memory for delta. The basis
// for patch is read on demand through `SeekBasis`. With the `file-io`
// feature a SHA-256 of each produced file is computed as it is written.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::engine;
use crate::error::Result;
use crate::format::signature::Signature;
use crate::hash::config::SignatureArgs;
use crate::hash::table::HashIndex;
use crate::job::{
    BasisSource, DeltaJob, JobOptions, LoadSignatureJob, PatchJob, SignatureJob, Stats, Step,
};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Result of one file operation.
#[derive(Debug, Clone)]
pub struct FileStats {
    /// Size of the streamed input file in bytes.
    pub input_size: u64,
    /// Size of the written output file in bytes.
    pub output_size: u64,
    /// Counters from the job that ran.
    pub job: Stats,
    /// SHA-256 of the output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Seekable basis
// ---------------------------------------------------------------------------

/// Basis backed by any seekable reader, e.g. a `File`.
pub struct SeekBasis<R> {
    inner: R,
}

impl<R: Read + Seek> SeekBasis<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> BasisSource for SeekBasis<R> {
    fn read(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut out = Vec::with_capacity(len);
        (&mut self.inner).take(len as u64).read_to_end(&mut out)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Write the signature of `basis_path` to `sig_path`.
pub fn signature_file(
    basis_path: &Path,
    sig_path: &Path,
    args: &SignatureArgs,
    opts: &JobOptions,
) -> Result<FileStats> {
    let mut job = SignatureJob::new(args, opts)?;
    run_to_file(&mut job, basis_path, sig_path, opts)
}

/// Load and parse a signature file.
pub fn load_signature_file(sig_path: &Path, opts: &JobOptions) -> Result<Signature> {
    let reader = BufReader::with_capacity(BUF_SIZE, File::open(sig_path)?);
    let mut job = LoadSignatureJob::new();
    engine::run(&mut job, reader, io::sink(), opts)?;
    job.into_signature()
}

/// Write the delta of `new_path` against the signature in `sig_path`.
pub fn delta_file(
    sig_path: &Path,
    new_path: &Path,
    delta_path: &Path,
    opts: &JobOptions,
) -> Result<FileStats> {
    let index = HashIndex::build(load_signature_file(sig_path, opts)?)?;
    let mut job = DeltaJob::new(&index, opts)?;
    run_to_file(&mut job, new_path, delta_path, opts)
}

/// Apply the delta in `delta_path` to `basis_path`, writing `out_path`.
pub fn patch_file(
    basis_path: &Path,
    delta_path: &Path,
    out_path: &Path,
    opts: &JobOptions,
) -> Result<FileStats> {
    let basis = SeekBasis::new(BufReader::with_capacity(BUF_SIZE, File::open(basis_path)?));
    let mut job = PatchJob::new(basis, opts)?;
    run_to_file(&mut job, delta_path, out_path, opts)
}

/// Stream `input_path` through `job` into `output_path`.
fn run_to_file<S: Step>(
    job: &mut S,
    input_path: &Path,
    output_path: &Path,
    opts: &JobOptions,
) -> Result<FileStats> {
    let input = File::open(input_path)?;
    let input_size = input.metadata()?.len();
    let reader = BufReader::with_capacity(BUF_SIZE, input);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    #[cfg(feature = "file-io")]
    let job_stats = {
        let hashing = HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        };
        engine::run(job, reader, hashing, opts)?
    };

    #[cfg(not(feature = "file-io"))]
    let job_stats = engine::run(job, reader, &mut writer, opts)?;

    let output_size = writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .metadata()?
        .len();

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    Ok(FileStats {
        input_size,
        output_size,
        job: job_stats,
        output_sha256,
    })
}

/// SHA-256 of a whole file.
#[cfg(feature = "file-io")]
pub fn sha256_file(path: &Path) -> Result<[u8; 32]> {
    let mut reader = BufReader::with_capacity(BUF_SIZE, File::open(path)?);
    let mut hasher = sha2::Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
