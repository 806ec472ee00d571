// Job driver: runs any streaming job between a `Read` and a `Write`.
//
// Also provides whole-buffer helpers built on the same jobs:
//   - `signature`: basis bytes -> signature stream
//   - `load_signature`: signature stream -> `Signature`
//   - `delta`: new bytes + index -> delta stream
//   - `patch`: delta stream + basis -> new bytes

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::format::signature::Signature;
use crate::hash::config::SignatureArgs;
use crate::hash::table::HashIndex;
use crate::job::{
    BasisSource, Buffers, DeltaJob, Job, JobOptions, LoadSignatureJob, PatchJob, SignatureJob,
    Stats, Status, Step,
};

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Drive `job` to completion, reading from `reader` and writing to `writer`.
///
/// Input the job has not consumed yet is kept and offered again on the
/// next step. Bytes the job leaves unread at completion (after a delta's
/// END command) are discarded. Returns the job's final stats.
pub fn run<S, R, W>(job: &mut S, mut reader: R, mut writer: W, opts: &JobOptions) -> Result<Stats>
where
    S: Step + ?Sized,
    R: Read,
    W: Write,
{
    opts.validate()?;
    let cap = opts.io_chunk_size;
    let mut inbuf = Vec::new();
    inbuf.try_reserve_exact(cap)?;
    inbuf.resize(cap, 0u8);
    let mut outbuf = Vec::new();
    outbuf.try_reserve_exact(cap)?;
    outbuf.resize(cap, 0u8);

    let mut in_len = 0usize;
    let mut eof = false;

    loop {
        if !eof && in_len < cap {
            match reader.read(&mut inbuf[in_len..]) {
                Ok(0) => eof = true,
                Ok(n) => in_len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let mut bufs = Buffers::new(&inbuf[..in_len], eof, &mut outbuf);
        let status = job.step(&mut bufs)?;
        let consumed = bufs.in_pos;
        let produced = bufs.out_pos;

        if produced > 0 {
            writer.write_all(&outbuf[..produced])?;
        }
        inbuf.copy_within(consumed..in_len, 0);
        in_len -= consumed;

        match status {
            Status::Done => {
                writer.flush()?;
                let stats = job.stats().clone();
                log::debug!("{stats}");
                return Ok(stats);
            }
            Status::Blocked => {
                let stuck = consumed == 0 && produced == 0 && (eof || in_len == cap);
                if stuck {
                    return Err(Error::Internal("job made no progress"));
                }
            }
        }
    }
}

/// Drive a [`Job`] with default options.
pub fn run_job<R: Read, W: Write>(job: &mut Job<'_>, reader: R, writer: W) -> Result<Stats> {
    run(job, reader, writer, &JobOptions::default())
}

// ---------------------------------------------------------------------------
// In-memory helpers
// ---------------------------------------------------------------------------

/// Signature stream for `basis`.
pub fn signature(basis: &[u8], args: &SignatureArgs) -> Result<Vec<u8>> {
    let opts = JobOptions::default();
    let mut job = SignatureJob::new(args, &opts)?;
    let mut out = Vec::new();
    run(&mut job, basis, &mut out, &opts)?;
    Ok(out)
}

/// Parse a signature stream.
pub fn load_signature(sig: &[u8]) -> Result<Signature> {
    let opts = JobOptions::default();
    let mut job = LoadSignatureJob::new();
    run(&mut job, sig, io::sink(), &opts)?;
    job.into_signature()
}

/// Delta of `new` against the signature behind `index`.
pub fn delta(index: &HashIndex, new: &[u8]) -> Result<Vec<u8>> {
    let opts = JobOptions::default();
    let mut job = DeltaJob::new(index, &opts)?;
    let mut out = Vec::new();
    run(&mut job, new, &mut out, &opts)?;
    Ok(out)
}

/// Apply `delta` to `basis`.
pub fn patch(basis: impl BasisSource, delta: &[u8]) -> Result<Vec<u8>> {
    let opts = JobOptions::default();
    let mut job = PatchJob::new(basis, &opts)?;
    let mut out = Vec::new();
    run(&mut job, delta, &mut out, &opts)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::format::command::{Command, parse_commands};

    fn index_for(basis: &[u8], args: &SignatureArgs) -> HashIndex {
        let sig = signature(basis, args).unwrap();
        HashIndex::build(load_signature(&sig).unwrap()).unwrap()
    }

    fn roundtrip(basis: &[u8], new: &[u8], args: &SignatureArgs) -> Vec<u8> {
        let index = index_for(basis, args);
        let d = delta(&index, new).unwrap();
        let out = patch(basis, &d).unwrap();
        assert_eq!(out, new);
        d
    }

    #[test]
    fn simple_roundtrip() {
        let args = SignatureArgs::for_size(Some(11));
        roundtrip(b"hello world", b"hello brave new world", &args);
    }

    #[test]
    fn seed_append_case() {
        let basis = vec![b'A'; 5000];
        let mut new = basis.clone();
        new.push(b'X');
        let args = SignatureArgs::for_size(Some(basis.len() as u64));
        let index = index_for(&basis, &args);
        assert_eq!(index.len(), basis.len().div_ceil(256));
        let d = delta(&index, &new).unwrap();
        assert_eq!(
            parse_commands(&d).unwrap(),
            vec![
                Command::Copy { offset: 0, len: 5000 },
                Command::Literal(b"X".to_vec())
            ]
        );
        assert_eq!(patch(&basis[..], &d).unwrap(), new);
    }

    #[test]
    fn small_chunks_drive_to_same_result() {
        let basis: Vec<u8> = (0..3000u32).map(|i| (i * 31 % 256) as u8).collect();
        let mut new = basis[100..2000].to_vec();
        new.extend_from_slice(b"inserted");
        new.extend_from_slice(&basis[2000..]);
        let args = SignatureArgs::for_size(Some(basis.len() as u64));
        let index = index_for(&basis, &args);

        let opts = JobOptions::with_io_chunk_size(3);
        let mut job = DeltaJob::new(&index, &opts).unwrap();
        let mut small = Vec::new();
        let stats = run(&mut job, &new[..], &mut small, &opts).unwrap();
        assert!(stats.lit_cmds >= 3);
        assert_eq!(stats.in_bytes, new.len() as u64);
        assert_eq!(stats.out_bytes, small.len() as u64);

        let mut job = PatchJob::new(&basis[..], &opts).unwrap();
        let mut out = Vec::new();
        run(&mut job, &small[..], &mut out, &opts).unwrap();
        assert_eq!(out, new);
    }

    #[test]
    fn job_enum_dispatches() {
        let args = SignatureArgs::default();
        let mut job: Job<'_> = SignatureJob::new(&args, &JobOptions::default()).unwrap().into();
        assert_eq!(job.name(), "signature");
        let mut out = Vec::new();
        let stats = run_job(&mut job, &b"abc"[..], &mut out).unwrap();
        assert_eq!(stats.sig_blocks, 1);
        assert_eq!(out, signature(b"abc", &args).unwrap());
    }

    #[test]
    fn finished_job_records_timing() {
        let args = SignatureArgs::default();
        let mut job = SignatureJob::new(&args, &JobOptions::default()).unwrap();
        let stats = run(&mut job, &b"timed input"[..], io::sink(), &JobOptions::default()).unwrap();
        let (Some(start), Some(end)) = (stats.started, stats.finished) else {
            panic!("timestamps missing: {stats:?}");
        };
        assert!(end >= start);
        assert_eq!(stats.elapsed(), Some(end - start));
    }

    #[test]
    fn truncated_delta_fails() {
        let args = SignatureArgs::for_size(Some(100));
        let basis = vec![1u8; 100];
        let index = index_for(&basis, &args);
        let d = delta(&index, b"some new content").unwrap();
        let err = patch(&basis[..], &d[..d.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn read_errors_propagate() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("boom"))
            }
        }
        let mut job = LoadSignatureJob::new();
        let err = run(&mut job, Failing, io::sink(), &JobOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
