//! Oxisync: librsync-compatible signature, delta and patch in Rust.
//!
//! The crate provides:
//! - Wire formats for signatures and deltas (`format`)
//! - Rolling and strong checksums plus the block index (`hash`)
//! - Resumable streaming jobs (`job`)
//! - A driver and whole-buffer helpers (`engine`)
//! - File-oriented helpers (`io`)
//! - An optional rdiff-style CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use oxisync::{HashIndex, SignatureArgs, engine};
//!
//! let basis = b"hello old world";
//! let new = b"hello new world";
//!
//! let args = SignatureArgs::for_size(Some(basis.len() as u64));
//! let sig = engine::signature(basis, &args).unwrap();
//! let index = HashIndex::build(engine::load_signature(&sig).unwrap()).unwrap();
//! let delta = engine::delta(&index, new).unwrap();
//! let rebuilt = engine::patch(&basis[..], &delta).unwrap();
//! assert_eq!(rebuilt, new);
//! ```

pub mod engine;
pub mod error;
pub mod format;
pub mod hash;
pub mod io;
pub mod job;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, ErrorKind, Result};
pub use format::{Signature, SignatureMagic};
pub use hash::{HashIndex, SignatureArgs, StrongLenRequest, recommend};
pub use job::{
    BasisSource, DeltaJob, FnBasis, Job, JobOptions, LoadSignatureJob, PatchJob, SignatureJob,
    Stats, Status, Step,
};
