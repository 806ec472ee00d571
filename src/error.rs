// Error taxonomy shared by every job.
//
// A job that hits any of these moves to its terminal failed phase; later
// `step` calls report the same kind again through `Error::Halted`.

use std::collections::TryReserveError;
use std::fmt;
use std::io;

use thiserror::Error;

/// Errors produced by signature, delta and patch jobs.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying byte source or sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stream header does not carry a known signature or delta magic.
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    /// Structurally invalid stream data.
    #[error("corrupt stream: {0}")]
    Corrupt(String),

    /// Invalid caller-supplied configuration.
    #[error("invalid parameter: {0}")]
    Param(String),

    /// Allocation of an internal buffer failed.
    #[error("out of memory: {0}")]
    Memory(#[from] TryReserveError),

    /// Format variant intentionally not supported.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Invariant violation inside the library.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// A job was stepped again after it had already failed.
    #[error("job previously failed ({0})")]
    Halted(ErrorKind),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Comparable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    BadMagic,
    Corrupt,
    Param,
    Memory,
    Unimplemented,
    Internal,
}

impl Error {
    /// Classify this error. `Halted` reports the kind of the original failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::BadMagic(_) => ErrorKind::BadMagic,
            Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::Param(_) => ErrorKind::Param,
            Self::Memory(_) => ErrorKind::Memory,
            Self::Unimplemented(_) => ErrorKind::Unimplemented,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Halted(kind) => *kind,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub(crate) fn param(msg: impl Into<String>) -> Self {
        Self::Param(msg.into())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Io => "I/O error",
            Self::BadMagic => "bad magic",
            Self::Corrupt => "corrupt stream",
            Self::Param => "invalid parameter",
            Self::Memory => "out of memory",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal error",
        };
        f.write_str(name)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
