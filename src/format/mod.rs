// Wire formats: magic numbers, big-endian integers, delta commands and
// signature streams.

pub mod command;
pub mod magic;
pub mod netint;
pub mod signature;

pub use command::{Command, parse_commands};
pub use magic::{DELTA_MAGIC, SignatureMagic};
pub use signature::{BlockSig, Signature};
