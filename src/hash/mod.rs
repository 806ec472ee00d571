// Checksums and block matching for rsync-style deltas.
//
// This module provides:
// - Rolling weak sums (Rollsum and Rabin-Karp)
// - Strong digests (MD4 and BLAKE2b), truncatable
// - The weak-sum index over a signature
// - Candidate verification with copy-continuation preference
// - Signature parameter recommendation

pub mod config;
pub mod matching;
pub mod rolling;
pub mod strong;
pub mod table;

pub use config::{SignatureArgs, StrongLenRequest, recommend};
pub use table::HashIndex;
