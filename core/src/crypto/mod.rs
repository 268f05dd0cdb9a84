//! # Cryptographic Primitives
//!
//! SHA-256 via the `sha2` crate, plus helpers for its hex form. Block
//! hashes and proof-of-work checks go through here.

pub mod hash;

pub use hash::{finalize_hex, has_zero_prefix, sha256, sha256_hex, Sha256};
