//! # Hashing Utilities
//!
//! SHA-256 is the only digest the ledger uses. Block hashes are carried as
//! lowercase hex because the proof-of-work target is defined over the
//! textual form ("starts with N `'0'` characters"), and every consumer of
//! the export document expects strings it can compare byte for byte.
//!
//! The streaming [`Sha256`] state is re-exported so the nonce search can
//! hash a block's fixed preimage once and clone the state per attempt.

pub use sha2::Sha256;
use sha2::Digest;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use chainstore_core::crypto::sha256;
///
/// let hash = sha256(b"chainstore");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the SHA-256 hash of the input and return it as lowercase hex.
///
/// # Example
///
/// ```
/// use chainstore_core::crypto::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Finish a (cloned) streaming hasher and hex-encode the digest.
pub fn finalize_hex(hasher: Sha256) -> String {
    hex::encode(hasher.finalize())
}

/// Returns `true` if `hash_hex` begins with `zeros` consecutive `'0'`
/// characters. A zero-length prefix is always satisfied.
pub fn has_zero_prefix(hash_hex: &str, zeros: usize) -> bool {
    hash_hex.len() >= zeros && hash_hex.bytes().take(zeros).all(|b| b == b'0')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
