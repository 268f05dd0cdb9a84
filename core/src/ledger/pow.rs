//! # Proof of Work
//!
//! Incrementing nonce search: the winning nonce is the smallest one whose
//! hex hash starts with `difficulty` `'0'` characters. The search is
//! unbounded unless `max_iterations` is set, in which case it gives up
//! after that many attempts.

use tracing::debug;

use super::block::{hash_with_nonce, HashBlock};
use crate::crypto::has_zero_prefix;

/// Attempts between progress logs.
const PROGRESS_INTERVAL: u64 = 1 << 20;

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub hash: String,
    /// Hashes computed, including the winning one.
    pub attempts: u64,
}

/// Nonce search configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    pub difficulty: u32,
    pub max_iterations: Option<u64>,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            max_iterations: None,
        }
    }

    /// Cap the number of attempts.
    pub fn with_max_iterations(mut self, max_iterations: Option<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Search for a nonce that satisfies the difficulty for `block`.
    ///
    /// Returns `None` only when a cap is set and exhausted.
    pub fn solve(&self, block: &HashBlock) -> Option<Solution> {
        let zeros = self.difficulty as usize;
        let prefix = block.preimage_prefix();
        let mut nonce = 0u64;

        loop {
            if let Some(max) = self.max_iterations {
                if nonce >= max {
                    debug!(index = block.index, attempts = nonce, "proof-of-work cap reached");
                    return None;
                }
            }

            let hash = hash_with_nonce(prefix.clone(), nonce);
            if has_zero_prefix(&hash, zeros) {
                return Some(Solution {
                    nonce,
                    hash,
                    attempts: nonce + 1,
                });
            }

            nonce = nonce.checked_add(1)?;
            if nonce % PROGRESS_INTERVAL == 0 {
                debug!(
                    index = block.index,
                    attempts = nonce,
                    difficulty = self.difficulty,
                    "mining"
                );
            }
        }
    }

    /// Run [`solve`](Self::solve) and write the result into `block`.
    pub fn seal(&self, block: &mut HashBlock) -> Option<u64> {
        let solution = self.solve(block)?;
        block.nonce = solution.nonce;
        block.hash = solution.hash;
        Some(solution.attempts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
