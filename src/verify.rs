// Copyright 2025 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-page integrity verification.
//!
//! Read-only areas register one SHA-256 digest per page. A frame loaded
//! from the (untrusted) backing store is hashed through the alias window
//! and compared against the registered digest before it is installed;
//! a mismatch means tampering or corruption and is never retried.

use sha2::{Digest as _, Sha256};

/// Width of a page digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// SHA-256 digest of a single page.
pub type Digest = [u8; DIGEST_LEN];

/// Error returned when a loaded page fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// Computed digest differs from the registered one.
    Mismatch,
}

/// Computes the digest of `bytes`.
pub fn page_digest(bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Compares `bytes` against `expected`.
pub fn verify_page(bytes: &[u8], expected: &Digest) -> Result<(), VerifyError> {
    if page_digest(bytes) == *expected {
        Ok(())
    } else {
        Err(VerifyError::Mismatch)
    }
}
