//! Whole-stream SHA-256 digest.
//!
//! The digest covers the original uncompressed stream as one unit, not the
//! blocks, so reordered or substituted block records that still decode to
//! their declared lengths are caught.

use sha2::{Digest as _, Sha256};

use crate::error::IntegrityError;

pub const DIGEST_LEN: usize = 32;
pub type Digest = [u8; DIGEST_LEN];

pub fn digest(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Recompute over `data` and compare against `expected`.
pub fn verify(expected: &Digest, data: &[u8]) -> Result<(), IntegrityError> {
    let actual = digest(data);
    if &actual != expected {
        return Err(IntegrityError::DigestMismatch {
            expected: hex::encode(expected),
            actual:   hex::encode(actual),
        });
    }
    Ok(())
}
