//! # opal-crypto
//!
//! The crypto binder: a deterministic keyed digest over an ordered list of
//! string parts, plus nonce generation. The same primitive signs offline
//! tokens and chains audit entries — only the canonical inputs differ.
//!
//! Digest input layout (bytes, in order):
//!   1. the key bytes
//!   2. for each part: a 0x1F unit separator, then the part as UTF-8 bytes
//!
//! The separator keeps part boundaries unambiguous: `["ab", "c"]` and
//! `["a", "bc"]` produce different digests.
//!
//! ## Production note
//!
//! This is a keyed hash, not a signature. It provides integrity but not
//! non-repudiation — no device-private asymmetric key is involved. A
//! production deployment MUST replace it with an asymmetric signature tied
//! to a hardware-backed key; only the integrity/binding contract is
//! preserved here.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Byte inserted before every part so boundaries cannot be confused.
const PART_SEPARATOR: u8 = 0x1F;

/// A deterministic keyed SHA-256 digest over ordered string parts.
///
/// No side effects; the same key and parts always produce the same
/// lowercase 64-character hex string.
#[derive(Clone)]
pub struct KeyedDigest {
    key: Vec<u8>,
}

impl KeyedDigest {
    /// Create a digest bound to the given key.
    ///
    /// The key is typically the device secret held by the wallet process.
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self { key: key.as_ref().to_vec() }
    }

    /// Compute the keyed digest over `parts` in order.
    ///
    /// Returns a lowercase 64-character hex string.
    pub fn digest(&self, parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        for part in parts {
            hasher.update([PART_SEPARATOR]);
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Debug for KeyedDigest {
    /// The key never appears in debug output or logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedDigest").finish_non_exhaustive()
    }
}

/// Generate a random 16-byte nonce as 32 lowercase hex characters.
///
/// Used at token mint so two tokens with identical amount, merchant, and
/// timestamp cannot collide.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
