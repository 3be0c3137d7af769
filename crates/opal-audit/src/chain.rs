//! Hash-chain primitives: entry hashing and chain integrity verification.
//!
//! The chain hash of each entry is a keyed digest (the same primitive that
//! signs offline tokens) over an explicit part list, so nothing is
//! accidentally omitted.
//!
//! Digest parts, in order:
//!   1. the previous entry's chain hash (or the trail's anchor)
//!   2. the entry id
//!   3. the entry timestamp as epoch milliseconds
//!   4. the category name
//!   5. the action

use opal_crypto::KeyedDigest;

use crate::entry::AuditEntry;

/// Compute the chain hash for a single entry given its predecessor's hash.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_entry(digest: &KeyedDigest, prev_hash: &str, entry: &AuditEntry) -> String {
    let millis = entry.timestamp.timestamp_millis().to_string();
    let category = entry.category.to_string();
    digest.digest(&[prev_hash, &entry.id, &millis, &category, &entry.action])
}

/// Verify the integrity of a hash chain stored newest-first.
///
/// Walks the entries in chain order (oldest→newest), recomputing every
/// `chain_hash` from its predecessor and comparing against the stored
/// value. The oldest retained entry is checked against `anchor` — the
/// genesis sentinel before any eviction, or the chain hash of the last
/// evicted entry after (see the trail's retention policy).
///
/// Returns `false` the moment any mismatch is detected. An empty chain is
/// defined as valid.
pub fn verify_entries(digest: &KeyedDigest, anchor: &str, entries_newest_first: &[AuditEntry]) -> bool {
    let mut expected_prev = anchor.to_string();

    for entry in entries_newest_first.iter().rev() {
        let recomputed = hash_entry(digest, &expected_prev, entry);
        if entry.chain_hash != recomputed {
            return false;
        }
        expected_prev = entry.chain_hash.clone();
    }

    true
}
