//! The audit trail: an append-only, capped, hash-chained event log.
//!
//! All writes go through one `Mutex`, so chain-hash computation always
//! observes a consistent head — two concurrent `record` calls cannot both
//! read the same head and fork the chain.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use opal_contracts::error::{OpalError, OpalResult};
use opal_crypto::KeyedDigest;

use crate::chain::{hash_entry, verify_entries};
use crate::entry::{AuditCategory, AuditEntry, AuditSummary, GENESIS_HASH};

/// Retention cap: once exceeded, the oldest entries are dropped on write.
pub const MAX_ENTRIES: usize = 500;

/// Device info strings are truncated to this many characters before
/// storage.
const DEVICE_INFO_MAX: usize = 60;

/// Alphabet for the random id suffix (base 36, lowercase).
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct TrailState {
    /// Retained entries, newest first.
    pub(crate) entries: Vec<AuditEntry>,

    /// The "previous hash" the oldest retained entry must chain from:
    /// `GENESIS_HASH` until the first eviction, then the chain hash of the
    /// most recently evicted entry. This is the checkpoint that keeps the
    /// chain verifiable after old entries are dropped.
    pub(crate) anchor: String,

    /// How many entries have been evicted over the trail's lifetime.
    pub(crate) evicted: u64,
}

// ── Public trail ──────────────────────────────────────────────────────────────

/// Append-only, hash-chained audit log capped at [`MAX_ENTRIES`].
///
/// The trail exclusively owns its store: no component may edit or delete an
/// existing entry, only append. Chain-integrity problems are surfaced by
/// [`verify_chain`](AuditTrail::verify_chain) as a boolean, never thrown
/// during recording — audit writes must not be blocked by a verification
/// failure elsewhere in the chain.
pub struct AuditTrail {
    digest: KeyedDigest,
    device_info: String,
    pub(crate) state: Mutex<TrailState>,
}

impl AuditTrail {
    /// Create an empty trail.
    ///
    /// `digest` is the same keyed primitive used for token signatures;
    /// `device_info` is stamped onto every entry (truncated to 60 chars).
    pub fn new(digest: KeyedDigest, device_info: impl Into<String>) -> Self {
        // Character count, not byte count: device strings are user-agent
        // style and may contain multibyte characters.
        let device_info: String = device_info.into().chars().take(DEVICE_INFO_MAX).collect();

        Self {
            digest,
            device_info,
            state: Mutex::new(TrailState {
                entries: Vec::new(),
                anchor: GENESIS_HASH.to_string(),
                evicted: 0,
            }),
        }
    }

    /// Append one entry to the chain.
    ///
    /// Computes the new entry's chain hash from the current head (or the
    /// genesis sentinel when the log is empty), prepends it, and evicts
    /// beyond the retention cap. Effectively atomic with respect to head
    /// reads: the whole operation holds the trail lock.
    ///
    /// # Errors
    ///
    /// `OpalError::AuditWriteFailed` only if the trail lock is poisoned,
    /// which cannot happen under normal operation.
    pub fn record(
        &self,
        category: AuditCategory,
        action: &str,
        detail: &str,
    ) -> OpalResult<()> {
        let mut state = self.state.lock().map_err(|e| OpalError::AuditWriteFailed {
            reason: format!("audit trail lock poisoned: {}", e),
        })?;

        let timestamp = Utc::now();
        let mut entry = AuditEntry {
            id: make_entry_id(timestamp.timestamp_millis()),
            timestamp,
            category,
            action: action.to_string(),
            detail: detail.to_string(),
            device_info: self.device_info.clone(),
            chain_hash: String::new(),
        };

        let prev_hash = state
            .entries
            .first()
            .map(|head| head.chain_hash.clone())
            .unwrap_or_else(|| state.anchor.clone());
        entry.chain_hash = hash_entry(&self.digest, &prev_hash, &entry);

        debug!(
            id = %entry.id,
            category = %category,
            action,
            "audit entry recorded"
        );

        state.entries.insert(0, entry);

        // Retention: drop the oldest entries, checkpointing the hash of the
        // newest dropped one as the chain's new anchor.
        if state.entries.len() > MAX_ENTRIES {
            let new_anchor = state.entries[MAX_ENTRIES].chain_hash.clone();
            let dropped = state.entries.len() - MAX_ENTRIES;
            state.entries.truncate(MAX_ENTRIES);
            state.anchor = new_anchor;
            state.evicted += dropped as u64;

            warn!(
                dropped,
                total_evicted = state.evicted,
                "audit trail over retention cap, oldest entries evicted"
            );
        }

        Ok(())
    }

    /// Walk the chain oldest→newest, recomputing every hash.
    ///
    /// Returns `false` on the first mismatch, `true` when the whole chain —
    /// down to the anchor — checks out. A mismatch at any position signals
    /// tampering or loss.
    pub fn verify_chain(&self) -> bool {
        let state = self.state.lock().expect("audit trail lock poisoned");
        verify_entries(&self.digest, &state.anchor, &state.entries)
    }

    /// Counts by category, first/last timestamps, and chain validity.
    pub fn summary(&self) -> AuditSummary {
        let (entries, anchor) = {
            let state = self.state.lock().expect("audit trail lock poisoned");
            (state.entries.clone(), state.anchor.clone())
        };

        let by_category = AuditCategory::ALL
            .iter()
            .map(|&cat| (cat, entries.iter().filter(|e| e.category == cat).count()))
            .collect();

        AuditSummary {
            total_entries: entries.len(),
            by_category,
            first_entry: entries.last().map(|e| e.timestamp),
            last_entry: entries.first().map(|e| e.timestamp),
            chain_intact: verify_entries(&self.digest, &anchor, &entries),
        }
    }

    /// Flattened, human-auditable rendering of every retained entry in
    /// stored (newest-first) order.
    ///
    /// One header line plus one row per entry; timestamps in ISO-8601; the
    /// chain hash truncated to 16 hex characters followed by an ellipsis
    /// for external cross-checking.
    pub fn export_csv(&self) -> String {
        let state = self.state.lock().expect("audit trail lock poisoned");

        let mut out = String::from("ID,Timestamp,Category,Action,Detail,DeviceInfo,ChainHash");
        for entry in &state.entries {
            out.push('\n');
            out.push_str(&format!(
                "{},{},{},{},\"{}\",{},{}…",
                entry.id,
                entry.timestamp.to_rfc3339(),
                entry.category,
                entry.action,
                entry.detail.replace('"', "\"\""),
                entry.device_info,
                &entry.chain_hash[..16],
            ));
        }
        out
    }

    /// Snapshot of the retained entries, newest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        let state = self.state.lock().expect("audit trail lock poisoned");
        state.entries.clone()
    }

    /// How many entries have been evicted by retention so far.
    pub fn evicted(&self) -> u64 {
        let state = self.state.lock().expect("audit trail lock poisoned");
        state.evicted
    }

    /// Reset the trail to empty. Admin/test use only.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("audit trail lock poisoned");
        info!(dropped = state.entries.len(), "audit trail cleared");
        state.entries.clear();
        state.anchor = GENESIS_HASH.to_string();
        state.evicted = 0;
    }
}

/// Build an entry id: `AUD{epoch_millis}{4 random base-36 chars}`.
fn make_entry_id(millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("AUD{}{}", millis, suffix)
}
