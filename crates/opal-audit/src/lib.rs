//! # opal-audit
//!
//! Immutable, append-only, hash-chained audit trail for the OPAL offline
//! payment core.
//!
//! ## Overview
//!
//! Every state transition worth witnessing — mint, settle, refund, expiry —
//! is recorded as an `AuditEntry` whose chain hash commits to the previous
//! entry. Tampering with any stored entry breaks recomputation and is
//! detected by `verify_chain`.
//!
//! Retention is capped at 500 entries. Dropping the oldest entry would
//! normally sever the chain from genesis, so on eviction the dropped
//! entry's chain hash is checkpointed as the trail's *anchor*: the oldest
//! retained entry is verified against the anchor instead of genesis, and
//! tamper evidence over the retained window is preserved. True end-to-end
//! tamper evidence needs unbounded retention or external notarization of
//! the checkpoints.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use opal_audit::{AuditCategory, AuditTrail};
//! use opal_crypto::KeyedDigest;
//!
//! let trail = AuditTrail::new(KeyedDigest::new(device_secret), "opal-demo/0.1");
//! trail.record(AuditCategory::Transaction, "offline-mint", "1500 to MERCHANT001")?;
//! assert!(trail.verify_chain());
//! println!("{}", trail.export_csv());
//! ```

pub mod chain;
pub mod entry;
pub mod trail;

pub use chain::{hash_entry, verify_entries};
pub use entry::{AuditCategory, AuditEntry, AuditSummary, GENESIS_HASH};
pub use trail::{AuditTrail, MAX_ENTRIES};

// ── Tests ─────────────────────────────────────────────────────────────────────
