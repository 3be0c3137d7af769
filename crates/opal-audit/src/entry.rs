//! Audit entry and summary types.
//!
//! `AuditEntry` is a single link in the hash chain. Entries are stored
//! newest-first for cheap "latest activity" reads, but the chain itself is
//! defined oldest→newest — verification always walks in chain order, not
//! storage order.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What part of the system an audit entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Auth,
    Transaction,
    Sync,
    Wallet,
    Security,
    Kyc,
    Config,
}

impl AuditCategory {
    /// Every category, in a fixed order, for summary tables.
    pub const ALL: [AuditCategory; 7] = [
        AuditCategory::Auth,
        AuditCategory::Transaction,
        AuditCategory::Sync,
        AuditCategory::Wallet,
        AuditCategory::Security,
        AuditCategory::Kyc,
        AuditCategory::Config,
    ];
}

impl fmt::Display for AuditCategory {
    /// Lowercase names; these appear in chain inputs, so they are stable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditCategory::Auth => "auth",
            AuditCategory::Transaction => "transaction",
            AuditCategory::Sync => "sync",
            AuditCategory::Wallet => "wallet",
            AuditCategory::Security => "security",
            AuditCategory::Kyc => "kyc",
            AuditCategory::Config => "config",
        };
        f.write_str(name)
    }
}

/// A single append-only record in the audit trail.
///
/// The chain hash commits to the previous entry's hash, this entry's id and
/// timestamp, its category, and its action. Mutating any of those fields in
/// storage breaks recomputation, which `verify_chain` detects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// `AUD{epoch_millis}{4 random base-36 chars}`.
    pub id: String,

    /// When the entry was recorded (UTC).
    pub timestamp: DateTime<Utc>,

    pub category: AuditCategory,

    /// Short verb phrase, e.g. `offline-mint`, `settle-success`.
    pub action: String,

    /// Free-form context. Not part of the chain input.
    pub detail: String,

    /// Identifying string for the recording device, truncated to 60 chars.
    pub device_info: String,

    /// Keyed digest of `prev_hash | id | timestamp_millis | category |
    /// action`, where `prev_hash` is the previous entry's `chain_hash` or
    /// the trail's anchor for the oldest retained entry.
    pub chain_hash: String,
}

/// The sentinel "previous hash" for the first entry ever written.
///
/// 64 hex zeros — a value that can never be the digest of real data, making
/// genesis detection unambiguous.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Point-in-time overview of the trail, for reporting surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Entries currently retained (evicted entries are not counted).
    pub total_entries: usize,

    /// Retained entries per category; every category is present, zero or
    /// not.
    pub by_category: Vec<(AuditCategory, usize)>,

    /// Timestamp of the oldest retained entry.
    pub first_entry: Option<DateTime<Utc>>,

    /// Timestamp of the newest entry.
    pub last_entry: Option<DateTime<Utc>>,

    /// Result of a full chain verification at summary time.
    pub chain_intact: bool,
}
