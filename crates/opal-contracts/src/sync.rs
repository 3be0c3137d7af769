//! Sync run reporting types.
//!
//! `SyncResult` and `SyncReport` are derived, not persisted, state: one
//! result per token processed in a run, one report per run. Reports live
//! only for the current session and are never replayed into the audit
//! chain automatically — the caller decides what to audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// No run in flight.
    Idle,
    /// Compacting expired tokens and collecting pending ones.
    Collecting,
    /// Attempting settlement of pending tokens.
    Settling,
    /// The last run finished and produced a report.
    Complete,
    /// The last run aborted on an internal error.
    Error,
}

/// The outcome for a single token within one sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// The token this result describes.
    pub token_id: String,

    /// Merchant name carried through for reporting.
    pub merchant_name: String,

    /// Token amount, echoed so the caller can apply balance deltas without
    /// a second store lookup.
    pub amount: i64,

    /// True only when the settlement authority accepted the token.
    pub success: bool,

    /// Failure reason. `None` on success; on failure, either a verbatim
    /// validation reason, a rejection reason from the authority, the
    /// exhausted-retries message, or the expiry-refund message.
    pub reason: Option<String>,

    /// How many settlement attempts this token has consumed, lifetime.
    /// Zero for expired tokens, which are never attempted.
    pub attempts: u32,
}

/// Aggregated outcome of one full sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Tokens considered: pending plus expired.
    pub total: usize,

    /// Tokens the authority accepted.
    pub settled: usize,

    /// Tokens that reached a terminal failure or exhausted their retries.
    pub failed: usize,

    /// Tokens refunded because they expired before the run.
    pub expired: usize,

    /// Tokens whose funds return to the spendable balance: expired plus
    /// failed.
    pub refunded: usize,

    /// Per-token results, pending tokens first, expired tokens after.
    pub results: Vec<SyncResult>,

    /// When the run completed (UTC).
    pub timestamp: DateTime<Utc>,
}

impl SyncReport {
    /// A report for a run that found nothing to do.
    pub fn empty() -> Self {
        Self {
            total: 0,
            settled: 0,
            failed: 0,
            expired: 0,
            refunded: 0,
            results: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}
