//! Runtime error types for the OPAL offline payment core.
//!
//! All fallible operations in the OPAL crates return `OpalResult<T>`.
//! Error variants carry enough context to produce actionable log lines and
//! audit entries.

use thiserror::Error;

/// The unified error type for the OPAL runtime.
#[derive(Debug, Error)]
pub enum OpalError {
    /// A token mint or top-up was requested with a non-positive amount.
    #[error("invalid amount {amount}: must be positive")]
    InvalidAmount { amount: i64 },

    /// The destination merchant is not in the known merchant directory.
    #[error("unknown merchant '{merchant_id}'")]
    UnknownMerchant { merchant_id: String },

    /// A single offline payment exceeded the per-transaction ceiling.
    #[error("amount {amount} exceeds the per-transaction offline cap of {cap}")]
    PerTransactionCapExceeded { amount: i64, cap: i64 },

    /// The payment would push total offline-held funds past the aggregate cap.
    #[error("amount {amount} would push offline-held funds past the cap of {cap}")]
    OfflineCapExceeded { amount: i64, cap: i64 },

    /// The spendable balance cannot cover the requested amount.
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: i64, required: i64 },

    /// A token id was presented that the token store has never seen.
    #[error("no token with id '{token_id}'")]
    TokenNotFound { token_id: String },

    /// A second `run_full_sync` was invoked while one was still in flight.
    ///
    /// The reentrancy guard rejects the call rather than letting two runs
    /// double-attempt settlement of the same pending tokens.
    #[error("a sync run is already in flight")]
    SyncInProgress,

    /// The audit trail could not persist an entry.
    ///
    /// Treated as fatal by callers that are required to audit — an action
    /// that cannot be witnessed must not be reported as having happened.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

/// Convenience alias used throughout the OPAL crates.
pub type OpalResult<T> = Result<T, OpalError>;
