//! Offline payment token types.
//!
//! An `OfflineToken` is a self-contained, signed claim of value minted while
//! the device is disconnected and redeemed against the settlement authority
//! once connectivity returns. Every field that contributes to the token's
//! signature is part of `signing_parts()` so nothing is accidentally omitted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed lifetime of every offline token: 48 hours from mint.
pub const TOKEN_TTL_HOURS: i64 = 48;

/// A self-contained offline payment token.
///
/// Immutable after mint except for the `spent` flag, which transitions
/// false → true exactly once when the token reaches a terminal settlement
/// outcome (success or non-retryable failure) and is never reverted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineToken {
    /// Unique identifier; equals `serial_number` and is the sole lookup key.
    pub id: String,

    /// `TKN-{mint_millis}-{first 8 hex chars of nonce}`.
    pub serial_number: String,

    /// Payment amount in whole currency units. Always positive.
    pub amount: i64,

    /// Destination merchant identity.
    pub merchant_id: String,

    /// Human-readable merchant name, resolved from the directory at mint.
    pub merchant_name: String,

    /// The device that minted this token. Tokens only validate on the
    /// device that issued them.
    pub device_id: String,

    /// 32 hex chars of randomness preventing two tokens with identical
    /// amount/merchant/timestamp from colliding.
    pub nonce: String,

    /// Mint time (UTC).
    pub timestamp: DateTime<Utc>,

    /// `timestamp + 48h`. Tokens at or past this instant never settle.
    pub expires_at: DateTime<Utc>,

    /// Keyed digest over the canonical field tuple. Any mutation to a
    /// signed field invalidates it.
    pub signature: String,

    /// False at mint; set true exactly once on terminal settlement.
    pub spent: bool,
}

impl OfflineToken {
    /// The canonical field tuple committed to by `signature`, in signing
    /// order: serial number, amount, merchant id, device id, nonce, mint
    /// time as epoch milliseconds.
    pub fn signing_parts(&self) -> [String; 6] {
        [
            self.serial_number.clone(),
            self.amount.to_string(),
            self.merchant_id.clone(),
            self.device_id.clone(),
            self.nonce.clone(),
            self.timestamp.timestamp_millis().to_string(),
        ]
    }

    /// True when `now` has reached or passed the token's expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Why a token failed local validation.
///
/// Every variant is terminal for settlement purposes: none of these can be
/// fixed by retrying. The check order in the token engine is fixed —
/// spent, then expiry, then device, then signature — so the first matching
/// reason is always reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenInvalidReason {
    /// The token has already reached a terminal settlement outcome.
    AlreadySpent,
    /// The token's 48-hour lifetime has elapsed.
    Expired,
    /// The token was minted on a different device.
    DeviceMismatch,
    /// The stored signature does not match the recomputed digest.
    InvalidSignature,
}

impl fmt::Display for TokenInvalidReason {
    /// The exact reason strings that travel through settlement results and
    /// the retryable/non-retryable classification. Do not reword.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenInvalidReason::AlreadySpent => "Token already spent",
            TokenInvalidReason::Expired => "Token expired",
            TokenInvalidReason::DeviceMismatch => "Device mismatch",
            TokenInvalidReason::InvalidSignature => "Invalid signature",
        };
        f.write_str(text)
    }
}

/// Outcome of presenting one token to the settlement authority.
///
/// The real network call is out of scope — the client is an abstract,
/// fallible, possibly slow collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// The authority accepted the token; settlement is final.
    Accepted,
    /// The authority rejected the token with a reason string. Reasons in
    /// the non-retryable set terminate the token; anything else is treated
    /// as transient.
    Rejected(String),
    /// The authority could not be reached. Always transient.
    Unavailable,
}
