//! The settlement authority seam.
//!
//! The real network call to a bank or payment network is out of scope —
//! the sync engine treats settlement as an abstract, fallible, possibly
//! slow collaborator. Tests and demos supply deterministic implementations
//! instead of relying on randomness.

use async_trait::async_trait;

use opal_contracts::{OfflineToken, SettlementOutcome};

/// An external authority that finally accepts or rejects offline tokens.
///
/// There is no per-attempt timeout in this layer; the retry loop's
/// exponential backoff is the only timing control. A production system
/// should add one and map it to [`SettlementOutcome::Unavailable`].
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Present one token for final settlement.
    async fn settle(&self, token: &OfflineToken) -> SettlementOutcome;
}
