//! # opal-sync
//!
//! Settlement synchronization for the OPAL offline payment core.
//!
//! ## Overview
//!
//! When connectivity returns, every pending offline token must be
//! presented to the settlement authority and driven to a terminal state:
//! settled, terminally rejected, or refunded. This crate owns that
//! orchestration:
//!
//! - [`SettlementClient`] is the seam to the external authority.
//! - [`RetryLedger`] persists per-token attempt counts so the 3-attempt
//!   budget is a lifetime cap, not a per-run one.
//! - [`SyncEngine`] runs the full pass: expired-token compaction first,
//!   then bounded retries with exponential backoff, then one aggregated
//!   [`SyncReport`](opal_contracts::SyncReport).
//!
//! Per-token failures are data, not errors: a rejected token lands in the
//! report with its reason while the run carries on. The only caller-facing
//! error from a run is [`SyncInProgress`](opal_contracts::OpalError::SyncInProgress)
//! when a second run is started while one is in flight.

pub mod client;
pub mod engine;
pub mod retry;

pub use client::SettlementClient;
pub use engine::{SyncEngine, SyncObserver, SyncProgress, BASE_DELAY_MS, EXPIRED_REFUND_REASON, MAX_ATTEMPTS};
pub use retry::{InMemoryRetryLedger, RetryLedger};
