//! # opal-contracts
//!
//! Shared types and error contracts for the OPAL offline payment core.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions and error types.

pub mod error;
pub mod sync;
pub mod token;

pub use error::{OpalError, OpalResult};
pub use sync::{SyncReport, SyncResult, SyncStatus};
pub use token::{OfflineToken, SettlementOutcome, TokenInvalidReason, TOKEN_TTL_HOURS};
