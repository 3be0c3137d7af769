//! # opal-wallet
//!
//! The wallet facade for the OPAL offline payment core.
//!
//! ## Overview
//!
//! `Wallet` is the single entry point an application talks to. It owns the
//! spendable balance and the offline-held bucket, enforces the offline
//! spending caps, and wires the token engine, sync engine, and audit trail
//! together:
//!
//! - [`pay_offline`](Wallet::pay_offline) moves funds from spendable into
//!   offline-held and mints a signed token for the merchant.
//! - [`reconcile`](Wallet::reconcile) runs a full settlement pass and
//!   applies the report: settled amounts leave the held bucket for good,
//!   failed and expired amounts are refunded to spendable.
//! - Every money movement lands in the audit trail.
//!
//! ## Caps
//!
//! Two ceilings bound offline exposure: no single payment above 2000, and
//! never more than 5000 held in unsettled tokens at once. Both are checked
//! before any state changes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use opal_audit::{AuditCategory, AuditTrail};
use opal_contracts::{
    error::{OpalError, OpalResult},
    sync::SyncReport,
    token::OfflineToken,
};
use opal_sync::{SyncEngine, EXPIRED_REFUND_REASON};
use opal_token::TokenEngine;

pub mod merchants;

pub use merchants::MerchantDirectory;

/// Opening spendable balance for a fresh wallet.
pub const INITIAL_BALANCE: i64 = 5000;

/// Ceiling on a single offline payment.
pub const PER_TRANSACTION_CAP: i64 = 2000;

/// Ceiling on the total amount held in unsettled offline tokens.
pub const OFFLINE_HELD_CAP: i64 = 5000;

struct Funds {
    spendable: i64,
    offline_held: i64,
    /// Token ids already refunded to spendable. Exhausted tokens reappear
    /// as failed in every later report; the set stops a second refund.
    refunded: HashSet<String>,
}

/// The user-facing wallet: balances, caps, and reconciliation.
pub struct Wallet {
    tokens: Arc<TokenEngine>,
    sync: SyncEngine,
    audit: Arc<AuditTrail>,
    funds: Mutex<Funds>,
}

impl Wallet {
    pub fn new(tokens: Arc<TokenEngine>, sync: SyncEngine, audit: Arc<AuditTrail>) -> Self {
        Self {
            tokens,
            sync,
            audit,
            funds: Mutex::new(Funds {
                spendable: INITIAL_BALANCE,
                offline_held: 0,
                refunded: HashSet::new(),
            }),
        }
    }

    /// Spendable balance.
    pub fn balance(&self) -> i64 {
        self.funds.lock().expect("wallet funds lock poisoned").spendable
    }

    /// Total amount locked in unsettled offline tokens.
    pub fn offline_held(&self) -> i64 {
        self.funds.lock().expect("wallet funds lock poisoned").offline_held
    }

    /// The token engine backing this wallet.
    pub fn tokens(&self) -> &TokenEngine {
        &self.tokens
    }

    /// The audit trail backing this wallet.
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Credit spendable balance from an external source.
    pub fn add_money(&self, amount: i64) -> OpalResult<i64> {
        if amount <= 0 {
            return Err(OpalError::InvalidAmount { amount });
        }
        let new_balance = {
            let mut funds = self.funds.lock().expect("wallet funds lock poisoned");
            funds.spendable += amount;
            funds.spendable
        };
        info!(amount, new_balance, "balance topped up");
        self.audit.record(
            AuditCategory::Wallet,
            "top-up",
            &format!("{} credited, balance {}", amount, new_balance),
        )?;
        Ok(new_balance)
    }

    /// Pay a merchant offline: mint a signed token and move the amount
    /// from spendable into the offline-held bucket.
    ///
    /// # Errors
    ///
    /// Rejected without any state change when the amount is non-positive,
    /// the merchant is unknown, either offline cap would be exceeded, or
    /// the balance cannot cover the amount.
    pub fn pay_offline(&self, merchant_id: &str, amount: i64) -> OpalResult<OfflineToken> {
        self.pay_offline_at(merchant_id, amount, Utc::now())
    }

    /// `pay_offline` with an explicit mint instant, for replaying history.
    pub fn pay_offline_at(
        &self,
        merchant_id: &str,
        amount: i64,
        minted_at: DateTime<Utc>,
    ) -> OpalResult<OfflineToken> {
        if amount <= 0 {
            return Err(OpalError::InvalidAmount { amount });
        }
        let merchant_name = MerchantDirectory::name_of(merchant_id).ok_or_else(|| {
            OpalError::UnknownMerchant { merchant_id: merchant_id.to_string() }
        })?;
        if amount > PER_TRANSACTION_CAP {
            return Err(OpalError::PerTransactionCapExceeded { amount, cap: PER_TRANSACTION_CAP });
        }

        let token = {
            let mut funds = self.funds.lock().expect("wallet funds lock poisoned");
            if funds.offline_held + amount > OFFLINE_HELD_CAP {
                return Err(OpalError::OfflineCapExceeded { amount, cap: OFFLINE_HELD_CAP });
            }
            if funds.spendable < amount {
                return Err(OpalError::InsufficientBalance {
                    available: funds.spendable,
                    required: amount,
                });
            }

            let token = self.tokens.mint_at(amount, merchant_id, merchant_name, minted_at)?;
            self.tokens.store(token.clone());
            funds.spendable -= amount;
            funds.offline_held += amount;
            token
        };

        info!(
            token_id = %token.id,
            merchant_id,
            amount,
            "offline payment minted"
        );
        self.audit.record(
            AuditCategory::Transaction,
            "offline-mint",
            &format!("{} to {} ({})", amount, merchant_id, token.serial_number),
        )?;

        Ok(token)
    }

    /// Run a full settlement pass and apply the outcome to the balances.
    ///
    /// Settled amounts leave the offline-held bucket; failed and expired
    /// amounts return to spendable. Exhausted tokens show up as failed in
    /// every subsequent report but are only refunded once.
    pub async fn reconcile(&self) -> OpalResult<SyncReport> {
        let report = self.sync.run_full_sync().await?;

        for result in &report.results {
            if result.success {
                {
                    let mut funds = self.funds.lock().expect("wallet funds lock poisoned");
                    funds.offline_held -= result.amount;
                    funds.refunded.remove(&result.token_id);
                }
                self.audit.record(
                    AuditCategory::Sync,
                    "settle-success",
                    &format!("{} to {} settled", result.amount, result.merchant_name),
                )?;
                continue;
            }

            let expired = result.reason.as_deref() == Some(EXPIRED_REFUND_REASON);
            let newly_refunded = {
                let mut funds = self.funds.lock().expect("wallet funds lock poisoned");
                if funds.refunded.insert(result.token_id.clone()) {
                    funds.offline_held -= result.amount;
                    funds.spendable += result.amount;
                    true
                } else {
                    false
                }
            };
            if !newly_refunded {
                continue;
            }

            warn!(
                token_id = %result.token_id,
                amount = result.amount,
                reason = result.reason.as_deref().unwrap_or(""),
                "offline payment refunded"
            );
            if expired {
                self.audit.record(
                    AuditCategory::Wallet,
                    "expire-refund",
                    &format!("{} from {} refunded", result.amount, result.merchant_name),
                )?;
            } else {
                self.audit.record(
                    AuditCategory::Sync,
                    "settle-fail",
                    &format!(
                        "{} to {}: {}",
                        result.amount,
                        result.merchant_name,
                        result.reason.as_deref().unwrap_or("unknown")
                    ),
                )?;
            }
        }

        info!(
            settled = report.settled,
            failed = report.failed,
            expired = report.expired,
            "reconciliation applied"
        );
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
