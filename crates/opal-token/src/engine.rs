//! The token engine: mint, validate, and track offline payment tokens.
//!
//! The engine has exclusive write access to the token store. The sync
//! engine and wallet facade read tokens and mutate them only through this
//! API, which keeps the `spent` flag's once-only transition enforceable in
//! one place.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use opal_contracts::{
    error::{OpalError, OpalResult},
    token::{OfflineToken, TokenInvalidReason, TOKEN_TTL_HOURS},
};
use opal_crypto::{generate_nonce, KeyedDigest};

use crate::device::DeviceIdentity;
use crate::store::TokenStore;

/// Mints and validates device-bound offline payment tokens.
///
/// One engine per wallet instance. The signer key is the device secret;
/// tokens signed here only verify on an engine holding the same key and
/// device identity.
pub struct TokenEngine {
    store: Arc<dyn TokenStore>,
    device: DeviceIdentity,
    signer: KeyedDigest,
}

impl TokenEngine {
    pub fn new(store: Arc<dyn TokenStore>, device: DeviceIdentity, signer: KeyedDigest) -> Self {
        Self { store, device, signer }
    }

    /// The identity tokens minted by this engine are bound to.
    pub fn device_id(&self) -> &str {
        self.device.id()
    }

    /// Mint a token for `amount` to the given merchant, timestamped now.
    ///
    /// The only ceiling enforced here is positivity — the per-transaction
    /// and aggregate offline caps belong to the wallet facade, which keeps
    /// the engine composable.
    ///
    /// # Errors
    ///
    /// `OpalError::InvalidAmount` when `amount <= 0`.
    pub fn generate(
        &self,
        amount: i64,
        merchant_id: &str,
        merchant_name: &str,
    ) -> OpalResult<OfflineToken> {
        self.mint_at(amount, merchant_id, merchant_name, Utc::now())
    }

    /// Mint a token with an explicit mint instant.
    ///
    /// `generate()` delegates here with `Utc::now()`; simulations and tests
    /// use this to produce tokens at known points in their lifetime.
    pub fn mint_at(
        &self,
        amount: i64,
        merchant_id: &str,
        merchant_name: &str,
        minted_at: DateTime<Utc>,
    ) -> OpalResult<OfflineToken> {
        if amount <= 0 {
            return Err(OpalError::InvalidAmount { amount });
        }

        let nonce = generate_nonce();
        let serial_number = format!("TKN-{}-{}", minted_at.timestamp_millis(), &nonce[..8]);

        let mut token = OfflineToken {
            id: serial_number.clone(),
            serial_number,
            amount,
            merchant_id: merchant_id.to_string(),
            merchant_name: merchant_name.to_string(),
            device_id: self.device.id().to_string(),
            nonce,
            timestamp: minted_at,
            expires_at: minted_at + Duration::hours(TOKEN_TTL_HOURS),
            signature: String::new(),
            spent: false,
        };
        token.signature = self.sign(&token);

        info!(
            token_id = %token.id,
            amount,
            merchant_id,
            expires_at = %token.expires_at,
            "offline token minted"
        );

        Ok(token)
    }

    /// Check whether a token may be presented for settlement right now.
    pub fn validate(&self, token: &OfflineToken) -> Result<(), TokenInvalidReason> {
        self.validate_at(token, Utc::now())
    }

    /// Validate against an explicit clock instant.
    ///
    /// Check order is fixed — spent, expiry, device, signature — cheapest
    /// and most common failures first, and the first violated clause wins
    /// so test expectations are reproducible.
    pub fn validate_at(
        &self,
        token: &OfflineToken,
        now: DateTime<Utc>,
    ) -> Result<(), TokenInvalidReason> {
        if token.spent {
            return Err(TokenInvalidReason::AlreadySpent);
        }
        if token.is_expired_at(now) {
            return Err(TokenInvalidReason::Expired);
        }
        if token.device_id != self.device.id() {
            return Err(TokenInvalidReason::DeviceMismatch);
        }
        if self.sign(token) != token.signature {
            return Err(TokenInvalidReason::InvalidSignature);
        }
        Ok(())
    }

    /// Persist a minted token. Synchronous: when this returns, the store
    /// has it.
    pub fn store(&self, token: OfflineToken) {
        debug!(token_id = %token.id, "token stored");
        self.store.insert(token);
    }

    /// Fetch the stored copy of a token.
    pub fn get(&self, token_id: &str) -> Option<OfflineToken> {
        self.store.get(token_id)
    }

    /// Record a terminal settlement outcome for the token.
    ///
    /// Idempotent: marking an already-spent token again is a no-op. The
    /// flag never reverts.
    ///
    /// # Errors
    ///
    /// `OpalError::TokenNotFound` when the id was never stored.
    pub fn mark_spent(&self, token_id: &str) -> OpalResult<()> {
        if self.store.mark_spent(token_id) {
            debug!(token_id, "token marked spent");
            Ok(())
        } else {
            Err(OpalError::TokenNotFound { token_id: token_id.to_string() })
        }
    }

    /// Unspent tokens still inside their 48-hour lifetime, in mint order.
    pub fn pending_tokens(&self) -> Vec<OfflineToken> {
        let now = Utc::now();
        self.store
            .all()
            .into_iter()
            .filter(|t| !t.spent && !t.is_expired_at(now))
            .collect()
    }

    /// Unspent tokens whose lifetime has elapsed, in mint order.
    pub fn expired_tokens(&self) -> Vec<OfflineToken> {
        let now = Utc::now();
        self.store
            .all()
            .into_iter()
            .filter(|t| !t.spent && t.is_expired_at(now))
            .collect()
    }

    /// Remove the given tokens from the store. Unknown ids are ignored.
    ///
    /// Callers that classified the tokens first (the sync engine's
    /// compaction step) pass the exact ids they observed, so the removed
    /// set always matches the set they report on.
    pub fn remove_tokens(&self, ids: &[String]) {
        if !ids.is_empty() {
            info!(count = ids.len(), "removing tokens");
            self.store.remove(ids);
        }
    }

    /// Compaction: drop expired-unspent tokens from active consideration
    /// and return how many were dropped. Callers refund their amounts.
    ///
    /// Spent tokens stay in the store for audit and history purposes.
    pub fn clear_expired(&self) -> usize {
        let expired: Vec<String> = self.expired_tokens().into_iter().map(|t| t.id).collect();
        self.remove_tokens(&expired);
        expired.len()
    }

    /// Every stored token, spent or not, in mint order. For history views.
    pub fn all_tokens(&self) -> Vec<OfflineToken> {
        self.store.all()
    }

    fn sign(&self, token: &OfflineToken) -> String {
        let parts = token.signing_parts();
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        self.signer.digest(&refs)
    }
}
