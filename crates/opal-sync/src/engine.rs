//! The sync engine: settles pending offline tokens once connectivity
//! returns.
//!
//! One full run moves through Idle → Collecting → Settling → Complete (or
//! Error), and each token through Pending → Attempting(n) → Settled,
//! terminally Rejected, or Exhausted:
//!
//!   1. Compaction: expired tokens are cleared and refunded without ever
//!      touching the settlement authority.
//!   2. Each remaining pending token is attempted up to 3 lifetime
//!      attempts. Local validation runs before every network attempt and
//!      any failure there is immediately terminal. Transient outcomes back
//!      off exponentially (1s, 2s, 4s); terminal outcomes mark the token
//!      spent; an exhausted budget leaves the token unspent for a future
//!      run, with the attempt count held in the retry ledger.
//!   3. Everything is aggregated into one `SyncReport`.
//!
//! The engine absorbs all per-token errors into `SyncResult.reason` — one
//! failing token never aborts the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use opal_contracts::{
    error::{OpalError, OpalResult},
    sync::{SyncReport, SyncResult, SyncStatus},
    token::SettlementOutcome,
};
use opal_token::TokenEngine;

use crate::client::SettlementClient;
use crate::retry::RetryLedger;

/// Lifetime settlement attempt budget per token, across all runs.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base backoff delay; attempt n is followed by `base * 2^(n-1)`.
pub const BASE_DELAY_MS: u64 = 1000;

/// Result reason for tokens refunded by compaction. Never produced by the
/// settlement authority; callers match on it to route refunds.
pub const EXPIRED_REFUND_REASON: &str = "Token expired — funds refunded";

/// Rejection reasons that indicate the token can never settle, regardless
/// of retry. Everything else from the authority is treated as transient.
const NON_RETRYABLE_REASONS: [&str; 3] =
    ["Token already spent", "Device mismatch", "Invalid signature"];

// ── Progress side channel ─────────────────────────────────────────────────────

/// Running totals emitted to observers between settlement steps.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub total: usize,
    pub settled: usize,
    pub failed: usize,
    pub expired: usize,
    pub refunded: usize,
}

/// Synchronous reporting side channel for UI observers.
///
/// Callbacks are emitted between steps and are not part of the settlement
/// logic; the default implementations do nothing.
pub trait SyncObserver: Send + Sync {
    /// A settlement attempt is about to start for `token_id`.
    fn on_attempt(&self, _token_id: &str, _attempt: u32) {}

    /// Running totals changed.
    fn on_progress(&self, _progress: &SyncProgress) {}
}

/// The observer used when the caller does not supply one.
struct NoopObserver;

impl SyncObserver for NoopObserver {}

// ── Engine ────────────────────────────────────────────────────────────────────

struct EngineState {
    status: SyncStatus,
    /// Most recent report, kept for the session only.
    last_report: Option<SyncReport>,
}

/// Orchestrates settlement of all pending tokens.
///
/// The engine only reads tokens and invokes the token engine's mutation
/// API — it never mutates token records directly. At most one run may be
/// in flight at a time; a second `run_full_sync` while one is active is
/// rejected with [`OpalError::SyncInProgress`].
pub struct SyncEngine {
    tokens: Arc<TokenEngine>,
    client: Arc<dyn SettlementClient>,
    ledger: Arc<dyn RetryLedger>,
    base_delay: std::time::Duration,
    in_flight: AtomicBool,
    state: Mutex<EngineState>,
}

/// Clears the in-flight flag even when a run is abandoned mid-await.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    pub fn new(
        tokens: Arc<TokenEngine>,
        client: Arc<dyn SettlementClient>,
        ledger: Arc<dyn RetryLedger>,
    ) -> Self {
        Self {
            tokens,
            client,
            ledger,
            base_delay: std::time::Duration::from_millis(BASE_DELAY_MS),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(EngineState { status: SyncStatus::Idle, last_report: None }),
        }
    }

    /// Override the backoff base delay. Demos compress it; the retry
    /// *count* semantics are unaffected.
    pub fn with_base_delay(mut self, base_delay: std::time::Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Current run status.
    pub fn status(&self) -> SyncStatus {
        self.state.lock().expect("sync state lock poisoned").status
    }

    /// The most recent completed report, if any run has finished this
    /// session.
    pub fn last_report(&self) -> Option<SyncReport> {
        self.state
            .lock()
            .expect("sync state lock poisoned")
            .last_report
            .clone()
    }

    /// Run a full sync with no observer.
    pub async fn run_full_sync(&self) -> OpalResult<SyncReport> {
        self.run_full_sync_observed(&NoopObserver).await
    }

    /// Run a full sync, emitting progress to `observer`.
    ///
    /// # Errors
    ///
    /// `OpalError::SyncInProgress` when another run is already in flight.
    /// Internal store inconsistencies (a pending token vanishing mid-run)
    /// surface as errors and flip the status to `Error`; per-token
    /// settlement failures never do.
    pub async fn run_full_sync_observed(
        &self,
        observer: &dyn SyncObserver,
    ) -> OpalResult<SyncReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("run_full_sync rejected: a run is already in flight");
            return Err(OpalError::SyncInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.set_status(SyncStatus::Collecting);
        let outcome = self.run_inner(observer).await;

        let mut state = self.state.lock().expect("sync state lock poisoned");
        match &outcome {
            Ok(report) => {
                state.status = SyncStatus::Complete;
                state.last_report = Some(report.clone());
            }
            Err(e) => {
                warn!(error = %e, "sync run aborted");
                state.status = SyncStatus::Error;
            }
        }

        outcome
    }

    async fn run_inner(&self, observer: &dyn SyncObserver) -> OpalResult<SyncReport> {
        // Step 1: compaction. Expired tokens become automatic refunds with
        // zero attempts; they must never reach the settlement authority.
        // One snapshot drives both the removal and the refund results: a
        // token crossing its expiry boundary mid-run must not be removed
        // without a refund result the caller can act on.
        let expired_tokens = self.tokens.expired_tokens();
        let expired_ids: Vec<String> = expired_tokens.iter().map(|t| t.id.clone()).collect();
        self.tokens.remove_tokens(&expired_ids);
        let expired = expired_tokens.len();

        let pending = self.tokens.pending_tokens();
        let total = pending.len() + expired;

        info!(pending = pending.len(), expired, "sync run starting");

        if total == 0 {
            return Ok(SyncReport::empty());
        }

        self.set_status(SyncStatus::Settling);
        observer.on_progress(&SyncProgress {
            total,
            settled: 0,
            failed: 0,
            expired,
            refunded: expired,
        });

        // Step 2: settle each pending token with bounded retries.
        let mut results: Vec<SyncResult> = Vec::with_capacity(total);
        let mut settled = 0;
        let mut failed = 0;

        for token in &pending {
            let result = self.settle_with_retry(&token.id, observer).await?;
            if result.success {
                settled += 1;
            } else {
                failed += 1;
            }
            results.push(result);

            observer.on_progress(&SyncProgress {
                total,
                settled,
                failed,
                expired,
                refunded: expired + failed,
            });
        }

        // Step 3: append refund results for the compacted tokens.
        for token in &expired_tokens {
            results.push(SyncResult {
                token_id: token.id.clone(),
                merchant_name: token.merchant_name.clone(),
                amount: token.amount,
                success: false,
                reason: Some(EXPIRED_REFUND_REASON.to_string()),
                attempts: 0,
            });
        }

        let report = SyncReport {
            total,
            settled,
            failed,
            expired,
            refunded: expired + failed,
            results,
            timestamp: Utc::now(),
        };

        info!(
            total = report.total,
            settled = report.settled,
            failed = report.failed,
            expired = report.expired,
            "sync run complete"
        );

        Ok(report)
    }

    /// Attempt settlement of one token, resuming from its persisted
    /// attempt count.
    async fn settle_with_retry(
        &self,
        token_id: &str,
        observer: &dyn SyncObserver,
    ) -> OpalResult<SyncResult> {
        let mut attempt = self.ledger.attempts(token_id);

        loop {
            // Lifetime budget check comes first so a token exhausted in an
            // earlier run is reported without another network call.
            if attempt >= MAX_ATTEMPTS {
                let token = self.fetch(token_id)?;
                warn!(token_id, attempt, "retry budget exhausted, token left pending");
                return Ok(SyncResult {
                    token_id: token_id.to_string(),
                    merchant_name: token.merchant_name,
                    amount: token.amount,
                    success: false,
                    reason: Some(format!("Failed after {} attempts", MAX_ATTEMPTS)),
                    attempts: attempt,
                });
            }

            attempt += 1;
            self.ledger.record_attempt(token_id, attempt);
            observer.on_attempt(token_id, attempt);
            debug!(token_id, attempt, "settlement attempt starting");

            // Re-fetch the stored copy each attempt so spend-state changes
            // made elsewhere are visible, then validate locally before
            // touching the network. A validation failure is terminal.
            let token = self.fetch(token_id)?;
            if let Err(reason) = self.tokens.validate(&token) {
                warn!(token_id, reason = %reason, "local validation failed, terminal");
                self.tokens.mark_spent(token_id)?;
                self.ledger.clear(token_id);
                return Ok(SyncResult {
                    token_id: token_id.to_string(),
                    merchant_name: token.merchant_name,
                    amount: token.amount,
                    success: false,
                    reason: Some(reason.to_string()),
                    attempts: attempt,
                });
            }

            match self.client.settle(&token).await {
                SettlementOutcome::Accepted => {
                    info!(token_id, attempt, "token settled");
                    self.tokens.mark_spent(token_id)?;
                    self.ledger.clear(token_id);
                    return Ok(SyncResult {
                        token_id: token_id.to_string(),
                        merchant_name: token.merchant_name,
                        amount: token.amount,
                        success: true,
                        reason: None,
                        attempts: attempt,
                    });
                }

                SettlementOutcome::Rejected(reason)
                    if NON_RETRYABLE_REASONS.contains(&reason.as_str()) =>
                {
                    // The authority says this token can never settle.
                    warn!(token_id, reason = %reason, "non-retryable rejection, terminal");
                    self.tokens.mark_spent(token_id)?;
                    self.ledger.clear(token_id);
                    return Ok(SyncResult {
                        token_id: token_id.to_string(),
                        merchant_name: token.merchant_name,
                        amount: token.amount,
                        success: false,
                        reason: Some(reason),
                        attempts: attempt,
                    });
                }

                outcome @ (SettlementOutcome::Rejected(_) | SettlementOutcome::Unavailable) => {
                    debug!(token_id, attempt, ?outcome, "transient settlement failure");
                    if attempt < MAX_ATTEMPTS {
                        let delay = self.base_delay * 2u32.pow(attempt - 1);
                        debug!(token_id, delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn fetch(&self, token_id: &str) -> OpalResult<opal_contracts::OfflineToken> {
        self.tokens
            .get(token_id)
            .ok_or_else(|| OpalError::TokenNotFound { token_id: token_id.to_string() })
    }

    fn set_status(&self, status: SyncStatus) {
        self.state.lock().expect("sync state lock poisoned").status = status;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Notify;

    use opal_contracts::OfflineToken;
    use opal_crypto::KeyedDigest;
    use opal_token::{DeviceIdentity, InMemoryTokenStore, TokenEngine};

    use crate::retry::InMemoryRetryLedger;

    use super::*;

    // ── Fakes ─────────────────────────────────────────────────────────────────

    /// Replays a fixed script of outcomes, then accepts everything.
    struct ScriptedClient {
        script: Mutex<VecDeque<SettlementOutcome>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(outcomes: Vec<SettlementOutcome>) -> Self {
            Self {
                script: Mutex::new(outcomes.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn accepting() -> Self {
            Self::new(Vec::new())
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SettlementClient for ScriptedClient {
        async fn settle(&self, _token: &OfflineToken) -> SettlementOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SettlementOutcome::Accepted)
        }
    }

    /// Blocks every settle call until released, for reentrancy tests.
    struct BlockingClient {
        release: Notify,
    }

    #[async_trait]
    impl SettlementClient for BlockingClient {
        async fn settle(&self, _token: &OfflineToken) -> SettlementOutcome {
            self.release.notified().await;
            SettlementOutcome::Accepted
        }
    }

    /// Records every attempt callback.
    #[derive(Default)]
    struct RecordingObserver {
        attempts: Mutex<Vec<(String, u32)>>,
    }

    impl SyncObserver for RecordingObserver {
        fn on_attempt(&self, token_id: &str, attempt: u32) {
            self.attempts.lock().unwrap().push((token_id.to_string(), attempt));
        }
    }

    // ── Harness ───────────────────────────────────────────────────────────────

    struct Harness {
        tokens: Arc<TokenEngine>,
        ledger: Arc<InMemoryRetryLedger>,
        client: Arc<ScriptedClient>,
        sync: SyncEngine,
    }

    fn harness(client: ScriptedClient) -> Harness {
        let tokens = Arc::new(TokenEngine::new(
            Arc::new(InMemoryTokenStore::new()),
            DeviceIdentity::from_id("DEV-test"),
            KeyedDigest::new("test-device-secret"),
        ));
        let ledger = Arc::new(InMemoryRetryLedger::new());
        let client = Arc::new(client);
        let sync = SyncEngine::new(
            Arc::clone(&tokens),
            Arc::clone(&client) as Arc<dyn SettlementClient>,
            Arc::clone(&ledger) as Arc<dyn RetryLedger>,
        );
        Harness { tokens, ledger, client, sync }
    }

    /// Mint and store a fresh pending token; returns its id.
    fn mint_pending(h: &Harness, amount: i64) -> String {
        let token = h.tokens.generate(amount, "MERCHANT001", "Chai Corner").unwrap();
        let id = token.id.clone();
        h.tokens.store(token);
        id
    }

    fn timeout(msg: &str) -> SettlementOutcome {
        SettlementOutcome::Rejected(msg.to_string())
    }

    // ── Happy path ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_attempt_acceptance_settles_the_token() {
        let h = harness(ScriptedClient::accepting());
        let id = mint_pending(&h, 500);

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(report.total, 1);
        assert_eq!(report.settled, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.refunded, 0);
        assert_eq!(report.results[0].attempts, 1);
        assert!(h.tokens.get(&id).unwrap().spent, "settled token must be marked spent");
        assert_eq!(h.ledger.attempts(&id), 0, "ledger entry must be cleared on success");
        assert_eq!(h.sync.status(), SyncStatus::Complete);
    }

    #[tokio::test]
    async fn empty_store_yields_empty_report() {
        let h = harness(ScriptedClient::accepting());

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(report.total, 0);
        assert_eq!(h.client.calls(), 0);
        assert_eq!(h.sync.status(), SyncStatus::Complete);
    }

    // ── Retry and backoff ─────────────────────────────────────────────────────

    /// Two transient timeouts then acceptance: settles on attempt 3 with
    /// exactly 1s + 2s of simulated backoff beforehand.
    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_then_succeed() {
        let h = harness(ScriptedClient::new(vec![
            timeout("UPI settlement timeout"),
            timeout("UPI settlement timeout"),
            SettlementOutcome::Accepted,
        ]));
        let id = mint_pending(&h, 750);

        let start = tokio::time::Instant::now();
        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(report.settled, 1);
        assert_eq!(report.results[0].attempts, 3);
        assert_eq!(
            start.elapsed(),
            Duration::from_secs(3),
            "backoff before success must be 1s + 2s"
        );
        assert!(h.tokens.get(&id).unwrap().spent);
    }

    /// A token that never settles consumes exactly 3 attempts, backs off
    /// 1s then 2s (no sleep after the final attempt), and stays unspent.
    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_exactly_three_attempts() {
        let h = harness(ScriptedClient::new(vec![
            SettlementOutcome::Unavailable,
            SettlementOutcome::Unavailable,
            SettlementOutcome::Unavailable,
        ]));
        let id = mint_pending(&h, 750);

        let start = tokio::time::Instant::now();
        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(h.client.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(report.failed, 1);
        assert_eq!(report.refunded, 1);

        let result = &report.results[0];
        assert_eq!(result.attempts, 3);
        assert_eq!(result.reason.as_deref(), Some("Failed after 3 attempts"));

        assert!(!h.tokens.get(&id).unwrap().spent, "exhausted token must stay unspent");
        assert_eq!(h.ledger.attempts(&id), 3, "ledger must keep the exhausted count");
    }

    /// A second run after exhaustion reports the failure again without any
    /// further network calls: the budget is a lifetime cap.
    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_blocks_future_attempts() {
        let h = harness(ScriptedClient::new(vec![
            SettlementOutcome::Unavailable,
            SettlementOutcome::Unavailable,
            SettlementOutcome::Unavailable,
        ]));
        mint_pending(&h, 300);

        h.sync.run_full_sync().await.unwrap();
        assert_eq!(h.client.calls(), 3);

        let report = h.sync.run_full_sync().await.unwrap();
        assert_eq!(h.client.calls(), 3, "no further attempts after exhaustion");
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[0].attempts, 3);
        assert_eq!(report.results[0].reason.as_deref(), Some("Failed after 3 attempts"));
    }

    /// Persisted attempts resume: with 2 attempts already consumed, the
    /// next run makes exactly one more call before exhausting.
    #[tokio::test(start_paused = true)]
    async fn persisted_attempts_resume_not_restart() {
        let h = harness(ScriptedClient::new(vec![SettlementOutcome::Unavailable]));
        let id = mint_pending(&h, 300);
        h.ledger.record_attempt(&id, 2);

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(h.client.calls(), 1, "run must resume at attempt 3, not restart");
        assert_eq!(report.results[0].attempts, 3);
        assert_eq!(report.results[0].reason.as_deref(), Some("Failed after 3 attempts"));
    }

    // ── Terminal outcomes ─────────────────────────────────────────────────────

    /// A non-retryable rejection is attempted exactly once and marks the
    /// token spent with the verbatim reason.
    #[tokio::test]
    async fn device_mismatch_rejection_short_circuits() {
        let h = harness(ScriptedClient::new(vec![timeout("Device mismatch")]));
        let id = mint_pending(&h, 900);

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(h.client.calls(), 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[0].reason.as_deref(), Some("Device mismatch"));
        assert_eq!(report.results[0].attempts, 1);
        assert!(h.tokens.get(&id).unwrap().spent, "terminal rejection must spend the token");
        assert_eq!(h.ledger.attempts(&id), 0);
    }

    /// Unknown rejection reasons are transient; the known trio is not.
    #[tokio::test(start_paused = true)]
    async fn only_the_known_reasons_are_terminal() {
        let h = harness(ScriptedClient::new(vec![
            timeout("ledger busy"),
            timeout("Invalid signature"),
        ]));
        mint_pending(&h, 100);

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(h.client.calls(), 2, "transient then terminal");
        assert_eq!(report.results[0].reason.as_deref(), Some("Invalid signature"));
        assert_eq!(report.results[0].attempts, 2);
    }

    /// A token failing local validation never reaches the network.
    #[tokio::test]
    async fn local_validation_failure_is_terminal_without_network() {
        let h = harness(ScriptedClient::accepting());

        // A token minted on another device: validates DeviceMismatch here.
        let foreign_engine = TokenEngine::new(
            Arc::new(InMemoryTokenStore::new()),
            DeviceIdentity::from_id("DEV-other"),
            KeyedDigest::new("test-device-secret"),
        );
        let token = foreign_engine.generate(100, "MERCHANT001", "Chai Corner").unwrap();
        let id = token.id.clone();
        h.tokens.store(token);

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(h.client.calls(), 0, "invalid token must not be sent to the authority");
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[0].reason.as_deref(), Some("Device mismatch"));
        assert_eq!(report.results[0].attempts, 1);
        assert!(h.tokens.get(&id).unwrap().spent);
    }

    // ── Expiry compaction ─────────────────────────────────────────────────────

    /// Expired tokens are refunded with zero attempts and never presented
    /// to the settlement authority.
    #[tokio::test]
    async fn expired_tokens_bypass_settlement() {
        let h = harness(ScriptedClient::accepting());
        let stale = h
            .tokens
            .mint_at(
                400,
                "MERCHANT002",
                "Fresh Veggies Store",
                Utc::now() - chrono::Duration::hours(49),
            )
            .unwrap();
        let stale_id = stale.id.clone();
        h.tokens.store(stale);
        mint_pending(&h, 200);

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(h.client.calls(), 1, "only the live token may reach the authority");
        assert_eq!(report.total, 2);
        assert_eq!(report.settled, 1);
        assert_eq!(report.expired, 1);
        assert_eq!(report.refunded, 1);

        let expired_result = report
            .results
            .iter()
            .find(|r| r.token_id == stale_id)
            .expect("expired token must appear in the results");
        assert_eq!(expired_result.attempts, 0);
        assert_eq!(expired_result.reason.as_deref(), Some(EXPIRED_REFUND_REASON));
        assert!(h.tokens.get(&stale_id).is_none(), "compaction must remove the token");
    }

    /// Every removed token gets a refund result, including one sitting
    /// exactly on its expiry boundary when the run starts. A token counted
    /// as expired without a result would strand its funds in the caller's
    /// offline-held bucket.
    #[tokio::test]
    async fn every_counted_token_has_a_result() {
        let h = harness(ScriptedClient::accepting());
        let boundary = h
            .tokens
            .mint_at(
                250,
                "MERCHANT003",
                "Quick Repairs",
                Utc::now() - chrono::Duration::hours(48),
            )
            .unwrap();
        let boundary_id = boundary.id.clone();
        h.tokens.store(boundary);
        mint_pending(&h, 500);

        let report = h.sync.run_full_sync().await.unwrap();

        assert_eq!(report.total, report.results.len());
        assert_eq!(report.expired, 1);
        let refund = report
            .results
            .iter()
            .find(|r| r.token_id == boundary_id)
            .expect("removed token must have a refund result");
        assert_eq!(refund.reason.as_deref(), Some(EXPIRED_REFUND_REASON));
        assert!(h.tokens.get(&boundary_id).is_none());
    }

    // ── Reentrancy ────────────────────────────────────────────────────────────

    /// A second run while one is in flight is rejected, and the first run
    /// still completes normally.
    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let tokens = Arc::new(TokenEngine::new(
            Arc::new(InMemoryTokenStore::new()),
            DeviceIdentity::from_id("DEV-test"),
            KeyedDigest::new("test-device-secret"),
        ));
        let token = tokens.generate(100, "MERCHANT001", "Chai Corner").unwrap();
        tokens.store(token);

        let client = Arc::new(BlockingClient { release: Notify::new() });
        let sync = Arc::new(SyncEngine::new(
            Arc::clone(&tokens),
            Arc::clone(&client) as Arc<dyn SettlementClient>,
            Arc::new(InMemoryRetryLedger::new()),
        ));

        let first = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.run_full_sync().await }
        });

        // Let the first run reach the blocked settle call.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        match sync.run_full_sync().await {
            Err(OpalError::SyncInProgress) => {}
            other => panic!("expected SyncInProgress, got {:?}", other),
        }

        client.release.notify_one();
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.settled, 1);

        // The guard released: a fresh run is allowed again.
        assert!(sync.run_full_sync().await.is_ok());
    }

    // ── Observer and report retention ─────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn observer_sees_every_attempt() {
        let h = harness(ScriptedClient::new(vec![
            SettlementOutcome::Unavailable,
            SettlementOutcome::Accepted,
        ]));
        let id = mint_pending(&h, 100);

        let observer = RecordingObserver::default();
        h.sync.run_full_sync_observed(&observer).await.unwrap();

        let attempts = observer.attempts.lock().unwrap().clone();
        assert_eq!(attempts, vec![(id.clone(), 1), (id, 2)]);
    }

    #[tokio::test]
    async fn last_report_is_retained_for_the_session() {
        let h = harness(ScriptedClient::accepting());
        mint_pending(&h, 100);

        assert!(h.sync.last_report().is_none());
        let report = h.sync.run_full_sync().await.unwrap();

        let retained = h.sync.last_report().expect("report must be retained");
        assert_eq!(retained.settled, report.settled);
        assert_eq!(retained.timestamp, report.timestamp);
    }
}
