//! Demo scenarios for the OPAL offline payment core.
//!
//! Each scenario wires real OPAL components (token engine, sync engine,
//! audit trail, wallet) against a scripted settlement authority, so every
//! run is deterministic and the printed outcome always matches the text.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use opal_audit::AuditTrail;
use opal_contracts::{error::OpalResult, OfflineToken, SettlementOutcome};
use opal_crypto::KeyedDigest;
use opal_sync::{InMemoryRetryLedger, SettlementClient, SyncEngine};
use opal_token::{DeviceIdentity, InMemoryTokenStore, TokenEngine};
use opal_wallet::Wallet;

/// Backoff base used by the demo so a retry storm finishes in well under a
/// second. Attempt counts and classification are identical to the 1s base.
const DEMO_BASE_DELAY: Duration = Duration::from_millis(50);

// ── Scripted settlement authority ─────────────────────────────────────────────

/// Replays a fixed script of outcomes, printing each call; accepts
/// everything once the script runs out.
struct ScriptedAuthority {
    script: Mutex<VecDeque<SettlementOutcome>>,
}

impl ScriptedAuthority {
    fn new(outcomes: Vec<SettlementOutcome>) -> Self {
        Self { script: Mutex::new(outcomes.into_iter().collect()) }
    }
}

#[async_trait]
impl SettlementClient for ScriptedAuthority {
    async fn settle(&self, token: &OfflineToken) -> SettlementOutcome {
        let outcome = self
            .script
            .lock()
            .expect("authority script lock poisoned")
            .pop_front()
            .unwrap_or(SettlementOutcome::Accepted);
        let shown = match &outcome {
            SettlementOutcome::Accepted => "accepted".to_string(),
            SettlementOutcome::Rejected(reason) => format!("rejected: {}", reason),
            SettlementOutcome::Unavailable => "authority unavailable".to_string(),
        };
        println!("    [authority] {} ({}) -> {}", token.serial_number, token.amount, shown);
        outcome
    }
}

fn rejected(reason: &str) -> SettlementOutcome {
    SettlementOutcome::Rejected(reason.to_string())
}

// ── Harness ───────────────────────────────────────────────────────────────────

/// A fresh wallet over its own device, store, and audit trail, settling
/// against the given script.
fn build_wallet(script: Vec<SettlementOutcome>) -> Wallet {
    let tokens = Arc::new(TokenEngine::new(
        Arc::new(InMemoryTokenStore::new()),
        DeviceIdentity::generate(),
        KeyedDigest::new("demo-device-secret"),
    ));
    let sync = SyncEngine::new(
        Arc::clone(&tokens),
        Arc::new(ScriptedAuthority::new(script)),
        Arc::new(InMemoryRetryLedger::new()),
    )
    .with_base_delay(DEMO_BASE_DELAY);
    let audit = Arc::new(AuditTrail::new(KeyedDigest::new("demo-chain-key"), "opal-demo/0.1"));
    Wallet::new(tokens, sync, audit)
}

fn print_balances(wallet: &Wallet) {
    println!(
        "  balance: {}  |  offline-held: {}",
        wallet.balance(),
        wallet.offline_held()
    );
}

fn print_audit_tail(wallet: &Wallet, n: usize) {
    println!("  audit trail (newest first, chain intact: {}):", wallet.audit().verify_chain());
    for entry in wallet.audit().entries().iter().take(n) {
        println!("    {} {}/{} {}", entry.id, entry.category, entry.action, entry.detail);
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

/// Mint one token offline, settle it on the first attempt.
pub async fn happy_path() -> OpalResult<()> {
    println!("Scenario: happy path");
    println!("--------------------");

    let wallet = build_wallet(Vec::new());

    let token = wallet.pay_offline("MERCHANT001", 1500)?;
    println!("  minted {} for {} ({})", token.serial_number, token.merchant_name, token.amount);
    println!("  expires: {}", token.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    print_balances(&wallet);

    println!("  connectivity restored, reconciling...");
    let report = wallet.reconcile().await?;
    println!(
        "  report: {} total, {} settled, {} failed, {} refunded",
        report.total, report.settled, report.failed, report.refunded
    );
    print_balances(&wallet);
    print_audit_tail(&wallet, 3);
    println!();
    Ok(())
}

/// Two pending tokens against a flaky authority: one settles on its third
/// attempt, the other exhausts its budget and is refunded.
pub async fn retry_storm() -> OpalResult<()> {
    println!("Scenario: retry storm");
    println!("---------------------");

    let wallet = build_wallet(vec![
        // First token: unavailable twice, then accepted.
        SettlementOutcome::Unavailable,
        SettlementOutcome::Unavailable,
        SettlementOutcome::Accepted,
        // Second token: the authority times out on every attempt.
        rejected("UPI settlement timeout"),
        rejected("UPI settlement timeout"),
        rejected("UPI settlement timeout"),
    ]);

    wallet.pay_offline("MERCHANT002", 900)?;
    wallet.pay_offline("MERCHANT005", 450)?;
    print_balances(&wallet);

    println!("  reconciling (backoff compressed for the demo)...");
    let report = wallet.reconcile().await?;
    for result in &report.results {
        match &result.reason {
            None => println!(
                "  {} settled after {} attempt(s)",
                result.token_id, result.attempts
            ),
            Some(reason) => println!(
                "  {} failed after {} attempt(s): {}",
                result.token_id, result.attempts, reason
            ),
        }
    }
    print_balances(&wallet);

    println!("  reconciling again: the exhausted token is not re-attempted");
    let second = wallet.reconcile().await?;
    println!(
        "  report: {} total, {} settled, {} failed",
        second.total, second.settled, second.failed
    );
    print_balances(&wallet);
    println!();
    Ok(())
}

/// A token minted 49 hours ago is cleared and refunded without ever being
/// presented to the authority; a fresh one settles normally.
pub async fn expiry_refund() -> OpalResult<()> {
    println!("Scenario: expiry refund");
    println!("-----------------------");

    let wallet = build_wallet(Vec::new());

    let stale = wallet.pay_offline_at(
        "MERCHANT004",
        600,
        Utc::now() - chrono::Duration::hours(49),
    )?;
    println!("  stale token {} minted 49h ago (ttl is 48h)", stale.serial_number);
    let fresh = wallet.pay_offline("MERCHANT003", 800)?;
    println!("  fresh token {} minted now", fresh.serial_number);
    print_balances(&wallet);

    println!("  reconciling...");
    let report = wallet.reconcile().await?;
    println!(
        "  report: {} total, {} settled, {} expired, {} refunded",
        report.total, report.settled, report.expired, report.refunded
    );
    for result in &report.results {
        if let Some(reason) = &result.reason {
            println!("  {} -> {}", result.token_id, reason);
        }
    }
    print_balances(&wallet);
    print_audit_tail(&wallet, 4);
    println!();
    Ok(())
}

/// Token signatures and the audit hash chain both reject tampering.
pub async fn tamper_check() -> OpalResult<()> {
    println!("Scenario: tamper check");
    println!("----------------------");

    let wallet = build_wallet(Vec::new());
    let token = wallet.pay_offline("MERCHANT001", 1200)?;

    match wallet.tokens().validate(&token) {
        Ok(()) => println!("  untouched token validates"),
        Err(reason) => println!("  unexpected: {}", reason),
    }

    let mut forged = token.clone();
    forged.amount = 2;
    match wallet.tokens().validate(&forged) {
        Ok(()) => println!("  unexpected: forged token validated"),
        Err(reason) => println!("  amount changed 1200 -> 2: {}", reason),
    }

    let mut rerouted = token.clone();
    rerouted.merchant_id = "MERCHANT005".to_string();
    match wallet.tokens().validate(&rerouted) {
        Ok(()) => println!("  unexpected: rerouted token validated"),
        Err(reason) => println!("  merchant rerouted: {}", reason),
    }

    let summary = wallet.audit().summary();
    println!(
        "  audit: {} entries, chain intact: {}",
        summary.total_entries, summary.chain_intact
    );
    println!("  csv export:");
    for line in wallet.audit().export_csv().lines() {
        println!("    {}", line);
    }
    println!();
    Ok(())
}
