//! OPAL Offline Payment Core — Demo CLI
//!
//! Runs one or all of the four offline-payment scenarios. Each scenario
//! uses real OPAL components (token engine, sync engine, audit trail,
//! wallet) wired against a scripted settlement authority.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- happy-path
//!   cargo run -p demo -- retry-storm
//!   cargo run -p demo -- expiry-refund
//!   cargo run -p demo -- tamper-check

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use opal_contracts::error::OpalResult;

mod scenarios;

// ── CLI definition ────────────────────────────────────────────────────────────

/// OPAL — offline payment core demo.
///
/// Each subcommand runs one or all of the four scenarios, demonstrating
/// offline minting, bounded-retry settlement, expiry refunds, and tamper
/// evidence.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "OPAL offline payment core demo",
    long_about = "Runs OPAL offline payment scenarios showing signed token minting,\n\
                  settlement sync with bounded retries, expiry refunds, and the\n\
                  hash-chained audit trail."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four scenarios in sequence.
    RunAll,
    /// Scenario 1: mint offline, settle on the first attempt.
    HappyPath,
    /// Scenario 2: flaky authority — backoff, retry budget, exhaustion.
    RetryStorm,
    /// Scenario 3: a 49-hour-old token is refunded, never settled.
    ExpiryRefund,
    /// Scenario 4: forged tokens and the audit chain's tamper evidence.
    TamperCheck,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::HappyPath => scenarios::happy_path().await,
        Command::RetryStorm => scenarios::retry_storm().await,
        Command::ExpiryRefund => scenarios::expiry_refund().await,
        Command::TamperCheck => scenarios::tamper_check().await,
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_all() -> OpalResult<()> {
    scenarios::happy_path().await?;
    scenarios::retry_storm().await?;
    scenarios::expiry_refund().await?;
    scenarios::tamper_check().await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("OPAL — Offline Payment Authorization Layer");
    println!("Demo CLI");
    println!("==========================================");
    println!();
    println!("Offline payment lifecycle per token:");
    println!("  [1] Mint: device-signed token, funds move to the offline-held bucket");
    println!("  [2] Validate: spent -> expired -> device -> signature, in that order");
    println!("  [3] Sync: up to 3 settlement attempts with exponential backoff");
    println!("  [4] Outcome: settled for good, or refunded (failed / expired)");
    println!("  [5] Every step witnessed by the SHA-256 hash-chained audit trail");
    println!();
}
