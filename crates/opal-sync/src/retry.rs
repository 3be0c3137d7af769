//! Per-token retry bookkeeping.
//!
//! Attempt counts are keyed by token id and survive across sync runs, so a
//! later run resumes at the next attempt number instead of restarting from
//! one. This caps the lifetime attempt count for every token. The trait
//! exists so a durable implementation can slot in behind the engine; the
//! in-memory ledger lives for the process.

use std::collections::HashMap;
use std::sync::Mutex;

/// Persisted map of token id → settlement attempts consumed so far.
pub trait RetryLedger: Send + Sync {
    /// Attempts already consumed by this token. Zero when unseen.
    fn attempts(&self, token_id: &str) -> u32;

    /// Record that the token has now consumed `attempt` attempts.
    fn record_attempt(&self, token_id: &str, attempt: u32);

    /// Forget the token. Called on terminal outcomes, where the counter no
    /// longer matters; exhausted tokens keep theirs so future runs cannot
    /// restart the budget.
    fn clear(&self, token_id: &str);
}

/// In-memory `RetryLedger` backed by a `Mutex<HashMap<_, _>>`.
#[derive(Default)]
pub struct InMemoryRetryLedger {
    counts: Mutex<HashMap<String, u32>>,
}

impl InMemoryRetryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetryLedger for InMemoryRetryLedger {
    fn attempts(&self, token_id: &str) -> u32 {
        let counts = self.counts.lock().expect("retry ledger lock poisoned");
        counts.get(token_id).copied().unwrap_or(0)
    }

    fn record_attempt(&self, token_id: &str, attempt: u32) {
        let mut counts = self.counts.lock().expect("retry ledger lock poisoned");
        counts.insert(token_id.to_string(), attempt);
    }

    fn clear(&self, token_id: &str) {
        let mut counts = self.counts.lock().expect("retry ledger lock poisoned");
        counts.remove(token_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_token_has_zero_attempts() {
        let ledger = InMemoryRetryLedger::new();
        assert_eq!(ledger.attempts("TKN-x"), 0);
    }

    #[test]
    fn attempts_persist_until_cleared() {
        let ledger = InMemoryRetryLedger::new();
        ledger.record_attempt("TKN-x", 1);
        ledger.record_attempt("TKN-x", 2);
        assert_eq!(ledger.attempts("TKN-x"), 2);

        ledger.clear("TKN-x");
        assert_eq!(ledger.attempts("TKN-x"), 0);
    }
}
