//! Token storage.
//!
//! `TokenStore` is the seam between the token engine and whatever holds the
//! tokens — the engine has exclusive write access and other components go
//! through its API. `InMemoryTokenStore` is the reference implementation:
//! a `Vec` in mint order behind a `Mutex`, looked up by token id.

use std::sync::Mutex;

use opal_contracts::OfflineToken;

/// Persistent home of every minted token, keyed by token id.
///
/// Implementations must apply mutations synchronously — when a call
/// returns, the change is durable as far as the store is concerned. There
/// is no asynchronous write queue.
pub trait TokenStore: Send + Sync {
    /// Add a freshly minted token. Insertion order is preserved so sync
    /// runs process tokens oldest-mint-first.
    fn insert(&self, token: OfflineToken);

    /// Fetch a token by id.
    fn get(&self, id: &str) -> Option<OfflineToken>;

    /// Set the token's `spent` flag. Returns false when the id is unknown.
    ///
    /// Idempotent: marking an already-spent token is a no-op that still
    /// returns true.
    fn mark_spent(&self, id: &str) -> bool;

    /// Snapshot of every stored token in insertion order.
    fn all(&self) -> Vec<OfflineToken>;

    /// Remove the given ids from the store. Unknown ids are ignored.
    fn remove(&self, ids: &[String]);
}

/// In-memory `TokenStore` backed by a `Mutex<Vec<_>>`.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<Vec<OfflineToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn insert(&self, token: OfflineToken) {
        let mut tokens = self.tokens.lock().expect("token store lock poisoned");
        tokens.push(token);
    }

    fn get(&self, id: &str) -> Option<OfflineToken> {
        let tokens = self.tokens.lock().expect("token store lock poisoned");
        tokens.iter().find(|t| t.id == id).cloned()
    }

    fn mark_spent(&self, id: &str) -> bool {
        let mut tokens = self.tokens.lock().expect("token store lock poisoned");
        match tokens.iter_mut().find(|t| t.id == id) {
            Some(token) => {
                // Already-spent tokens stay spent; the flag never reverts.
                token.spent = true;
                true
            }
            None => false,
        }
    }

    fn all(&self) -> Vec<OfflineToken> {
        let tokens = self.tokens.lock().expect("token store lock poisoned");
        tokens.clone()
    }

    fn remove(&self, ids: &[String]) {
        let mut tokens = self.tokens.lock().expect("token store lock poisoned");
        tokens.retain(|t| !ids.contains(&t.id));
    }
}
