//! Device identity.
//!
//! Every token is bound to the device that minted it. The identity is
//! generated once and held for the engine's lifetime; a durable deployment
//! persists it in secure device storage so it survives restarts.

use serde::{Deserialize, Serialize};

/// A stable identifier for the issuing device, of the form `DEV-{uuid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    id: String,
}

impl DeviceIdentity {
    /// Generate a fresh identity. Call once per device lifetime.
    pub fn generate() -> Self {
        Self { id: format!("DEV-{}", uuid::Uuid::new_v4()) }
    }

    /// Rehydrate a previously persisted identity.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
