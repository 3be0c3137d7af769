//! # opal-token
//!
//! The offline token engine: mints device-bound, time-limited payment
//! tokens, validates their integrity before settlement, and owns the token
//! store.
//!
//! ## Overview
//!
//! A token is valid for settlement iff it is unspent, inside its 48-hour
//! lifetime, bound to this device, and its keyed-digest signature
//! recomputes. Each violated clause is a named, non-retryable
//! [`TokenInvalidReason`](opal_contracts::TokenInvalidReason).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use opal_crypto::KeyedDigest;
//! use opal_token::{DeviceIdentity, InMemoryTokenStore, TokenEngine};
//!
//! let engine = TokenEngine::new(
//!     Arc::new(InMemoryTokenStore::new()),
//!     DeviceIdentity::generate(),
//!     KeyedDigest::new(device_secret),
//! );
//! let token = engine.generate(1500, "MERCHANT001", "Chai Corner")?;
//! engine.store(token.clone());
//! assert!(engine.validate(&token).is_ok());
//! ```

pub mod device;
pub mod engine;
pub mod store;

pub use device::DeviceIdentity;
pub use engine::TokenEngine;
pub use store::{InMemoryTokenStore, TokenStore};
