//! Ephemeral key-value store abstraction
//!
//! The revocation list and the rate limiter both sit on top of a small
//! store contract with native per-key expiry: `SET key value EX ttl`,
//! `EXISTS key`, `INCR key` and `EXPIRE key ttl`. Each call must be
//! atomic at the store so concurrent requests never lose updates.

pub mod memory;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("value at key is not an integer")]
    NotAnInteger,
}

impl From<StoreError> for crate::error::Error {
    fn from(err: StoreError) -> Self {
        crate::error::Error::StoreUnavailable(err.to_string())
    }
}

/// Minimal command set the core needs from an ephemeral store.
///
/// A production deployment can implement this against Redis; the crate
/// ships [`MemoryStore`] as the in-process implementation.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set a key with a time-to-live. Overwrites any existing entry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Check whether a live (non-expired) entry exists for the key.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically increment the integer at `key`, creating it at 1 if
    /// absent or expired. Returns the new value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set the time-to-live on an existing key. Returns false if the
    /// key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}
