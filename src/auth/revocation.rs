//! Server-side token revocation
//!
//! Revoked token ids live in the ephemeral store with a TTL equal to
//! the token's remaining lifetime, so an entry never outlives the token
//! it blocks and no sweep is needed. There is no un-revoke operation.

use crate::error::Result;
use crate::store::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const KEY_PREFIX: &str = "revoked:";

#[derive(Clone)]
pub struct RevocationList {
    store: Arc<dyn KeyValueStore>,
}

impl RevocationList {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(token_id: Uuid) -> String {
        format!("{}{}", KEY_PREFIX, token_id)
    }

    /// Record a token id as revoked for `ttl`. Idempotent. A zero ttl
    /// means the token has already expired and there is nothing left
    /// to block.
    pub async fn revoke(&self, token_id: Uuid, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.store.set_ex(&Self::key(token_id), "1", ttl).await?;
        tracing::info!(jti = %token_id, ttl_secs = ttl.as_secs(), "revoked token");
        Ok(())
    }

    /// Whether the token id is revoked. Store failures propagate so
    /// callers on protected routes fail closed.
    pub async fn is_revoked(&self, token_id: Uuid) -> Result<bool> {
        Ok(self.store.exists(&Self::key(token_id)).await?)
    }
}
