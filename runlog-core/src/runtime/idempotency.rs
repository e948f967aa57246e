// runlog-core/src/runtime/idempotency.rs
// ============================================================================
// Module: Idempotency Cache
// Description: Keyed by (user, endpoint, key); stores the first response so
//              replays are exact.
// Purpose: Guarantee that a retried request with the same caller-supplied
//          key returns byte-identical output, per §4.8.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! `composite_key = key + ":" + sha256(canonical_request_body)`, so the same
//! `idempotency_key` with a different body is never mistaken for a replay
//! (§8's "same key, different body" law) — it is simply a different cache
//! entry.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::UserId;
use crate::core::model::IdempotencyRecord;
use crate::core::time::Clock;
use crate::interfaces::Store;
use crate::interfaces::StoreError;

/// Errors raised by the idempotency cache.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The request body could not be canonicalised for hashing.
    #[error("failed to hash request body: {0}")]
    Hashing(String),
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The outcome of a [`IdempotencyCache::resolve`] call.
#[derive(Debug, Clone)]
pub enum IdempotencyOutcome {
    /// No prior response exists; the caller must execute the request and
    /// call [`IdempotencyCache::store`] with the result.
    Miss {
        /// The composite key to store the eventual response under.
        composite_key: String,
    },
    /// A prior response exists and must be replayed verbatim.
    Hit {
        /// The stored response body.
        response: Value,
    },
}

/// Keyed by `(user_id, endpoint, key)`; stores the first response so
/// replays are exact.
pub struct IdempotencyCache {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl IdempotencyCache {
    /// Creates a new IdempotencyCache.
    #[must_use]
    pub const fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Resolves whether `(user_id, endpoint, key, body)` has been seen
    /// before.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError`] if the body cannot be canonicalised or
    /// the store fails.
    pub fn resolve(
        &self,
        user_id: UserId,
        endpoint: &str,
        key: &str,
        body: &Value,
    ) -> Result<IdempotencyOutcome, IdempotencyError> {
        let composite_key = Self::composite_key(key, body)?;
        match self
            .store
            .find_idempotency_record(user_id, endpoint, &composite_key)?
        {
            Some(record) => {
                self.store.increment_counter("idempotency_hits_total", 1)?;
                Ok(IdempotencyOutcome::Hit {
                    response: record.stored_response,
                })
            }
            None => Ok(IdempotencyOutcome::Miss { composite_key }),
        }
    }

    /// Stores the response for a composite key obtained from
    /// [`IdempotencyCache::resolve`]'s `Miss` arm.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError`] on store failure.
    pub fn store(
        &self,
        user_id: UserId,
        endpoint: &str,
        composite_key: &str,
        response: Value,
    ) -> Result<(), IdempotencyError> {
        self.store.put_idempotency_record(IdempotencyRecord {
            user_id,
            endpoint: endpoint.to_string(),
            composite_key: composite_key.to_string(),
            stored_response: response,
            created_at: self.clock.now(),
        })?;
        self.store.increment_counter("idempotency_stores_total", 1)?;
        Ok(())
    }

    /// Computes `key + ":" + sha256(canonical_request_body)`.
    fn composite_key(key: &str, body: &Value) -> Result<String, IdempotencyError> {
        let bytes =
            canonical_json_bytes(body).map_err(|err| IdempotencyError::Hashing(err.to_string()))?;
        let digest = hash_bytes(HashAlgorithm::Sha256, &bytes);
        Ok(format!("{key}:{}", digest.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_different_body_yields_different_composite_keys() {
        let body_a = serde_json::json!({ "up_to_seq": 1 });
        let body_b = serde_json::json!({ "up_to_seq": 7 });
        let key_a = IdempotencyCache::composite_key("K", &body_a).unwrap_or_else(|_| panic!("hash a"));
        let key_b = IdempotencyCache::composite_key("K", &body_b).unwrap_or_else(|_| panic!("hash b"));
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn same_key_same_body_yields_same_composite_key() {
        let body = serde_json::json!({ "text": "hi" });
        let key_a = IdempotencyCache::composite_key("K", &body).unwrap_or_else(|_| panic!("hash a"));
        let key_b = IdempotencyCache::composite_key("K", &body).unwrap_or_else(|_| panic!("hash b"));
        assert_eq!(key_a, key_b);
    }
}
