//! # Payout Store
//!
//! Port for payout record persistence plus a thread-safe in-memory
//! implementation.
//!
//! Records are append-only: `insert` creates, `finalize` applies the single
//! permitted mutation (`Pending` → terminal) as a compare-and-set, and
//! nothing ever deletes. Durable persistence is an external concern; any
//! backing database implements the same port.

use crate::error::{PayoutError, PayoutResult};
use crate::payout::{IdempotencyKey, Payout, PayoutStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Result of a finalize attempt
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The CAS applied: the record moved `Pending` → terminal exactly now
    Applied(Payout),
    /// The record was already terminal; returned untouched.
    /// Concurrent pollers and resent callbacks land here.
    AlreadyTerminal(Payout),
}

impl TransitionOutcome {
    pub fn payout(&self) -> &Payout {
        match self {
            TransitionOutcome::Applied(p) | TransitionOutcome::AlreadyTerminal(p) => p,
        }
    }

    pub fn into_payout(self) -> Payout {
        match self {
            TransitionOutcome::Applied(p) | TransitionOutcome::AlreadyTerminal(p) => p,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

/// Port for payout record storage
#[async_trait]
pub trait PayoutStore: Send + Sync {
    /// Persist a freshly created record and its lookup indexes.
    /// The idempotency key, when present, maps to this record until a newer
    /// record claims the same key.
    async fn insert(
        &self,
        payout: Payout,
        idempotency_key: Option<IdempotencyKey>,
    ) -> PayoutResult<()>;

    async fn get(&self, id: Uuid) -> PayoutResult<Option<Payout>>;

    /// Resolve by provider reference (batch id / payout id / authority)
    async fn find_by_reference(&self, reference: &str) -> PayoutResult<Option<Payout>>;

    /// Resolve the most recent payout created under an idempotency key
    async fn find_by_idempotency_key(&self, key: &IdempotencyKey)
        -> PayoutResult<Option<Payout>>;

    /// Compare-and-set status transition `Pending` → `to`.
    ///
    /// `to` must be terminal. Sets `updated_at` (and `failure_reason`) only
    /// when the transition applies; an already-terminal record is returned
    /// unchanged so the caller reads the settled status.
    async fn finalize(
        &self,
        id: Uuid,
        to: PayoutStatus,
        failure_reason: Option<String>,
    ) -> PayoutResult<TransitionOutcome>;
}

/// Type alias for a shared store (dynamic dispatch)
pub type SharedPayoutStore = Arc<dyn PayoutStore>;

#[derive(Default)]
struct Inner {
    payouts: HashMap<Uuid, Payout>,
    by_reference: HashMap<String, Uuid>,
    by_idempotency: HashMap<IdempotencyKey, Uuid>,
}

/// A thread-safe in-memory payout store.
///
/// Uses a single `RwLock` over the record map and its indexes so the
/// compare-and-set in [`finalize`](PayoutStore::finalize) is atomic.
#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPayoutStore {
    /// Creates a new, empty in-memory payout store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held (test helper)
    pub async fn len(&self) -> usize {
        self.inner.read().await.payouts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every record, unordered (test/inspection helper)
    pub async fn all(&self) -> Vec<Payout> {
        self.inner.read().await.payouts.values().cloned().collect()
    }

    /// Map an idempotency key to an existing record id (test/inspection helper).
    /// Mirrors the index write performed by [`insert`](PayoutStore::insert)
    /// when an idempotency key is supplied.
    pub async fn index_idempotency(&self, key: IdempotencyKey, id: Uuid) {
        self.inner.write().await.by_idempotency.insert(key, id);
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn insert(
        &self,
        payout: Payout,
        idempotency_key: Option<IdempotencyKey>,
    ) -> PayoutResult<()> {
        let mut inner = self.inner.write().await;
        if inner.payouts.contains_key(&payout.id) {
            return Err(PayoutError::Internal(format!(
                "duplicate payout id {}",
                payout.id
            )));
        }
        inner
            .by_reference
            .insert(payout.provider_reference.clone(), payout.id);
        if let Some(key) = idempotency_key {
            inner.by_idempotency.insert(key, payout.id);
        }
        inner.payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> PayoutResult<Option<Payout>> {
        Ok(self.inner.read().await.payouts.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> PayoutResult<Option<Payout>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_reference
            .get(reference)
            .and_then(|id| inner.payouts.get(id))
            .cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> PayoutResult<Option<Payout>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_idempotency
            .get(key)
            .and_then(|id| inner.payouts.get(id))
            .cloned())
    }

    async fn finalize(
        &self,
        id: Uuid,
        to: PayoutStatus,
        failure_reason: Option<String>,
    ) -> PayoutResult<TransitionOutcome> {
        if !to.is_terminal() {
            return Err(PayoutError::Internal(format!(
                "finalize target must be terminal, got {to}"
            )));
        }

        let mut inner = self.inner.write().await;
        let payout = inner
            .payouts
            .get_mut(&id)
            .ok_or_else(|| PayoutError::PayoutNotFound { id: id.to_string() })?;

        if payout.status.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(payout.clone()));
        }

        payout.status = to;
        payout.failure_reason = failure_reason;
        payout.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied(payout.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{Currency, Price};
    use crate::payout::PayoutMethod;

    fn pending_payout(reference: &str) -> Payout {
        let now = Utc::now();
        Payout {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            amount: Price::new(50.0, Currency::USD),
            method: PayoutMethod::Paypal,
            provider_reference: reference.into(),
            status: PayoutStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = InMemoryPayoutStore::new();
        let payout = pending_payout("BATCH-1");
        let id = payout.id;

        store.insert(payout, None).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().unwrap().id, id);
        assert_eq!(
            store.find_by_reference("BATCH-1").await.unwrap().unwrap().id,
            id
        );
        assert!(store.find_by_reference("BATCH-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finalize_applies_once() {
        let store = InMemoryPayoutStore::new();
        let payout = pending_payout("BATCH-1");
        let id = payout.id;
        let created_at = payout.created_at;
        store.insert(payout, None).await.unwrap();

        let first = store
            .finalize(id, PayoutStatus::Success, None)
            .await
            .unwrap();
        assert!(first.was_applied());
        assert_eq!(first.payout().status, PayoutStatus::Success);
        assert!(first.payout().updated_at > created_at);

        // a second terminal write is a no-op read
        let second = store
            .finalize(id, PayoutStatus::Failed, Some("late".into()))
            .await
            .unwrap();
        assert!(!second.was_applied());
        assert_eq!(second.payout().status, PayoutStatus::Success);
        assert!(second.payout().failure_reason.is_none());
        assert_eq!(second.payout().updated_at, first.payout().updated_at);
    }

    #[tokio::test]
    async fn test_finalize_rejects_non_terminal_target() {
        let store = InMemoryPayoutStore::new();
        let payout = pending_payout("BATCH-1");
        let id = payout.id;
        store.insert(payout, None).await.unwrap();

        assert!(store
            .finalize(id, PayoutStatus::Pending, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_finalize_unknown_id() {
        let store = InMemoryPayoutStore::new();
        let err = store
            .finalize(Uuid::new_v4(), PayoutStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::PayoutNotFound { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_finalize_single_winner() {
        let store = InMemoryPayoutStore::new();
        let payout = pending_payout("BATCH-1");
        let id = payout.id;
        store.insert(payout, None).await.unwrap();

        let mut applied = 0;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.finalize(id, PayoutStatus::Success, None).await
            }));
        }
        for handle in handles {
            if handle.await.unwrap().unwrap().was_applied() {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_idempotency_index() {
        let store = InMemoryPayoutStore::new();
        let payout = pending_payout("BATCH-1");
        let id = payout.id;
        let key = IdempotencyKey {
            user_id: "user-1".into(),
            method: PayoutMethod::Paypal,
            amount: 5000,
            currency: Currency::USD,
            token: Some("tok-1".into()),
        };

        store.insert(payout, None).await.unwrap();
        store.index_idempotency(key.clone(), id).await;

        assert_eq!(
            store.find_by_idempotency_key(&key).await.unwrap().unwrap().id,
            id
        );

        let other = IdempotencyKey {
            token: Some("tok-2".into()),
            ..key
        };
        assert!(store.find_by_idempotency_key(&other).await.unwrap().is_none());
    }
}
