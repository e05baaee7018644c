//! # Payout Request Manager
//!
//! Accepts a caller's payout intent, validates it, dispatches to the rail
//! selected by method, and persists the resulting payout record.
//!
//! Failure policy: transient provider failures are retried once with
//! backoff, then recorded as a terminal `Failed` payout; provider
//! rejections are recorded immediately without retry. A request never ends
//! with no record and no error.

use crate::error::{PayoutError, PayoutResult};
use crate::payout::{Payout, PayoutRequest, RawPayoutRequest, SubmitReceipt};
use crate::rail::RailSelector;
use crate::store::SharedPayoutStore;
use crate::validate::{self, ValidationPolicy};
use chrono::Utc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Tunables for the request manager
#[derive(Debug, Clone)]
pub struct ManagerPolicy {
    pub validation: ValidationPolicy,
    /// Base delay before the single retry of a transient submit failure
    pub retry_backoff: Duration,
}

impl Default for ManagerPolicy {
    fn default() -> Self {
        Self {
            validation: ValidationPolicy::default(),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// What the caller gets back from a successful create: the persisted record
/// plus the redirect URL for redirect-based rails (never persisted).
#[derive(Debug, Clone)]
pub struct PayoutTicket {
    pub payout: Payout,
    pub redirect_url: Option<String>,
}

/// Orchestrates payout creation across the registered rails
pub struct PayoutManager {
    rails: RailSelector,
    store: SharedPayoutStore,
    policy: ManagerPolicy,
}

impl PayoutManager {
    pub fn new(rails: RailSelector, store: SharedPayoutStore, policy: ManagerPolicy) -> Self {
        Self {
            rails,
            store,
            policy,
        }
    }

    pub fn rails(&self) -> &RailSelector {
        &self.rails
    }

    pub fn store(&self) -> &SharedPayoutStore {
        &self.store
    }

    pub fn policy(&self) -> &ManagerPolicy {
        &self.policy
    }

    /// Create a payout from a raw wire request.
    ///
    /// 1. Validate; on failure return the field map, create no record.
    /// 2. Short-circuit on an idempotency-key hit while the prior payout is
    ///    still pending.
    /// 3. Submit to the rail (one backoff retry on transient failure).
    /// 4. Persist exactly one payout record.
    #[instrument(skip(self, raw), fields(method = raw.payout_method.as_deref().unwrap_or("?")))]
    pub async fn create_payout(&self, raw: RawPayoutRequest) -> PayoutResult<PayoutTicket> {
        let request = validate::validate(&raw, &self.policy.validation)
            .map_err(PayoutError::Validation)?;

        let rail = self.rails.require(request.method())?;

        // A repeated request for an in-flight payout returns the existing
        // record instead of submitting a duplicate provider call.
        let key = request.idempotency_key();
        if let Some(existing) = self.store.find_by_idempotency_key(&key).await? {
            if !existing.is_terminal() {
                info!(payout_id = %existing.id, "idempotent replay, returning pending payout");
                return Ok(PayoutTicket {
                    payout: existing,
                    redirect_url: None,
                });
            }
        }

        let receipt = match self.submit_with_retry(rail.as_ref(), &request).await {
            Ok(receipt) => receipt,
            Err(err) => {
                // Terminal failure record so the request leaves an audit
                // trail even when the provider never accepted it.
                let payout = self
                    .record_failed(&request, &err)
                    .await?;
                warn!(payout_id = %payout.id, code = err.code(), "payout submit failed");
                return Err(err);
            }
        };

        let payout = Payout::from_submission(&request, &receipt);
        self.store.insert(payout.clone(), Some(key)).await?;

        info!(
            payout_id = %payout.id,
            rail = rail.rail_name(),
            reference = %payout.provider_reference,
            status = %payout.status,
            "payout created"
        );

        Ok(PayoutTicket {
            payout,
            redirect_url: receipt.redirect_url,
        })
    }

    /// Look up a payout by id, or by provider reference as a fallback
    pub async fn find_payout(&self, id_or_reference: &str) -> PayoutResult<Payout> {
        if let Ok(id) = Uuid::parse_str(id_or_reference) {
            if let Some(payout) = self.store.get(id).await? {
                return Ok(payout);
            }
        }
        self.store
            .find_by_reference(id_or_reference)
            .await?
            .ok_or_else(|| PayoutError::PayoutNotFound {
                id: id_or_reference.to_string(),
            })
    }

    async fn submit_with_retry(
        &self,
        rail: &dyn crate::rail::PayoutRail,
        request: &PayoutRequest,
    ) -> PayoutResult<SubmitReceipt> {
        match rail.submit(request).await {
            Err(err) if err.is_retryable() => {
                warn!(
                    rail = rail.rail_name(),
                    code = err.code(),
                    "transient submit failure, retrying once"
                );
                tokio::time::sleep(self.policy.retry_backoff).await;
                rail.submit(request).await
            }
            other => other,
        }
    }

    /// Persist the terminal `Failed` record for a submit that never
    /// produced a provider reference.
    async fn record_failed(
        &self,
        request: &PayoutRequest,
        err: &PayoutError,
    ) -> PayoutResult<Payout> {
        let now = Utc::now();
        let payout = Payout {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            amount: request.amount,
            method: request.method(),
            provider_reference: format!("unsubmitted:{}", Uuid::new_v4()),
            status: crate::payout::PayoutStatus::Failed,
            failure_reason: Some(failure_reason_for(err)),
            created_at: now,
            updated_at: now,
        };
        self.store.insert(payout.clone(), None).await?;
        Ok(payout)
    }
}

fn failure_reason_for(err: &PayoutError) -> String {
    match err {
        PayoutError::ProviderUnavailable { .. } => "provider_unavailable".to_string(),
        PayoutError::ProviderTimeout { .. } => "provider_timeout".to_string(),
        PayoutError::ProviderRejected { message, .. } => message.clone(),
        other => other.code().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::money::Price;
    use crate::payout::{PayoutStatus, SubmitReceipt};
    use crate::rail::{PayoutRail, RailSelector};
    use crate::store::InMemoryPayoutStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Rail returning a scripted sequence of submit results
    struct ScriptedRail {
        submits: AtomicUsize,
        script: Mutex<VecDeque<PayoutResult<SubmitReceipt>>>,
    }

    impl ScriptedRail {
        fn new(script: Vec<PayoutResult<SubmitReceipt>>) -> Arc<Self> {
            Arc::new(Self {
                submits: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn submit_count(&self) -> usize {
            self.submits.load(Ordering::SeqCst)
        }

        fn ok_receipt(reference: &str) -> PayoutResult<SubmitReceipt> {
            Ok(SubmitReceipt {
                provider_reference: reference.into(),
                initial_status: PayoutStatus::Pending,
                redirect_url: None,
                raw: None,
            })
        }

        fn unavailable() -> PayoutResult<SubmitReceipt> {
            Err(PayoutError::ProviderUnavailable {
                rail: "scripted".into(),
                message: "503".into(),
            })
        }
    }

    #[async_trait]
    impl PayoutRail for ScriptedRail {
        async fn submit(&self, _request: &PayoutRequest) -> PayoutResult<SubmitReceipt> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Self::ok_receipt("BATCH-X"))
        }

        fn rail_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn paypal_raw(amount: f64) -> RawPayoutRequest {
        RawPayoutRequest {
            user_id: Some("user-1".into()),
            amount: Some(amount),
            currency: Some("usd".into()),
            payout_method: Some("paypal".into()),
            email: Some("jane@example.com".into()),
            ..Default::default()
        }
    }

    fn manager_with(
        rail: Arc<ScriptedRail>,
        store: Arc<InMemoryPayoutStore>,
    ) -> PayoutManager {
        let rails = RailSelector::new()
            .with_rail(crate::payout::PayoutMethod::Paypal, rail as crate::rail::BoxedPayoutRail);
        let policy = ManagerPolicy {
            retry_backoff: Duration::from_millis(5),
            ..Default::default()
        };
        PayoutManager::new(rails, store, policy)
    }

    #[tokio::test]
    async fn test_create_payout_happy_path() {
        let rail = ScriptedRail::new(vec![ScriptedRail::ok_receipt("BATCH-1")]);
        let store = Arc::new(InMemoryPayoutStore::new());
        let manager = manager_with(rail.clone(), store.clone());

        let ticket = manager.create_payout(paypal_raw(50.0)).await.unwrap();

        assert_eq!(ticket.payout.status, PayoutStatus::Pending);
        assert_eq!(ticket.payout.provider_reference, "BATCH-1");
        assert_eq!(ticket.payout.amount, Price::new(50.0, crate::money::Currency::USD));
        assert_eq!(rail.submit_count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_validation_failure_creates_nothing() {
        let rail = ScriptedRail::new(vec![]);
        let store = Arc::new(InMemoryPayoutStore::new());
        let manager = manager_with(rail.clone(), store.clone());

        let err = manager.create_payout(paypal_raw(0.0)).await.unwrap_err();

        match err {
            PayoutError::Validation(errors) => {
                assert_eq!(errors.get("amount"), Some(FailureKind::InvalidAmount))
            }
            other => panic!("expected validation error, got {other}"),
        }
        assert_eq!(rail.submit_count(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_once_then_succeeds() {
        let rail = ScriptedRail::new(vec![
            ScriptedRail::unavailable(),
            ScriptedRail::ok_receipt("BATCH-2"),
        ]);
        let store = Arc::new(InMemoryPayoutStore::new());
        let manager = manager_with(rail.clone(), store.clone());

        let ticket = manager.create_payout(paypal_raw(25.0)).await.unwrap();

        assert_eq!(ticket.payout.provider_reference, "BATCH-2");
        assert_eq!(rail.submit_count(), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_persist_failed_record() {
        let rail = ScriptedRail::new(vec![
            ScriptedRail::unavailable(),
            ScriptedRail::unavailable(),
        ]);
        let store = Arc::new(InMemoryPayoutStore::new());
        let manager = manager_with(rail.clone(), store.clone());

        let err = manager.create_payout(paypal_raw(25.0)).await.unwrap_err();

        assert!(matches!(err, PayoutError::ProviderUnavailable { .. }));
        assert_eq!(rail.submit_count(), 2);
        assert_eq!(store.len().await, 1);

        // the audit record is terminal with a human-readable reason
        let payout = single_record(&store).await;
        assert_eq!(payout.status, PayoutStatus::Failed);
        assert_eq!(payout.failure_reason.as_deref(), Some("provider_unavailable"));
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let rail = ScriptedRail::new(vec![Err(PayoutError::ProviderRejected {
            rail: "scripted".into(),
            message: "receiver unconfirmed".into(),
        })]);
        let store = Arc::new(InMemoryPayoutStore::new());
        let manager = manager_with(rail.clone(), store.clone());

        let err = manager.create_payout(paypal_raw(25.0)).await.unwrap_err();

        assert!(matches!(err, PayoutError::ProviderRejected { .. }));
        assert_eq!(rail.submit_count(), 1);

        let payout = single_record(&store).await;
        assert_eq!(payout.status, PayoutStatus::Failed);
        assert_eq!(
            payout.failure_reason.as_deref(),
            Some("receiver unconfirmed")
        );
    }

    #[tokio::test]
    async fn test_idempotent_replay_returns_pending_record() {
        let rail = ScriptedRail::new(vec![
            ScriptedRail::ok_receipt("BATCH-1"),
            ScriptedRail::ok_receipt("BATCH-SHOULD-NOT-EXIST"),
        ]);
        let store = Arc::new(InMemoryPayoutStore::new());
        let manager = manager_with(rail.clone(), store.clone());

        let mut raw = paypal_raw(50.0);
        raw.idempotency_key = Some("tok-1".into());

        let first = manager.create_payout(raw.clone()).await.unwrap();
        let second = manager.create_payout(raw).await.unwrap();

        assert_eq!(first.payout.id, second.payout.id);
        assert_eq!(rail.submit_count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_payout_by_id_and_reference() {
        let rail = ScriptedRail::new(vec![ScriptedRail::ok_receipt("BATCH-1")]);
        let store = Arc::new(InMemoryPayoutStore::new());
        let manager = manager_with(rail, store);

        let ticket = manager.create_payout(paypal_raw(50.0)).await.unwrap();

        let by_id = manager
            .find_payout(&ticket.payout.id.to_string())
            .await
            .unwrap();
        let by_reference = manager.find_payout("BATCH-1").await.unwrap();
        assert_eq!(by_id.id, by_reference.id);

        assert!(matches!(
            manager.find_payout("missing").await,
            Err(PayoutError::PayoutNotFound { .. })
        ));
    }

    /// Fetch the single record a scenario created
    async fn single_record(store: &Arc<InMemoryPayoutStore>) -> Payout {
        let mut all = store.all().await;
        assert_eq!(all.len(), 1);
        all.pop().unwrap()
    }
}
