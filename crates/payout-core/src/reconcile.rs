//! # Status Reconciliation
//!
//! Polls a rail's status endpoint until a payout reaches a terminal state
//! or the caller's deadline expires.
//!
//! The loop is caller-owned: whoever holds the future drives it, and
//! cancelling is dropping it. The deadline is the backstop against leaked
//! polling; expiry surfaces the payout as still pending with an advisory,
//! never as a guessed terminal status. Concurrent pollers are safe because
//! the terminal write goes through the store's compare-and-set.

use crate::error::PayoutResult;
use crate::payout::{Payout, PayoutStatus};
use crate::rail::BoxedPayoutRail;
use crate::store::SharedPayoutStore;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Polling cadence and lifetime
#[derive(Debug, Clone, Copy)]
pub struct ReconcilePolicy {
    /// Fixed delay between status checks
    pub interval: Duration,
    /// Total polling lifetime before the advisory timeout
    pub deadline: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            deadline: Duration::from_secs(120),
        }
    }
}

impl ReconcilePolicy {
    /// Clamp the deadline, keeping the configured interval
    pub fn with_deadline(self, deadline: Duration) -> Self {
        Self { deadline, ..self }
    }
}

/// How a reconciliation attempt ended
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// A terminal status was observed and applied (or had already been)
    Terminal(Payout),
    /// Deadline passed with the payout still pending. Advisory only:
    /// the record is untouched and may be polled again later.
    DeadlineExceeded(Payout),
}

impl ReconcileOutcome {
    pub fn payout(&self) -> &Payout {
        match self {
            ReconcileOutcome::Terminal(p) | ReconcileOutcome::DeadlineExceeded(p) => p,
        }
    }

    /// True when the caller should surface a `reconciliation_timeout` advisory
    pub fn timed_out(&self) -> bool {
        matches!(self, ReconcileOutcome::DeadlineExceeded(_))
    }
}

/// One status check: poll the rail and apply a terminal result through the
/// store CAS. Returns the current record either way.
///
/// Reads are idempotent on the provider side; if two refreshers race, the
/// compare-and-set lets exactly one transition land.
#[instrument(skip(store, rail), fields(rail = rail.rail_name()))]
pub async fn refresh_status(
    store: &SharedPayoutStore,
    rail: &BoxedPayoutRail,
    payout_id: Uuid,
) -> PayoutResult<Payout> {
    let payout = store
        .get(payout_id)
        .await?
        .ok_or_else(|| crate::error::PayoutError::PayoutNotFound {
            id: payout_id.to_string(),
        })?;

    if payout.is_terminal() {
        return Ok(payout);
    }

    let polled = rail.check_status(&payout.provider_reference).await?;
    debug!(reference = %payout.provider_reference, status = %polled.status, "polled rail status");

    match polled.status {
        PayoutStatus::Pending => Ok(payout),
        terminal => {
            let reason = match terminal {
                PayoutStatus::Denied => Some("denied_by_provider".to_string()),
                PayoutStatus::Failed => Some("failed_at_provider".to_string()),
                _ => None,
            };
            let outcome = store.finalize(payout_id, terminal, reason).await?;
            Ok(outcome.into_payout())
        }
    }
}

/// Poll until terminal or deadline. See the module docs for ownership and
/// cancellation semantics.
#[instrument(skip(store, rail, policy), fields(rail = rail.rail_name()))]
pub async fn reconcile(
    store: &SharedPayoutStore,
    rail: &BoxedPayoutRail,
    payout_id: Uuid,
    policy: &ReconcilePolicy,
) -> PayoutResult<ReconcileOutcome> {
    let deadline = Instant::now() + policy.deadline;

    loop {
        match refresh_status(store, rail, payout_id).await {
            Ok(payout) if payout.is_terminal() => {
                return Ok(ReconcileOutcome::Terminal(payout));
            }
            Ok(payout) => {
                if Instant::now() + policy.interval > deadline {
                    warn!(payout_id = %payout_id, "reconciliation deadline exceeded, payout still pending");
                    return Ok(ReconcileOutcome::DeadlineExceeded(payout));
                }
            }
            // Transient poll failures keep the loop alive until the deadline;
            // a pending payout must not fail just because one read did.
            Err(err) if err.is_retryable() => {
                warn!(payout_id = %payout_id, code = err.code(), "status poll failed, will retry");
                if Instant::now() + policy.interval > deadline {
                    let payout = store.get(payout_id).await?.ok_or_else(|| {
                        crate::error::PayoutError::PayoutNotFound {
                            id: payout_id.to_string(),
                        }
                    })?;
                    return Ok(ReconcileOutcome::DeadlineExceeded(payout));
                }
            }
            Err(err) => return Err(err),
        }

        tokio::time::sleep(policy.interval).await;
    }
}
