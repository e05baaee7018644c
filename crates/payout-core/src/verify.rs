//! # Callback Verification
//!
//! Resolves a redirect-based rail's out-of-band callback
//! (`Authority` + provider status code) into a terminal payout state.
//!
//! This is the only write path for redirect-gateway payouts; the polling
//! loop never touches them. A resent callback for a settled payout is a
//! no-op read.

use crate::error::{PayoutError, PayoutResult};
use crate::payout::{Payout, PayoutStatus};
use crate::rail::RailSelector;
use crate::store::SharedPayoutStore;
use tracing::{info, instrument, warn};

/// Result returned to the redirect callback endpoint
#[derive(Debug, Clone)]
pub struct Verification {
    pub payout: Payout,
    pub message: String,
}

impl Verification {
    pub fn status(&self) -> PayoutStatus {
        self.payout.status
    }
}

/// Finalizes redirect-gateway payouts from their callback signal
pub struct VerificationHandler {
    store: SharedPayoutStore,
    rails: RailSelector,
}

impl VerificationHandler {
    pub fn new(store: SharedPayoutStore, rails: RailSelector) -> Self {
        Self { store, rails }
    }

    /// Consume a verification callback.
    ///
    /// 1. Resolve the payout by `provider_reference == authority`;
    ///    unknown ⇒ [`PayoutError::UnknownAuthority`], nothing mutated.
    /// 2. Already terminal ⇒ return the settled status (idempotent).
    /// 3. Otherwise ask the owning rail for a verdict and apply it through
    ///    the store compare-and-set; a racing resend reads the winner's
    ///    status.
    #[instrument(skip(self))]
    pub async fn verify(
        &self,
        authority: &str,
        callback_status: &str,
    ) -> PayoutResult<Verification> {
        let payout = self
            .store
            .find_by_reference(authority)
            .await?
            .ok_or_else(|| {
                warn!(authority, "verification callback for unknown authority");
                PayoutError::UnknownAuthority {
                    authority: authority.to_string(),
                }
            })?;

        if payout.is_terminal() {
            info!(payout_id = %payout.id, status = %payout.status, "callback replay on settled payout");
            return Ok(Verification {
                message: settled_message(&payout),
                payout,
            });
        }

        let rail = self.rails.require(payout.method)?;
        if !rail.supports_callback_verification() {
            return Err(PayoutError::Internal(format!(
                "payout {} belongs to rail {} which has no callback contract",
                payout.id,
                rail.rail_name()
            )));
        }

        let verdict = rail
            .verify_callback(authority, callback_status, &payout.amount)
            .await?;

        let failure_reason = if verdict.success {
            None
        } else {
            Some(
                verdict
                    .reason
                    .clone()
                    .unwrap_or_else(|| "verification_failed".to_string()),
            )
        };

        let outcome = self
            .store
            .finalize(payout.id, verdict.status(), failure_reason)
            .await?;
        let payout = outcome.into_payout();

        info!(
            payout_id = %payout.id,
            status = %payout.status,
            ref_id = verdict.ref_id.as_deref().unwrap_or("-"),
            "verification applied"
        );

        Ok(Verification {
            message: settled_message(&payout),
            payout,
        })
    }
}

fn settled_message(payout: &Payout) -> String {
    match payout.status {
        PayoutStatus::Success => "payout verified".to_string(),
        PayoutStatus::Pending => "payout pending".to_string(),
        _ => payout
            .failure_reason
            .clone()
            .unwrap_or_else(|| "payout failed".to_string()),
    }
}
