//! # Payout Rail Trait
//!
//! Core Strategy-pattern trait for payout providers.
//! Implementations: PayPal Payouts, Stripe payouts, Zarinpal-style gateway.
//!
//! Each rail wraps one external payment API behind a uniform submit
//! contract, plus the completion-signal contract it actually supports:
//! status polling (PayPal batches) or callback verification (redirect
//! gateways). Stripe resolves synchronously and supports neither.

use crate::error::{PayoutError, PayoutResult};
use crate::money::Price;
use crate::payout::{CallbackVerdict, PayoutMethod, PayoutRequest, RailStatus, SubmitReceipt};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Core trait for payout provider implementations.
#[async_trait]
pub trait PayoutRail: Send + Sync {
    /// Submit a validated payout to the provider.
    ///
    /// # Returns
    /// A [`SubmitReceipt`] carrying the provider reference, the provider's
    /// immediate status, and a redirect URL for redirect-based rails.
    ///
    /// # Errors
    /// Provider payloads are normalized before returning:
    /// `ProviderUnavailable` (network/5xx), `ProviderRejected`
    /// (4xx/business refusal), `ProviderTimeout`.
    async fn submit(&self, request: &PayoutRequest) -> PayoutResult<SubmitReceipt>;

    /// Poll the provider for the current status of a submitted payout.
    ///
    /// Only meaningful when [`supports_status_polling`](Self::supports_status_polling)
    /// is true; the default refuses.
    async fn check_status(&self, reference: &str) -> PayoutResult<RailStatus> {
        let _ = reference;
        Err(PayoutError::Internal(format!(
            "rail {} does not support status polling",
            self.rail_name()
        )))
    }

    /// Resolve a redirect callback into a terminal verdict.
    ///
    /// `callback_status` is the provider-native code from the redirect
    /// query string. Only meaningful when
    /// [`supports_callback_verification`](Self::supports_callback_verification)
    /// is true; the default refuses.
    async fn verify_callback(
        &self,
        authority: &str,
        callback_status: &str,
        amount: &Price,
    ) -> PayoutResult<CallbackVerdict> {
        let _ = (authority, callback_status, amount);
        Err(PayoutError::Internal(format!(
            "rail {} does not support callback verification",
            self.rail_name()
        )))
    }

    /// Get the provider name (for logging and error payloads).
    fn rail_name(&self) -> &'static str;

    /// Whether this rail reports completion through status polling.
    fn supports_status_polling(&self) -> bool {
        false
    }

    /// Whether this rail reports completion through a redirect callback.
    fn supports_callback_verification(&self) -> bool {
        false
    }
}

/// Type alias for a shared payout rail (dynamic dispatch)
pub type BoxedPayoutRail = Arc<dyn PayoutRail>;

/// Dispatch table from payout method to the rail that executes it
#[derive(Clone, Default)]
pub struct RailSelector {
    rails: HashMap<PayoutMethod, BoxedPayoutRail>,
}

impl RailSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rail that executes `method`
    pub fn register(&mut self, method: PayoutMethod, rail: BoxedPayoutRail) {
        self.rails.insert(method, rail);
    }

    /// Register with builder pattern
    pub fn with_rail(mut self, method: PayoutMethod, rail: BoxedPayoutRail) -> Self {
        self.register(method, rail);
        self
    }

    /// Get the rail for a method
    pub fn get(&self, method: PayoutMethod) -> Option<&BoxedPayoutRail> {
        self.rails.get(&method)
    }

    /// Get the rail for a method, or an `UnsupportedMethod` error
    pub fn require(&self, method: PayoutMethod) -> PayoutResult<&BoxedPayoutRail> {
        self.get(method).ok_or_else(|| PayoutError::UnsupportedMethod {
            method: method.to_string(),
        })
    }

    /// List registered methods with their rail names
    pub fn registered(&self) -> Vec<(PayoutMethod, &'static str)> {
        self.rails
            .iter()
            .map(|(method, rail)| (*method, rail.rail_name()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rails.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::PayoutStatus;

    struct NullRail;

    #[async_trait]
    impl PayoutRail for NullRail {
        async fn submit(&self, _request: &PayoutRequest) -> PayoutResult<SubmitReceipt> {
            Ok(SubmitReceipt {
                provider_reference: "ref-1".into(),
                initial_status: PayoutStatus::Pending,
                redirect_url: None,
                raw: None,
            })
        }

        fn rail_name(&self) -> &'static str {
            "null"
        }
    }

    #[test]
    fn test_selector_dispatch() {
        let selector = RailSelector::new().with_rail(PayoutMethod::Paypal, Arc::new(NullRail));

        assert!(selector.get(PayoutMethod::Paypal).is_some());
        assert!(selector.get(PayoutMethod::Card).is_none());
        assert!(matches!(
            selector.require(PayoutMethod::Card),
            Err(PayoutError::UnsupportedMethod { .. })
        ));
    }

    #[tokio::test]
    async fn test_default_capabilities_refuse() {
        let rail = NullRail;
        assert!(!rail.supports_status_polling());
        assert!(!rail.supports_callback_verification());
        assert!(rail.check_status("ref-1").await.is_err());
        assert!(rail
            .verify_callback("A1", "OK", &Price::new(1.0, Default::default()))
            .await
            .is_err());
    }
}
