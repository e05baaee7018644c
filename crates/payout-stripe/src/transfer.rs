//! # Stripe Payouts
//!
//! Synchronous payout submission against the Stripe API.
//!
//! Stripe answers the create call with the payout's resolution; there is no
//! polling contract and no callback. The engine records the result once and
//! never writes to the record again.

use crate::config::StripeConfig;
use async_trait::async_trait;
use payout_core::{
    PayoutDestination, PayoutError, PayoutRail, PayoutRequest, PayoutResult, PayoutStatus,
    SubmitReceipt,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const RAIL_NAME: &str = "stripe";

/// Stripe payout rail (card method)
///
/// The card number itself never crosses this boundary: only the last four
/// digits travel as metadata alongside the recipient name.
pub struct StripePayoutRail {
    config: StripeConfig,
    client: Client,
}

impl StripePayoutRail {
    /// Create a new Stripe payout rail
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> PayoutResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Resolve Stripe's payout status synchronously.
    /// An accepted payout emits no further signal, so acceptance is the
    /// terminal resolution for this rail.
    fn map_payout_status(status: &str) -> (PayoutStatus, Option<&'static str>) {
        match status {
            "paid" | "pending" | "in_transit" => (PayoutStatus::Success, None),
            "failed" => (PayoutStatus::Failed, Some("failed_at_provider")),
            "canceled" => (PayoutStatus::Failed, Some("canceled_at_provider")),
            _ => (PayoutStatus::Failed, Some("unknown_provider_status")),
        }
    }
}

#[async_trait]
impl PayoutRail for StripePayoutRail {
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn submit(&self, request: &PayoutRequest) -> PayoutResult<SubmitReceipt> {
        let (card_number, recipient_name) = match &request.destination {
            PayoutDestination::Card {
                card_number,
                recipient_name,
            } => (card_number, recipient_name),
            other => {
                return Err(PayoutError::Internal(format!(
                    "stripe rail cannot pay out to a {} destination",
                    other.method()
                )))
            }
        };

        let last4: String = card_number
            .chars()
            .rev()
            .take(4)
            .collect::<String>()
            .chars()
            .rev()
            .collect();

        let mut form_params: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.amount.to_string()),
            (
                "currency".to_string(),
                request.amount.currency.as_str().to_string(),
            ),
            ("method".to_string(), "standard".to_string()),
            ("metadata[recipient_name]".to_string(), recipient_name.clone()),
            ("metadata[card_last4]".to_string(), last4.clone()),
        ];
        if let Some(ref note) = request.note {
            form_params.push(("description".to_string(), note.clone()));
        }

        let idempotency_key = request
            .idempotency_token
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        debug!(card_last4 = %last4, "creating Stripe payout");

        let url = format!("{}/v1/payouts", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &idempotency_key)
            .form(&form_params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);
            return Err(map_api_error(status, &body));
        }

        let payout: StripePayoutResponse = serde_json::from_str(&body).map_err(|e| {
            PayoutError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        let (initial_status, reason) = Self::map_payout_status(&payout.status);

        info!(
            payout_id = %payout.id,
            provider_status = %payout.status,
            status = %initial_status,
            "Stripe payout resolved"
        );

        if let Some(reason) = reason {
            // surfaced as a rejection so the manager records the terminal
            // failure with the provider's reason
            return Err(PayoutError::ProviderRejected {
                rail: RAIL_NAME.to_string(),
                message: payout
                    .failure_code
                    .unwrap_or_else(|| reason.to_string()),
            });
        }

        Ok(SubmitReceipt {
            provider_reference: payout.id,
            initial_status,
            redirect_url: None,
            raw: serde_json::from_str(&body).ok(),
        })
    }

    fn rail_name(&self) -> &'static str {
        RAIL_NAME
    }
}

fn map_transport_error(err: reqwest::Error) -> PayoutError {
    if err.is_timeout() {
        PayoutError::ProviderTimeout {
            rail: RAIL_NAME.to_string(),
        }
    } else {
        PayoutError::ProviderUnavailable {
            rail: RAIL_NAME.to_string(),
            message: err.to_string(),
        }
    }
}

fn map_api_error(status: reqwest::StatusCode, body: &str) -> PayoutError {
    let message = serde_json::from_str::<StripeErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}", status));

    if status.is_server_error() {
        PayoutError::ProviderUnavailable {
            rail: RAIL_NAME.to_string(),
            message,
        }
    } else {
        PayoutError::ProviderRejected {
            rail: RAIL_NAME.to_string(),
            message,
        }
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePayoutResponse {
    id: String,
    status: String,
    #[serde(default)]
    failure_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}
