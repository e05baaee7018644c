//! # PayPal Payouts API
//!
//! Batch payout submission and status polling against the PayPal REST API.
//! A payout is submitted as a single-item batch; the batch id is the
//! engine's provider reference and the batch status feeds the
//! reconciliation loop.

use crate::config::PaypalConfig;
use async_trait::async_trait;
use payout_core::{
    PayoutDestination, PayoutError, PayoutRail, PayoutRequest, PayoutResult, PayoutStatus,
    RailStatus, SubmitReceipt,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const RAIL_NAME: &str = "paypal";

/// PayPal Payouts rail
///
/// Submits single-item payout batches and reports completion through
/// batch-status polling (`SUCCESS` / `DENIED` / `FAILED`, anything else is
/// still in flight).
pub struct PaypalPayoutRail {
    config: PaypalConfig,
    client: Client,
}

impl PaypalPayoutRail {
    /// Create a new PayPal payout rail
    pub fn new(config: PaypalConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> PayoutResult<Self> {
        let config = PaypalConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Fetch an OAuth2 access token (client-credentials grant)
    async fn access_token(&self) -> PayoutResult<String> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!("PayPal token error: status={}, body={}", status, body);
            return Err(map_api_error(status, &body));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            PayoutError::Serialization(format!("Failed to parse PayPal token response: {}", e))
        })?;

        Ok(token.access_token)
    }

    /// Map PayPal batch status vocabulary into the engine's status enum.
    /// NEW / PENDING / PROCESSING and anything unrecognized stay pending.
    fn map_batch_status(batch_status: &str) -> PayoutStatus {
        match batch_status {
            "SUCCESS" => PayoutStatus::Success,
            "DENIED" => PayoutStatus::Denied,
            "FAILED" => PayoutStatus::Failed,
            _ => PayoutStatus::Pending,
        }
    }
}

#[async_trait]
impl PayoutRail for PaypalPayoutRail {
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn submit(&self, request: &PayoutRequest) -> PayoutResult<SubmitReceipt> {
        let email = match &request.destination {
            PayoutDestination::Paypal { email } => email.clone(),
            other => {
                return Err(PayoutError::Internal(format!(
                    "paypal rail cannot pay out to a {} destination",
                    other.method()
                )))
            }
        };

        let token = self.access_token().await?;

        let sender_batch_id = Uuid::new_v4().to_string();
        let body = PayoutBatchRequest {
            sender_batch_header: SenderBatchHeader {
                sender_batch_id: sender_batch_id.clone(),
                email_subject: self.config.email_subject.clone(),
                email_message: request.note.clone(),
            },
            items: vec![PayoutItem {
                recipient_type: "EMAIL",
                amount: PayoutAmount {
                    value: request.amount.as_decimal_string(),
                    currency: request.amount.currency.to_string(),
                },
                receiver: email,
                note: request.note.clone(),
                sender_item_id: format!("{}-0", sender_batch_id),
            }],
        };

        debug!(sender_batch_id, "submitting PayPal payout batch");

        let url = format!("{}/v1/payments/payouts", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!("PayPal payouts error: status={}, body={}", status, body);
            return Err(map_api_error(status, &body));
        }

        let batch: PayoutBatchResponse = serde_json::from_str(&body).map_err(|e| {
            PayoutError::Serialization(format!("Failed to parse PayPal payout response: {}", e))
        })?;

        info!(
            batch_id = %batch.batch_header.payout_batch_id,
            batch_status = %batch.batch_header.batch_status,
            "created PayPal payout batch"
        );

        Ok(SubmitReceipt {
            provider_reference: batch.batch_header.payout_batch_id,
            // batches always settle asynchronously; the loop observes the end
            initial_status: PayoutStatus::Pending,
            redirect_url: None,
            raw: serde_json::from_str(&body).ok(),
        })
    }

    #[instrument(skip(self))]
    async fn check_status(&self, reference: &str) -> PayoutResult<RailStatus> {
        let token = self.access_token().await?;

        let url = format!(
            "{}/v1/payments/payouts/{}",
            self.config.api_base_url, reference
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!("PayPal status error: status={}, body={}", status, body);
            return Err(map_api_error(status, &body));
        }

        let batch: PayoutBatchResponse = serde_json::from_str(&body).map_err(|e| {
            PayoutError::Serialization(format!("Failed to parse PayPal status response: {}", e))
        })?;

        debug!(
            batch_id = %batch.batch_header.payout_batch_id,
            batch_status = %batch.batch_header.batch_status,
            "polled PayPal batch status"
        );

        Ok(RailStatus {
            status: Self::map_batch_status(&batch.batch_header.batch_status),
            raw: serde_json::from_str(&body).ok(),
        })
    }

    fn rail_name(&self) -> &'static str {
        RAIL_NAME
    }

    fn supports_status_polling(&self) -> bool {
        true
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
    let message = serde_json::from_str::<PaypalErrorResponse>(body)
        .map(|e| e.message.unwrap_or(e.name))
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
// PayPal API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct PayoutBatchRequest {
    sender_batch_header: SenderBatchHeader,
    items: Vec<PayoutItem>,
}

#[derive(Debug, Serialize)]
struct SenderBatchHeader {
    sender_batch_id: String,
    email_subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PayoutItem {
    recipient_type: &'static str,
    amount: PayoutAmount,
    receiver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    sender_item_id: String,
}

#[derive(Debug, Serialize)]
struct PayoutAmount {
    value: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PayoutBatchResponse {
    batch_header: BatchHeader,
}

#[derive(Debug, Deserialize)]
struct BatchHeader {
    payout_batch_id: String,
    batch_status: String,
}

#[derive(Debug, Deserialize)]
struct PaypalErrorResponse {
    name: String,
    #[serde(default)]
    message: Option<String>,
}
