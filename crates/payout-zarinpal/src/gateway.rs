//! # Redirect Gateway Rail
//!
//! Zarinpal-style payment gateway: submitting yields an authority token and
//! a redirect URL; the terminal state arrives out-of-band when the gateway
//! sends the user back with `Authority` and `Status` query parameters.
//!
//! The engine's verification handler owns the terminal transition; this
//! rail turns the callback into a verdict, re-querying the gateway when the
//! callback claims success (`Status == "OK"`).

use crate::config::GatewayConfig;
use async_trait::async_trait;
use payout_core::{
    CallbackVerdict, PayoutDestination, PayoutError, PayoutRail, PayoutRequest, PayoutResult,
    PayoutStatus, Price, SubmitReceipt,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

const RAIL_NAME: &str = "zarinpal";

/// Gateway code for a verified payment
const CODE_VERIFIED: i64 = 100;
/// Gateway code for a payment already verified by an earlier call
const CODE_ALREADY_VERIFIED: i64 = 101;

/// Redirect gateway rail (bank method)
pub struct ZarinpalGateway {
    config: GatewayConfig,
    client: Client,
}

impl ZarinpalGateway {
    /// Create a new gateway rail
    pub fn new(config: GatewayConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Create from environment variables
    pub fn from_env() -> PayoutResult<Self> {
        let config = GatewayConfig::from_env()?;
        Ok(Self::new(config))
    }
}

#[async_trait]
impl PayoutRail for ZarinpalGateway {
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn submit(&self, request: &PayoutRequest) -> PayoutResult<SubmitReceipt> {
        let (iban, recipient_name) = match &request.destination {
            PayoutDestination::Bank {
                iban,
                recipient_name,
            } => (iban, recipient_name),
            other => {
                return Err(PayoutError::Internal(format!(
                    "gateway rail cannot pay out to a {} destination",
                    other.method()
                )))
            }
        };

        let description = request
            .note
            .clone()
            .unwrap_or_else(|| format!("Payout to {}", recipient_name));

        let body = PaymentRequest {
            merchant_id: self.config.merchant_id.clone(),
            amount: request.amount.amount,
            currency: request.amount.currency.to_string(),
            description,
            callback_url: self.config.callback_url.clone(),
            metadata: PaymentMetadata {
                iban: iban.clone(),
                recipient_name: recipient_name.clone(),
            },
        };

        debug!("requesting gateway authority");

        let url = format!("{}/pg/v4/payment/request.json", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!("gateway request error: status={}, body={}", status, text);
            return Err(map_api_error(status, &text));
        }

        let parsed: PaymentRequestResponse = serde_json::from_str(&text).map_err(|e| {
            PayoutError::Serialization(format!("Failed to parse gateway response: {}", e))
        })?;

        let data = match parsed.data {
            Some(data) if data.code == CODE_VERIFIED => data,
            Some(data) => {
                return Err(PayoutError::ProviderRejected {
                    rail: RAIL_NAME.to_string(),
                    message: format!("gateway refused with code {}", data.code),
                })
            }
            None => {
                let message = parsed
                    .errors
                    .map(|e| e.message)
                    .unwrap_or_else(|| "gateway returned no data".to_string());
                return Err(PayoutError::ProviderRejected {
                    rail: RAIL_NAME.to_string(),
                    message,
                });
            }
        };

        info!(authority = %data.authority, "gateway authority issued");

        Ok(SubmitReceipt {
            redirect_url: Some(self.config.start_pay_url(&data.authority)),
            provider_reference: data.authority,
            // settles only through the verification callback
            initial_status: PayoutStatus::Pending,
            raw: serde_json::from_str(&text).ok(),
        })
    }

    #[instrument(skip(self, amount))]
    async fn verify_callback(
        &self,
        authority: &str,
        callback_status: &str,
        amount: &Price,
    ) -> PayoutResult<CallbackVerdict> {
        // A non-OK status means the user bailed at the gateway; there is
        // nothing to re-query.
        if callback_status != "OK" {
            info!(authority, callback_status, "callback reports cancellation");
            return Ok(CallbackVerdict {
                success: false,
                reason: Some("canceled_by_user".to_string()),
                ref_id: None,
            });
        }

        let body = VerifyRequest {
            merchant_id: self.config.merchant_id.clone(),
            amount: amount.amount,
            authority: authority.to_string(),
        };

        let url = format!("{}/pg/v4/payment/verify.json", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            error!("gateway verify error: status={}, body={}", status, text);
            return Err(map_api_error(status, &text));
        }

        let parsed: VerifyResponse = serde_json::from_str(&text).map_err(|e| {
            PayoutError::Serialization(format!("Failed to parse verify response: {}", e))
        })?;

        match parsed.data {
            Some(data) if data.code == CODE_VERIFIED || data.code == CODE_ALREADY_VERIFIED => {
                info!(authority, ref_id = data.ref_id, code = data.code, "gateway verified");
                Ok(CallbackVerdict {
                    success: true,
                    reason: None,
                    ref_id: data.ref_id.map(|id| id.to_string()),
                })
            }
            Some(data) => {
                info!(authority, code = data.code, "gateway verification failed");
                Ok(CallbackVerdict {
                    success: false,
                    reason: Some(format!("code_{}", data.code)),
                    ref_id: None,
                })
            }
            None => {
                let message = parsed
                    .errors
                    .map(|e| format!("code_{}", e.code))
                    .unwrap_or_else(|| "verification_failed".to_string());
                Ok(CallbackVerdict {
                    success: false,
                    reason: Some(message),
                    ref_id: None,
                })
            }
        }
    }

    fn rail_name(&self) -> &'static str {
        RAIL_NAME
    }

    fn supports_callback_verification(&self) -> bool {
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
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.errors)
        .map(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {}", status));

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
// Gateway API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct PaymentRequest {
    merchant_id: String,
    amount: i64,
    currency: String,
    description: String,
    callback_url: String,
    metadata: PaymentMetadata,
}

#[derive(Debug, Serialize)]
struct PaymentMetadata {
    iban: String,
    recipient_name: String,
}

#[derive(Debug, Deserialize)]
struct PaymentRequestResponse {
    #[serde(default, deserialize_with = "empty_as_none")]
    data: Option<RequestData>,
    #[serde(default, deserialize_with = "empty_as_none")]
    errors: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct RequestData {
    code: i64,
    authority: String,
}

#[derive(Debug, Serialize)]
struct VerifyRequest {
    merchant_id: String,
    amount: i64,
    authority: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default, deserialize_with = "empty_as_none")]
    data: Option<VerifyData>,
    #[serde(default, deserialize_with = "empty_as_none")]
    errors: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    code: i64,
    #[serde(default)]
    ref_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default, deserialize_with = "empty_as_none")]
    errors: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    code: i64,
    message: String,
}

/// The gateway sends `[]` for the empty side of `data`/`errors`; treat any
/// non-object value as absent.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_object() {
        T::deserialize(value)
            .map(Some)
            .map_err(serde::de::Error::custom)
    } else {
        Ok(None)
    }
}
