//! # Gateway Configuration
//!
//! Configuration management for the Zarinpal-style redirect gateway.
//! The merchant id and callback URL are loaded from environment variables.

use payout_core::PayoutError;
use std::env;

pub const DEFAULT_API_BASE: &str = "https://api.zarinpal.com";
pub const DEFAULT_WEB_BASE: &str = "https://www.zarinpal.com";

/// Redirect gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 36-character merchant id issued by the gateway
    pub merchant_id: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// Web base URL the user is redirected to (`{web}/pg/StartPay/{authority}`)
    pub web_base_url: String,

    /// Where the gateway sends the user back (`?Authority=..&Status=..`)
    pub callback_url: String,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `ZARINPAL_MERCHANT_ID`
    /// - `ZARINPAL_CALLBACK_URL`
    ///
    /// Optional:
    /// - `ZARINPAL_API_BASE`, `ZARINPAL_WEB_BASE`
    pub fn from_env() -> Result<Self, PayoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let merchant_id = env::var("ZARINPAL_MERCHANT_ID").map_err(|_| {
            PayoutError::Configuration("ZARINPAL_MERCHANT_ID not set".to_string())
        })?;

        if merchant_id.len() != 36 {
            return Err(PayoutError::Configuration(
                "ZARINPAL_MERCHANT_ID must be a 36-character id".to_string(),
            ));
        }

        let callback_url = env::var("ZARINPAL_CALLBACK_URL").map_err(|_| {
            PayoutError::Configuration("ZARINPAL_CALLBACK_URL not set".to_string())
        })?;

        Ok(Self {
            merchant_id,
            api_base_url: env::var("ZARINPAL_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            web_base_url: env::var("ZARINPAL_WEB_BASE")
                .unwrap_or_else(|_| DEFAULT_WEB_BASE.to_string()),
            callback_url,
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(merchant_id: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            web_base_url: DEFAULT_WEB_BASE.to_string(),
            callback_url: callback_url.into(),
        }
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set custom web base URL (for testing)
    pub fn with_web_base_url(mut self, url: impl Into<String>) -> Self {
        self.web_base_url = url.into();
        self
    }

    /// The redirect URL for an issued authority token
    pub fn start_pay_url(&self, authority: &str) -> String {
        format!("{}/pg/StartPay/{}", self.web_base_url, authority)
    }
}
