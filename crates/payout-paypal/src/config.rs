//! # PayPal Configuration
//!
//! Configuration management for the PayPal Payouts integration.
//! All secrets are loaded from environment variables.

use payout_core::PayoutError;
use std::env;

pub const SANDBOX_API_BASE: &str = "https://api-m.sandbox.paypal.com";
pub const LIVE_API_BASE: &str = "https://api-m.paypal.com";

/// PayPal REST API configuration
#[derive(Debug, Clone)]
pub struct PaypalConfig {
    /// REST app client id
    pub client_id: String,

    /// REST app client secret
    pub client_secret: String,

    /// API base URL (sandbox by default, overridable for testing/mocking)
    pub api_base_url: String,

    /// Subject line on the recipient's payout email
    pub email_subject: String,
}

impl PaypalConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYPAL_CLIENT_ID`
    /// - `PAYPAL_CLIENT_SECRET`
    ///
    /// Optional:
    /// - `PAYPAL_API_BASE` (defaults to the sandbox host)
    pub fn from_env() -> Result<Self, PayoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let client_id = env::var("PAYPAL_CLIENT_ID")
            .map_err(|_| PayoutError::Configuration("PAYPAL_CLIENT_ID not set".to_string()))?;

        let client_secret = env::var("PAYPAL_CLIENT_SECRET").map_err(|_| {
            PayoutError::Configuration("PAYPAL_CLIENT_SECRET not set".to_string())
        })?;

        let api_base_url =
            env::var("PAYPAL_API_BASE").unwrap_or_else(|_| SANDBOX_API_BASE.to_string());

        Ok(Self {
            client_id,
            client_secret,
            api_base_url,
            email_subject: "You have a payout!".to_string(),
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base_url: SANDBOX_API_BASE.to_string(),
            email_subject: "You have a payout!".to_string(),
        }
    }

    /// Check if pointed at the live host
    pub fn is_live(&self) -> bool {
        self.api_base_url == LIVE_API_BASE
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config() {
        let config = PaypalConfig::new("client-abc", "secret-xyz");
        assert_eq!(config.api_base_url, SANDBOX_API_BASE);
        assert!(!config.is_live());
    }

    #[test]
    fn test_base_url_override() {
        let config = PaypalConfig::new("client-abc", "secret-xyz")
            .with_api_base_url("http://127.0.0.1:9000");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
    }
}
