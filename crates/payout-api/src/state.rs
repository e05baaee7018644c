//! # Application State
//!
//! Shared state for the Axum application: the payout manager, the
//! verification handler, and the engine settings loaded from
//! `config/payout.toml`.

use payout_core::{
    BoxedPayoutRail, InMemoryPayoutStore, ManagerPolicy, PayoutManager, PayoutMethod,
    RailSelector, ReconcilePolicy, SharedPayoutStore, ValidationPolicy, VerificationHandler,
};
use payout_paypal::PaypalPayoutRail;
use payout_stripe::StripePayoutRail;
use payout_zarinpal::ZarinpalGateway;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Engine tunables, loaded from `config/payout.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Amounts must be strictly greater than this
    pub min_amount: f64,
    /// Minimum recipient name length
    pub min_name_length: usize,
    /// Base backoff before the single submit retry, in milliseconds
    pub retry_backoff_ms: u64,
    /// Reconciliation poll interval, in seconds
    pub poll_interval_secs: u64,
    /// Reconciliation deadline, in seconds
    pub poll_deadline_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_amount: 0.0,
            min_name_length: 2,
            retry_backoff_ms: 1_000,
            poll_interval_secs: 5,
            poll_deadline_secs: 120,
        }
    }
}

impl EngineSettings {
    pub fn manager_policy(&self) -> ManagerPolicy {
        ManagerPolicy {
            validation: ValidationPolicy {
                min_amount: self.min_amount,
                min_name_len: self.min_name_length,
            },
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            deadline: Duration::from_secs(self.poll_deadline_secs),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payout request manager (validation, dispatch, persistence)
    pub manager: Arc<PayoutManager>,
    /// Redirect-callback verification handler
    pub verifier: Arc<VerificationHandler>,
    /// Polling policy for the status endpoint's long-poll mode
    pub reconcile: ReconcilePolicy,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create the production state: all three rails from environment config
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let settings = load_engine_settings();

        let paypal = PaypalPayoutRail::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize PayPal: {}", e))?;
        let stripe = StripePayoutRail::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
        let gateway = ZarinpalGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize gateway: {}", e))?;

        let rails = RailSelector::new()
            .with_rail(PayoutMethod::Paypal, Arc::new(paypal) as BoxedPayoutRail)
            .with_rail(PayoutMethod::Card, Arc::new(stripe) as BoxedPayoutRail)
            .with_rail(PayoutMethod::Bank, Arc::new(gateway) as BoxedPayoutRail);

        let store: SharedPayoutStore = Arc::new(InMemoryPayoutStore::new());
        Ok(Self::with_parts(rails, store, settings, config))
    }

    /// Assemble state from explicit parts (tests, embedding)
    pub fn with_parts(
        rails: RailSelector,
        store: SharedPayoutStore,
        settings: EngineSettings,
        config: AppConfig,
    ) -> Self {
        let manager = Arc::new(PayoutManager::new(
            rails.clone(),
            store.clone(),
            settings.manager_policy(),
        ));
        let verifier = Arc::new(VerificationHandler::new(store, rails));

        Self {
            manager,
            verifier,
            reconcile: settings.reconcile_policy(),
            config,
        }
    }
}

/// Load engine settings from `config/payout.toml`, falling back to defaults
fn load_engine_settings() -> EngineSettings {
    let config_paths = [
        "config/payout.toml",
        "../config/payout.toml",
        "../../config/payout.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("Loaded engine settings from {}", path);
                    return settings;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path, e);
                }
            }
        }
    }

    tracing::info!("No engine settings found, using defaults");
    EngineSettings::default()
}
