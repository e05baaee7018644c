//! # payout-zarinpal
//!
//! Zarinpal-style redirect gateway rail for the payrail payout engine.
//!
//! Submitting returns an authority token plus a redirect URL; the user
//! completes the flow at the gateway, which then sends them back with
//! `Authority` and `Status` query parameters. The engine's verification
//! handler feeds that callback into [`ZarinpalGateway::verify_callback`],
//! which re-queries the gateway before declaring success.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use payout_zarinpal::ZarinpalGateway;
//! use payout_core::PayoutRail;
//!
//! // Create rail from environment (ZARINPAL_MERCHANT_ID / ZARINPAL_CALLBACK_URL)
//! let rail = ZarinpalGateway::from_env()?;
//!
//! let receipt = rail.submit(&request).await?;
//! // send the user to receipt.redirect_url, then handle the callback:
//! let verdict = rail.verify_callback(&authority, &status, &amount).await?;
//! ```

pub mod config;
pub mod gateway;

// Re-exports
pub use config::GatewayConfig;
pub use gateway::ZarinpalGateway;
