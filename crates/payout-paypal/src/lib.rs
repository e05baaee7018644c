//! # payout-paypal
//!
//! PayPal Payouts rail for the payrail payout engine.
//!
//! Submits each payout as a single-item batch and reports completion via
//! batch-status polling, driven by the engine's reconciliation loop.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use payout_paypal::PaypalPayoutRail;
//! use payout_core::PayoutRail;
//!
//! // Create rail from environment (PAYPAL_CLIENT_ID / PAYPAL_CLIENT_SECRET)
//! let rail = PaypalPayoutRail::from_env()?;
//!
//! let receipt = rail.submit(&request).await?;
//! // receipt.provider_reference is the batch id; poll it:
//! let polled = rail.check_status(&receipt.provider_reference).await?;
//! ```

pub mod config;
pub mod payouts;

// Re-exports
pub use config::PaypalConfig;
pub use payouts::PaypalPayoutRail;
