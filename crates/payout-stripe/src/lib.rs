//! # payout-stripe
//!
//! Stripe payout rail for the payrail payout engine.
//!
//! Stripe resolves a payout synchronously in the create response, so this
//! rail has no polling contract and no callback contract: the request
//! manager records the resolution once and the record is never written
//! again.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use payout_stripe::StripePayoutRail;
//! use payout_core::PayoutRail;
//!
//! // Create rail from environment (STRIPE_SECRET_KEY)
//! let rail = StripePayoutRail::from_env()?;
//!
//! let receipt = rail.submit(&request).await?;
//! // receipt.initial_status is already terminal
//! ```

pub mod config;
pub mod transfer;

// Re-exports
pub use config::StripeConfig;
pub use transfer::StripePayoutRail;
