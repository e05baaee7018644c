//! # payout-api
//!
//! HTTP API layer for the payrail payout engine.
//!
//! Wires the three rails (PayPal, Stripe, Zarinpal-style gateway) into the
//! core manager/verifier and exposes them over axum:
//!
//! - `POST /api/v1/payouts` — create a payout
//! - `GET /api/v1/payouts/{id}` — status by id or provider reference
//! - `GET /api/v1/payouts/verify` — redirect gateway callback

pub mod handlers;
pub mod routes;
pub mod state;
