//! # payout-core
//!
//! Core types and orchestration for the payrail payout engine.
//!
//! This crate provides:
//! - `validate` — method-aware request validation (Luhn, IBAN format,
//!   email, amount, name) and display formatters
//! - `PayoutRail` trait and `RailSelector` for provider dispatch
//! - `PayoutStore` port with a compare-and-set status transition, plus an
//!   in-memory implementation
//! - `PayoutManager` — request validation, idempotency, submit-with-retry,
//!   record creation
//! - `reconcile` — caller-owned status polling with a deadline backstop
//! - `VerificationHandler` — redirect-callback finalization
//! - `PayoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use payout_core::{PayoutManager, RailSelector, InMemoryPayoutStore, ManagerPolicy};
//!
//! let rails = RailSelector::new()
//!     .with_rail(PayoutMethod::Paypal, Arc::new(paypal_rail))
//!     .with_rail(PayoutMethod::Card, Arc::new(stripe_rail))
//!     .with_rail(PayoutMethod::Bank, Arc::new(gateway_rail));
//!
//! let store = Arc::new(InMemoryPayoutStore::new());
//! let manager = PayoutManager::new(rails, store.clone(), ManagerPolicy::default());
//!
//! let ticket = manager.create_payout(raw_request).await?;
//! // redirect rails: send the user to ticket.redirect_url
//! // polling rails: reconcile::reconcile(&store, &rail, ticket.payout.id, &policy).await?
//! ```

pub mod error;
pub mod manager;
pub mod money;
pub mod payout;
pub mod rail;
pub mod reconcile;
pub mod store;
pub mod validate;
pub mod verify;

// Re-exports for convenience
pub use error::{FailureKind, PayoutError, PayoutResult, ValidationErrors};
pub use manager::{ManagerPolicy, PayoutManager, PayoutTicket};
pub use money::{Currency, Price};
pub use payout::{
    CallbackVerdict, IdempotencyKey, Payout, PayoutDestination, PayoutMethod, PayoutRequest,
    PayoutStatus, RailStatus, RawPayoutRequest, SubmitReceipt,
};
pub use rail::{BoxedPayoutRail, PayoutRail, RailSelector};
pub use reconcile::{ReconcileOutcome, ReconcilePolicy};
pub use store::{InMemoryPayoutStore, PayoutStore, SharedPayoutStore, TransitionOutcome};
pub use validate::ValidationPolicy;
pub use verify::{Verification, VerificationHandler};
