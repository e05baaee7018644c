//! # Payout Types
//!
//! The payout record, its status state machine, and the request shapes
//! that flow through the engine.

use crate::money::{Currency, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payout rails the engine can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    Paypal,
    Bank,
    Card,
}

impl PayoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::Paypal => "paypal",
            PayoutMethod::Bank => "bank",
            PayoutMethod::Card => "card",
        }
    }

    /// Parse the wire value (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paypal" => Some(PayoutMethod::Paypal),
            "bank" => Some(PayoutMethod::Bank),
            "card" => Some(PayoutMethod::Card),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayoutMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the money goes. Exactly the fields the method requires,
/// normalized (whitespace-stripped, IBAN uppercased) by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PayoutDestination {
    Paypal { email: String },
    Bank { iban: String, recipient_name: String },
    Card { card_number: String, recipient_name: String },
}

impl PayoutDestination {
    pub fn method(&self) -> PayoutMethod {
        match self {
            PayoutDestination::Paypal { .. } => PayoutMethod::Paypal,
            PayoutDestination::Bank { .. } => PayoutMethod::Bank,
            PayoutDestination::Card { .. } => PayoutMethod::Card,
        }
    }
}

/// Status of a payout record.
///
/// `Pending` is the only non-terminal state. Terminal states are immutable:
/// the store refuses any transition away from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Submitted to the provider, completion signal not yet observed
    Pending,
    /// Funds moved
    Success,
    /// Provider denied the payout (PayPal batch vocabulary)
    Denied,
    /// Payout failed
    Failed,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Success => "success",
            PayoutStatus::Denied => "denied",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl Default for PayoutStatus {
    fn default() -> Self {
        PayoutStatus::Pending
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The raw, untrusted wire shape of a payout request.
///
/// Flat on purpose: the caller posts whichever fields its form collected and
/// validation resolves them into a [`PayoutDestination`], ignoring fields
/// that belong to other methods.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPayoutRequest {
    /// Authenticated user on whose behalf the payout runs
    #[serde(default)]
    pub user_id: Option<String>,
    /// Decimal amount, e.g. 50.0
    #[serde(default)]
    pub amount: Option<f64>,
    /// ISO 4217 code, defaults to USD
    #[serde(default)]
    pub currency: Option<String>,
    /// "paypal" | "bank" | "card"
    #[serde(default)]
    pub payout_method: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    /// Free-form note forwarded to the provider
    #[serde(default)]
    pub note: Option<String>,
    /// Caller-supplied idempotency token
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// A validated, normalized payout request ready for rail dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRequest {
    pub user_id: String,
    pub amount: Price,
    pub destination: PayoutDestination,
    pub note: Option<String>,
    pub idempotency_token: Option<String>,
}

impl PayoutRequest {
    pub fn method(&self) -> PayoutMethod {
        self.destination.method()
    }

    /// The duplicate-suppression key for this request
    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey {
            user_id: self.user_id.clone(),
            method: self.method(),
            amount: self.amount.amount,
            currency: self.amount.currency,
            token: self.idempotency_token.clone(),
        }
    }
}

/// Key identifying a logical payout request for duplicate suppression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub user_id: String,
    pub method: PayoutMethod,
    /// Smallest currency unit
    pub amount: i64,
    pub currency: Currency,
    pub token: Option<String>,
}

/// A payout record. Append-only audit entry: created once by the request
/// manager, finalized at most once through the store's compare-and-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub user_id: String,
    pub amount: Price,
    pub method: PayoutMethod,
    /// Provider-side identity: batch id, payout id, or authority token.
    /// Join key for reconciliation and verification.
    pub provider_reference: String,
    pub status: PayoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    /// Create a fresh record from a validated request and a rail receipt
    pub fn from_submission(request: &PayoutRequest, receipt: &SubmitReceipt) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            amount: request.amount,
            method: request.method(),
            provider_reference: receipt.provider_reference.clone(),
            status: receipt.initial_status,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// What a rail returns from a successful submit
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// Provider-side identity of the operation
    pub provider_reference: String,
    /// The provider's immediate answer (Pending for async rails)
    pub initial_status: PayoutStatus,
    /// Where to send the user for redirect-based rails; never persisted
    pub redirect_url: Option<String>,
    /// Raw provider payload, kept for logging/audit
    pub raw: Option<serde_json::Value>,
}

/// A polled provider status, already mapped into the engine vocabulary
#[derive(Debug, Clone)]
pub struct RailStatus {
    pub status: PayoutStatus,
    pub raw: Option<serde_json::Value>,
}

/// Outcome of a redirect rail's callback verification.
/// This rail has no `Denied` state: the verdict is success or failure.
#[derive(Debug, Clone)]
pub struct CallbackVerdict {
    pub success: bool,
    /// Provider reason code on failure (e.g. "canceled_by_user", "code_-53")
    pub reason: Option<String>,
    /// Provider settlement reference on success
    pub ref_id: Option<String>,
}

impl CallbackVerdict {
    pub fn status(&self) -> PayoutStatus {
        if self.success {
            PayoutStatus::Success
        } else {
            PayoutStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!PayoutStatus::Pending.is_terminal());
        assert!(PayoutStatus::Success.is_terminal());
        assert!(PayoutStatus::Denied.is_terminal());
        assert!(PayoutStatus::Failed.is_terminal());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(PayoutMethod::parse("PayPal"), Some(PayoutMethod::Paypal));
        assert_eq!(PayoutMethod::parse("bank"), Some(PayoutMethod::Bank));
        assert_eq!(PayoutMethod::parse("venmo"), None);
    }

    #[test]
    fn test_idempotency_key_ignores_note() {
        let base = PayoutRequest {
            user_id: "u1".into(),
            amount: Price::new(50.0, Currency::USD),
            destination: PayoutDestination::Paypal {
                email: "a@b.io".into(),
            },
            note: None,
            idempotency_token: Some("tok-1".into()),
        };
        let mut with_note = base.clone();
        with_note.note = Some("weekly payout".into());

        assert_eq!(base.idempotency_key(), with_note.idempotency_key());
    }

    #[test]
    fn test_payout_from_submission_stamps_both_timestamps() {
        let request = PayoutRequest {
            user_id: "u1".into(),
            amount: Price::new(10.0, Currency::USD),
            destination: PayoutDestination::Paypal {
                email: "a@b.io".into(),
            },
            note: None,
            idempotency_token: None,
        };
        let receipt = SubmitReceipt {
            provider_reference: "BATCH-1".into(),
            initial_status: PayoutStatus::Pending,
            redirect_url: None,
            raw: None,
        };

        let payout = Payout::from_submission(&request, &receipt);
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(payout.created_at, payout.updated_at);
        assert_eq!(payout.provider_reference, "BATCH-1");
    }
}
