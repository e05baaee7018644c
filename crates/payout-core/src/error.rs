//! # Payout Error Types
//!
//! Typed error handling for the payrail engine.
//! All engine operations return `Result<T, PayoutError>`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a single request field failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidAmount,
    InvalidEmail,
    InvalidIban,
    InvalidCardNumber,
    Required,
}

/// Per-field validation failures, collected before any provider call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, FailureKind>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, kind: FailureKind) {
        self.fields.insert(field.into(), kind);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<FailureKind> {
        self.fields.get(field).copied()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields.keys().map(|s| s.as_str()).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Core error type for all payout operations
#[derive(Debug, Error)]
pub enum PayoutError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Request failed method-specific validation; no record was created
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// No rail is registered for the requested payout method
    #[error("Unsupported payout method: {method}")]
    UnsupportedMethod { method: String },

    /// Business-rule refusal at the provider; not retried
    #[error("Provider rejected [{rail}]: {message}")]
    ProviderRejected { rail: String, message: String },

    /// Network/5xx failure communicating with the provider; transient
    #[error("Provider unavailable [{rail}]: {message}")]
    ProviderUnavailable { rail: String, message: String },

    /// The provider did not answer within the request timeout; transient
    #[error("Provider timeout [{rail}]")]
    ProviderTimeout { rail: String },

    /// Verification callback referenced an authority with no payout
    #[error("Unknown authority: {authority}")]
    UnknownAuthority { authority: String },

    /// Status query for a payout the engine does not know
    #[error("Payout not found: {id}")]
    PayoutNotFound { id: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PayoutError {
    /// Returns true if the request manager may retry this error once
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PayoutError::ProviderUnavailable { .. } | PayoutError::ProviderTimeout { .. }
        )
    }

    /// Machine-readable code for the wire (`{code, message}` error body)
    pub fn code(&self) -> &'static str {
        match self {
            PayoutError::Configuration(_) => "configuration",
            PayoutError::Validation(_) => "validation_failed",
            PayoutError::UnsupportedMethod { .. } => "unsupported_method",
            PayoutError::ProviderRejected { .. } => "provider_rejected",
            PayoutError::ProviderUnavailable { .. } => "provider_unavailable",
            PayoutError::ProviderTimeout { .. } => "provider_timeout",
            PayoutError::UnknownAuthority { .. } => "unknown_authority",
            PayoutError::PayoutNotFound { .. } => "payout_not_found",
            PayoutError::Serialization(_) => "serialization",
            PayoutError::Internal(_) => "internal",
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PayoutError::Configuration(_) => 500,
            PayoutError::Validation(_) => 422,
            PayoutError::UnsupportedMethod { .. } => 400,
            PayoutError::ProviderRejected { .. } => 502,
            PayoutError::ProviderUnavailable { .. } => 503,
            PayoutError::ProviderTimeout { .. } => 504,
            PayoutError::UnknownAuthority { .. } => 404,
            PayoutError::PayoutNotFound { .. } => 404,
            PayoutError::Serialization(_) => 500,
            PayoutError::Internal(_) => 500,
        }
    }
}

/// Result type alias for payout operations
pub type PayoutResult<T> = Result<T, PayoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(PayoutError::ProviderUnavailable {
            rail: "paypal".into(),
            message: "503".into()
        }
        .is_retryable());
        assert!(PayoutError::ProviderTimeout {
            rail: "paypal".into()
        }
        .is_retryable());
        assert!(!PayoutError::ProviderRejected {
            rail: "paypal".into(),
            message: "insufficient funds".into()
        }
        .is_retryable());
        assert!(!PayoutError::Validation(ValidationErrors::new()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        let mut errors = ValidationErrors::new();
        errors.push("amount", FailureKind::InvalidAmount);
        assert_eq!(PayoutError::Validation(errors).status_code(), 422);
        assert_eq!(
            PayoutError::UnknownAuthority {
                authority: "A0000".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            PayoutError::ProviderTimeout {
                rail: "paypal".into()
            }
            .status_code(),
            504
        );
    }

    #[test]
    fn test_validation_errors_collect() {
        let mut errors = ValidationErrors::new();
        errors.push("amount", FailureKind::InvalidAmount);
        errors.push("email", FailureKind::InvalidEmail);

        assert_eq!(errors.get("amount"), Some(FailureKind::InvalidAmount));
        assert_eq!(errors.get("iban"), None);
        assert_eq!(errors.fields.len(), 2);
    }
}
