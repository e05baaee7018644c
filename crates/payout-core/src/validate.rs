//! # Request Validation
//!
//! Pure validators for payout request fields, plus the boundary function
//! that resolves the flat wire shape into a typed [`PayoutDestination`].
//!
//! Validation runs before any provider call. On failure the caller gets the
//! full field → kind map and the engine performs no side effect.

use crate::error::{FailureKind, ValidationErrors};
use crate::money::{Currency, Price};
use crate::payout::{PayoutDestination, PayoutMethod, PayoutRequest, RawPayoutRequest};

/// Tunable validation thresholds
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    /// Amounts must be strictly greater than this
    pub min_amount: f64,
    /// Minimum recipient name length after trimming
    pub min_name_len: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_amount: 0.0,
            min_name_len: 2,
        }
    }
}

/// Valid iff parseable as a finite number strictly greater than `min`
pub fn is_valid_amount(amount: f64, min: f64) -> bool {
    amount.is_finite() && amount > min
}

/// RFC-light email check: `local@domain.tld`, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let (local, domain) = match (parts.next(), parts.next()) {
        (Some(l), Some(d)) => (l, d),
        _ => return false,
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // domain needs a non-empty label on each side of a dot
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Strip whitespace and uppercase an IBAN for validation and submission
pub fn clean_iban(iban: &str) -> String {
    iban.split_whitespace().collect::<String>().to_uppercase()
}

/// Format-only IBAN check: cleaned value must be 15-34 alphanumerics.
/// No mod-97 checksum is performed.
pub fn is_valid_iban(iban: &str) -> bool {
    let cleaned = clean_iban(iban);
    (15..=34).contains(&cleaned.len())
        && cleaned.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Strip spaces and dashes from a card number
pub fn clean_card_number(card_number: &str) -> String {
    card_number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Card number check: 13-19 digits passing the Luhn checksum
pub fn is_valid_card_number(card_number: &str) -> bool {
    let cleaned = clean_card_number(card_number);
    if !(13..=19).contains(&cleaned.len()) || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    // Luhn: right to left, double every second digit, subtract 9 above 9
    let mut sum = 0u32;
    let mut double = false;
    for c in cleaned.chars().rev() {
        let mut digit = c.to_digit(10).unwrap_or(0);
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
    }
    sum % 10 == 0
}

/// Non-empty after trimming, at least `min_len` characters
pub fn is_valid_name(name: &str, min_len: usize) -> bool {
    name.trim().len() >= min_len.max(1)
}

/// Group a cleaned card number into 4-digit chunks for display.
/// Display only: submission always uses the unformatted value.
pub fn format_card_number(card_number: &str) -> String {
    chunk4(&clean_card_number(card_number))
}

/// Group a cleaned IBAN into 4-character chunks for display.
/// Display only: submission always uses the unformatted value.
pub fn format_iban(iban: &str) -> String {
    chunk4(&clean_iban(iban))
}

fn chunk4(cleaned: &str) -> String {
    cleaned
        .as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Validate a raw request against the method-required-field matrix and
/// resolve it into a normalized [`PayoutRequest`].
///
/// | method | required fields |
/// |---|---|
/// | paypal | amount, email |
/// | bank | amount, iban, recipientName |
/// | card | amount, cardNumber, recipientName |
///
/// Fields belonging to other methods are ignored. All failures are
/// collected; the request is rejected as a whole.
pub fn validate(
    raw: &RawPayoutRequest,
    policy: &ValidationPolicy,
) -> Result<PayoutRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let user_id = match raw.user_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            errors.push("userId", FailureKind::Required);
            String::new()
        }
    };

    let method = match raw.payout_method.as_deref().and_then(PayoutMethod::parse) {
        Some(m) => m,
        None => {
            errors.push("payoutMethod", FailureKind::Required);
            // Cannot resolve a destination without a method
            return Err(errors);
        }
    };

    let currency = match raw.currency.as_deref() {
        None => Currency::default(),
        Some(code) => match Currency::parse(code) {
            Some(c) => c,
            None => {
                errors.push("currency", FailureKind::Required);
                Currency::default()
            }
        },
    };

    let amount = raw.amount.unwrap_or(f64::NAN);
    if !is_valid_amount(amount, policy.min_amount) {
        errors.push("amount", FailureKind::InvalidAmount);
    }

    let destination = match method {
        PayoutMethod::Paypal => match raw.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => {
                if !is_valid_email(email) {
                    errors.push("email", FailureKind::InvalidEmail);
                }
                Some(PayoutDestination::Paypal {
                    email: email.to_string(),
                })
            }
            _ => {
                errors.push("email", FailureKind::Required);
                None
            }
        },
        PayoutMethod::Bank => {
            let iban = match raw.iban.as_deref().map(str::trim) {
                Some(iban) if !iban.is_empty() => {
                    if !is_valid_iban(iban) {
                        errors.push("iban", FailureKind::InvalidIban);
                    }
                    Some(clean_iban(iban))
                }
                _ => {
                    errors.push("iban", FailureKind::Required);
                    None
                }
            };
            let name = required_name(raw.recipient_name.as_deref(), policy, &mut errors);
            match (iban, name) {
                (Some(iban), Some(recipient_name)) => Some(PayoutDestination::Bank {
                    iban,
                    recipient_name,
                }),
                _ => None,
            }
        }
        PayoutMethod::Card => {
            let card = match raw.card_number.as_deref().map(str::trim) {
                Some(card) if !card.is_empty() => {
                    if !is_valid_card_number(card) {
                        errors.push("cardNumber", FailureKind::InvalidCardNumber);
                    }
                    Some(clean_card_number(card))
                }
                _ => {
                    errors.push("cardNumber", FailureKind::Required);
                    None
                }
            };
            let name = required_name(raw.recipient_name.as_deref(), policy, &mut errors);
            match (card, name) {
                (Some(card_number), Some(recipient_name)) => Some(PayoutDestination::Card {
                    card_number,
                    recipient_name,
                }),
                _ => None,
            }
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    // destination is Some here: every None path pushed an error above
    let destination =
        destination.ok_or_else(ValidationErrors::new)?;

    Ok(PayoutRequest {
        user_id,
        amount: Price::new(amount, currency),
        destination,
        note: raw.note.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        idempotency_token: raw.idempotency_key.clone(),
    })
}

fn required_name(
    name: Option<&str>,
    policy: &ValidationPolicy,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => {
            if !is_valid_name(name, policy.min_name_len) {
                errors.push("recipientName", FailureKind::Required);
            }
            Some(name.to_string())
        }
        _ => {
            errors.push("recipientName", FailureKind::Required);
            None
        }
    }
}
