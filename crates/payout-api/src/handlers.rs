//! # Request Handlers
//!
//! Axum request handlers for the payout API: create, status query, and the
//! redirect gateway's verification callback.

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use payout_core::{reconcile, Payout, PayoutError, RawPayoutRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create payout response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutResponse {
    /// Engine-side payout id
    pub payout_id: String,
    /// Current status (pending for async rails)
    pub status: String,
    /// Provider-side reference (batch id / payout id / authority)
    pub provider_reference: String,
    /// Redirect target for redirect-based rails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

/// Status query response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutStatusResponse {
    pub payout_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Set to "reconciliation_timeout" when a long-poll deadline passed
    /// with the payout still pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

impl PayoutStatusResponse {
    fn from_payout(payout: &Payout, advisory: Option<&'static str>) -> Self {
        Self {
            payout_id: payout.id.to_string(),
            status: payout.status.to_string(),
            failure_reason: payout.failure_reason.clone(),
            advisory: advisory.map(String::from),
        }
    }
}

/// Verification callback response
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub status: String,
    pub message: String,
}

/// Query parameters of the status endpoint
#[derive(Debug, Deserialize)]
pub struct StatusParams {
    /// Long-poll for up to this many seconds before answering
    #[serde(default)]
    pub wait: Option<u64>,
}

/// Query parameters the redirect gateway appends to the callback URL
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "Authority")]
    pub authority: String,
    #[serde(rename = "Status")]
    pub status: String,
}

/// Error response body: `{code, message}`, or `{errors: {field: kind}}`
/// for validation failures
pub type ErrorBody = (StatusCode, Json<serde_json::Value>);

fn payout_error_to_response(err: PayoutError) -> ErrorBody {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match &err {
        PayoutError::Validation(errors) => json!({ "errors": errors.fields }),
        other => json!({ "code": other.code(), "message": other.to_string() }),
    };
    (status, Json(body))
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "payrail",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a payout
#[instrument(skip(state, request), fields(method = request.payout_method.as_deref().unwrap_or("?")))]
pub async fn create_payout(
    State(state): State<AppState>,
    Json(request): Json<RawPayoutRequest>,
) -> Result<Json<CreatePayoutResponse>, ErrorBody> {
    let ticket = state.manager.create_payout(request).await.map_err(|e| {
        error!("Failed to create payout: {}", e);
        payout_error_to_response(e)
    })?;

    info!("Created payout: {}", ticket.payout.id);

    Ok(Json(CreatePayoutResponse {
        payout_id: ticket.payout.id.to_string(),
        status: ticket.payout.status.to_string(),
        provider_reference: ticket.payout.provider_reference.clone(),
        payment_url: ticket.redirect_url,
    }))
}

/// Query payout status by id or provider reference.
///
/// For a pending payout on a polling rail this refreshes from the provider
/// (one poll, or a bounded loop with `?wait=N`), which is how a polling
/// client drives reconciliation forward.
#[instrument(skip(state))]
pub async fn payout_status(
    State(state): State<AppState>,
    Path(id_or_reference): Path<String>,
    Query(params): Query<StatusParams>,
) -> Result<Json<PayoutStatusResponse>, ErrorBody> {
    let payout = state
        .manager
        .find_payout(&id_or_reference)
        .await
        .map_err(payout_error_to_response)?;

    if payout.is_terminal() {
        return Ok(Json(PayoutStatusResponse::from_payout(&payout, None)));
    }

    let rail = match state.manager.rails().get(payout.method) {
        Some(rail) if rail.supports_status_polling() => rail.clone(),
        // redirect rails settle via callback, nothing to poll
        _ => return Ok(Json(PayoutStatusResponse::from_payout(&payout, None))),
    };

    match params.wait {
        None => {
            let refreshed = reconcile::refresh_status(state.manager.store(), &rail, payout.id)
                .await
                .map_err(payout_error_to_response)?;
            Ok(Json(PayoutStatusResponse::from_payout(&refreshed, None)))
        }
        Some(wait_secs) => {
            let deadline = std::time::Duration::from_secs(wait_secs)
                .min(state.reconcile.deadline);
            let policy = state.reconcile.with_deadline(deadline);

            let outcome =
                reconcile::reconcile(state.manager.store(), &rail, payout.id, &policy)
                    .await
                    .map_err(payout_error_to_response)?;

            let advisory = outcome.timed_out().then_some("reconciliation_timeout");
            Ok(Json(PayoutStatusResponse::from_payout(
                outcome.payout(),
                advisory,
            )))
        }
    }
}

/// Redirect gateway verification callback
#[instrument(skip(state, params), fields(authority = %params.authority))]
pub async fn verify_payout(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<VerifyResponse>, ErrorBody> {
    let verification = state
        .verifier
        .verify(&params.authority, &params.status)
        .await
        .map_err(|e| {
            error!("Verification failed: {}", e);
            payout_error_to_response(e)
        })?;

    info!(
        "Verified payout {}: {}",
        verification.payout.id,
        verification.status()
    );

    Ok(Json(VerifyResponse {
        status: verification.status().to_string(),
        message: verification.message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use payout_core::{FailureKind, ValidationErrors};

    #[test]
    fn test_validation_error_body() {
        let mut errors = ValidationErrors::new();
        errors.push("amount", FailureKind::InvalidAmount);
        errors.push("email", FailureKind::Required);

        let (status, Json(body)) = payout_error_to_response(PayoutError::Validation(errors));

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["amount"], "InvalidAmount");
        assert_eq!(body["errors"]["email"], "Required");
    }

    #[test]
    fn test_provider_error_body() {
        let err = PayoutError::ProviderUnavailable {
            rail: "paypal".into(),
            message: "503".into(),
        };
        let (status, Json(body)) = payout_error_to_response(err);

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "provider_unavailable");
        assert!(body["message"].as_str().unwrap().contains("paypal"));
    }

    #[test]
    fn test_unknown_authority_is_404() {
        let err = PayoutError::UnknownAuthority {
            authority: "A0000".into(),
        };
        let (status, _) = payout_error_to_response(err);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
