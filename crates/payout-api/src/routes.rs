//! # Routes
//!
//! Axum router configuration for the payout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - POST /api/v1/payouts                 - Create a payout
/// - GET  /api/v1/payouts/verify          - Redirect gateway callback
///                                          (?Authority=..&Status=..)
/// - GET  /api/v1/payouts/{id}            - Payout status by id or provider
///                                          reference (?wait=N long-polls)
/// - GET  /health                         - Health check
pub fn create_router(state: AppState) -> Router {
    // CORS: the payout form may be served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/payouts", post(handlers::create_payout))
        .route("/payouts/verify", get(handlers::verify_payout))
        .route("/payouts/{id}", get(handlers::payout_status));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppConfig, EngineSettings};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use payout_core::{
        BoxedPayoutRail, CallbackVerdict, InMemoryPayoutStore, PayoutDestination, PayoutMethod,
        PayoutRail, PayoutRequest, PayoutResult, PayoutStatus, Price, RailSelector, RailStatus,
        SharedPayoutStore, SubmitReceipt,
    };
    use serde_json::json;
    use std::sync::Arc;

    /// Deterministic rail standing in for all three providers
    struct StubRail {
        name: &'static str,
        redirect: bool,
        polling: bool,
    }

    #[async_trait]
    impl PayoutRail for StubRail {
        async fn submit(&self, request: &PayoutRequest) -> PayoutResult<SubmitReceipt> {
            let reference = match &request.destination {
                PayoutDestination::Bank { .. } => "A000-STUB".to_string(),
                _ => format!("{}-STUB", self.name.to_uppercase()),
            };
            Ok(SubmitReceipt {
                provider_reference: reference.clone(),
                initial_status: if self.redirect || self.polling {
                    PayoutStatus::Pending
                } else {
                    PayoutStatus::Success
                },
                redirect_url: self
                    .redirect
                    .then(|| format!("https://gateway.test/StartPay/{}", reference)),
                raw: None,
            })
        }

        async fn check_status(&self, _reference: &str) -> PayoutResult<RailStatus> {
            Ok(RailStatus {
                status: PayoutStatus::Success,
                raw: None,
            })
        }

        async fn verify_callback(
            &self,
            _authority: &str,
            callback_status: &str,
            _amount: &Price,
        ) -> PayoutResult<CallbackVerdict> {
            if callback_status == "OK" {
                Ok(CallbackVerdict {
                    success: true,
                    reason: None,
                    ref_id: Some("999".into()),
                })
            } else {
                Ok(CallbackVerdict {
                    success: false,
                    reason: Some("canceled_by_user".into()),
                    ref_id: None,
                })
            }
        }

        fn rail_name(&self) -> &'static str {
            self.name
        }

        fn supports_status_polling(&self) -> bool {
            self.polling
        }

        fn supports_callback_verification(&self) -> bool {
            self.redirect
        }
    }

    fn test_server() -> TestServer {
        let rails = RailSelector::new()
            .with_rail(
                PayoutMethod::Paypal,
                Arc::new(StubRail {
                    name: "paypal",
                    redirect: false,
                    polling: true,
                }) as BoxedPayoutRail,
            )
            .with_rail(
                PayoutMethod::Card,
                Arc::new(StubRail {
                    name: "stripe",
                    redirect: false,
                    polling: false,
                }) as BoxedPayoutRail,
            )
            .with_rail(
                PayoutMethod::Bank,
                Arc::new(StubRail {
                    name: "zarinpal",
                    redirect: true,
                    polling: false,
                }) as BoxedPayoutRail,
            );
        let store: SharedPayoutStore = Arc::new(InMemoryPayoutStore::new());
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
        };
        let state = AppState::with_parts(rails, store, EngineSettings::default(), config);
        TestServer::new(create_router(state)).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["service"], "payrail");
    }

    #[tokio::test]
    async fn test_create_card_payout_resolves_synchronously() {
        let server = test_server();

        let response = server
            .post("/api/v1/payouts")
            .json(&json!({
                "userId": "user-1",
                "amount": 50.0,
                "currency": "usd",
                "payoutMethod": "card",
                "cardNumber": "4532015112830366",
                "recipientName": "Jane Doe"
            }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "success");
        assert_eq!(body["providerReference"], "STRIPE-STUB");
    }

    #[tokio::test]
    async fn test_create_payout_validation_errors() {
        let server = test_server();

        let response = server
            .post("/api/v1/payouts")
            .json(&json!({
                "userId": "user-1",
                "amount": 0,
                "payoutMethod": "bank",
                "iban": "DE89370400440532013000",
                "recipientName": "Jane Doe"
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert_eq!(body["errors"]["amount"], "InvalidAmount");
    }

    #[tokio::test]
    async fn test_paypal_payout_status_refresh() {
        let server = test_server();

        let created = server
            .post("/api/v1/payouts")
            .json(&json!({
                "userId": "user-1",
                "amount": 25.0,
                "payoutMethod": "paypal",
                "email": "jane@example.com"
            }))
            .await;
        created.assert_status_ok();
        let created: serde_json::Value = created.json();
        assert_eq!(created["status"], "pending");

        // the status endpoint polls the rail and applies the terminal state
        let status = server
            .get(&format!("/api/v1/payouts/{}", created["payoutId"].as_str().unwrap()))
            .await;
        status.assert_status_ok();
        let status: serde_json::Value = status.json();
        assert_eq!(status["status"], "success");
    }

    #[tokio::test]
    async fn test_redirect_flow_end_to_end() {
        let server = test_server();

        let created = server
            .post("/api/v1/payouts")
            .json(&json!({
                "userId": "user-1",
                "amount": 1500.0,
                "currency": "irr",
                "payoutMethod": "bank",
                "iban": "IR062960000000100324200001",
                "recipientName": "Jane Doe"
            }))
            .await;
        created.assert_status_ok();
        let created: serde_json::Value = created.json();
        assert_eq!(created["status"], "pending");
        assert!(created["paymentUrl"].as_str().unwrap().contains("StartPay"));

        // gateway sends the user back with Authority + Status
        let verified = server
            .get("/api/v1/payouts/verify")
            .add_query_param("Authority", "A000-STUB")
            .add_query_param("Status", "OK")
            .await;
        verified.assert_status_ok();
        let verified: serde_json::Value = verified.json();
        assert_eq!(verified["status"], "success");

        // a resent callback reads the settled status idempotently
        let replay = server
            .get("/api/v1/payouts/verify")
            .add_query_param("Authority", "A000-STUB")
            .add_query_param("Status", "OK")
            .await;
        replay.assert_status_ok();
        let replay: serde_json::Value = replay.json();
        assert_eq!(replay["status"], "success");
    }

    #[tokio::test]
    async fn test_verify_unknown_authority_is_404() {
        let server = test_server();

        let response = server
            .get("/api/v1/payouts/verify")
            .add_query_param("Authority", "A-MISSING")
            .add_query_param("Status", "OK")
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "unknown_authority");
    }

    #[tokio::test]
    async fn test_status_unknown_payout_is_404() {
        let server = test_server();
        let response = server.get("/api/v1/payouts/does-not-exist").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
