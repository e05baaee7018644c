//! # Payrail
//!
//! Payout orchestration engine across PayPal, Stripe, and a redirect
//! gateway.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export PAYPAL_CLIENT_ID=...
//! export PAYPAL_CLIENT_SECRET=...
//! export STRIPE_SECRET_KEY=sk_test_...
//! export ZARINPAL_MERCHANT_ID=...
//! export ZARINPAL_CALLBACK_URL=http://localhost:8080/api/v1/payouts/verify
//!
//! # Run the server
//! payrail
//! ```

use payout_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Print banner
    print_banner();

    // Initialize application state
    let state = AppState::new()?;

    let addr = state.config.socket_addr();
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Payout rails: {:?}", state.manager.rails().registered());

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("🚀 Payrail starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("💸 Payouts: POST http://{}/api/v1/payouts", addr);
        info!("🔎 Verify: GET http://{}/api/v1/payouts/verify", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  💸 Payrail 💸
  ━━━━━━━━━━━━━━━━━━━━━━━
  Payout orchestration engine
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
