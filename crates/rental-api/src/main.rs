//! # Rental Storefront
//!
//! Cart and checkout service for the event-rental store.
//!
//! ## Usage
//!
//! ```bash
//! # Point at the rental backend
//! export RENTAL_API_BASE_URL=http://localhost:8000/api/v1
//!
//! # Keep the cart across restarts
//! export RENTAL_STORAGE_DIR=var/storefront
//!
//! # Run the server
//! rental-storefront
//! ```

use rental_api::{routes, state::AppState};
use tracing::{info, warn, Level};
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

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    {
        let storefront = state.storefront.lock().await;
        let ledger = storefront.cart.ledger();
        match ledger.totals() {
            Ok(totals) => info!(
                "Cart restored: {} lines, total {}",
                ledger.len(),
                rental_core::format_cop(totals.total)
            ),
            Err(e) => warn!("Cart restored with unpriceable lines: {}", e),
        }
        if let Some(pending) = storefront.cart.pending_checkout() {
            info!("Order {} is waiting for payment", pending.order.id);
        }
    }
    info!("Backend: {}", state.backend.backend_name());

    let app = routes::create_router(state);

    info!("Storefront starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Cart: GET http://{}/api/v1/cart", addr);
        info!("Checkout: POST http://{}/api/v1/checkout", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  Rental Storefront
  ━━━━━━━━━━━━━━━━━━━━━━━
  Cart & checkout service
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
