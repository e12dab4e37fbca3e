//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET /api/v1/catalog/categories - Active categories
///   - GET /api/v1/catalog/products?category={id} - Products, optionally by category
///   - GET /api/v1/catalog/packages - Packages
///
/// - Cart:
///   - GET    /api/v1/cart - Lines, totals and item count
///   - POST   /api/v1/cart/items - Add a product or package
///   - PATCH  /api/v1/cart/items/{kind}/{id} - Change quantity / rental days
///   - DELETE /api/v1/cart/items/{kind}/{id} - Remove a line
///   - DELETE /api/v1/cart - Empty the cart
///
/// - Checkout:
///   - POST /api/v1/checkout - Begin (or resume a pending order)
///   - GET  /api/v1/checkout - Current step
///   - PUT  /api/v1/checkout/event - Event details, then advance
///   - PUT  /api/v1/checkout/card - Select the deposit card
///   - POST /api/v1/checkout/submit - Create order and pay deposit
///   - POST /api/v1/checkout/resume - Retry a pending deposit
///
/// - Session:
///   - POST   /api/v1/session - Log in
///   - GET    /api/v1/session - Logged-in profile
///   - DELETE /api/v1/session - Log out
///
/// - History:
///   - GET /api/v1/history - Past orders and payments
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let catalog_routes = Router::new()
        .route("/categories", get(handlers::list_categories))
        .route("/products", get(handlers::list_products))
        .route("/packages", get(handlers::list_packages));

    let cart_routes = Router::new()
        .route("/", get(handlers::get_cart).delete(handlers::clear_cart))
        .route("/items", post(handlers::add_item))
        .route(
            "/items/{kind}/{id}",
            patch(handlers::update_item).delete(handlers::remove_item),
        );

    let checkout_routes = Router::new()
        .route(
            "/",
            post(handlers::begin_checkout).get(handlers::get_checkout),
        )
        .route("/event", put(handlers::set_event_details))
        .route("/card", put(handlers::select_card))
        .route("/submit", post(handlers::submit_checkout))
        .route("/resume", post(handlers::resume_checkout));

    let api_routes = Router::new()
        .nest("/catalog", catalog_routes)
        .nest("/cart", cart_routes)
        .nest("/checkout", checkout_routes)
        .route(
            "/session",
            post(handlers::login)
                .get(handlers::current_user)
                .delete(handlers::logout),
        )
        .route("/history", get(handlers::history));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
