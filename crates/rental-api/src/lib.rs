//! # rental-api
//!
//! Storefront HTTP service for the event-rental cart and checkout.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for the cart, the three-step checkout and the session
//! - Persistence of client state through `rental-core` storage adapters
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/cart` | Cart lines and totals |
//! | POST | `/api/v1/cart/items` | Add product or package |
//! | PATCH | `/api/v1/cart/items/{kind}/{id}` | Update a line |
//! | DELETE | `/api/v1/cart/items/{kind}/{id}` | Remove a line |
//! | DELETE | `/api/v1/cart` | Empty the cart |
//! | POST | `/api/v1/checkout` | Begin checkout |
//! | GET | `/api/v1/checkout` | Checkout state |
//! | PUT | `/api/v1/checkout/event` | Event details |
//! | PUT | `/api/v1/checkout/card` | Select card |
//! | POST | `/api/v1/checkout/submit` | Create order and pay deposit |
//! | POST | `/api/v1/checkout/resume` | Retry deposit |
//! | POST | `/api/v1/session` | Log in |
//! | DELETE | `/api/v1/session` | Log out |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppState, StorefrontConfig};
