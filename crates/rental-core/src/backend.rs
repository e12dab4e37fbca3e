//! # Rental Backend Trait
//!
//! The seam between the storefront engine and the remote rental API.
//! The checkout sequencer and the storefront service only talk to the
//! backend through this trait; `rental-client` provides the HTTP
//! implementation.

use crate::catalog::{Category, ItemKey, Package, Product, RentalItem};
use crate::checkout::{
    CreatedOrder, OrderRequest, OrderSummary, PaymentRecord, PaymentRequest, SavedCard,
};
use crate::error::RentalResult;
use crate::session::{LoginResponse, UserProfile};
use async_trait::async_trait;
use std::sync::Arc;

/// Operations the storefront needs from the system of record.
#[async_trait]
pub trait RentalBackend: Send + Sync {
    /// Catalog categories.
    async fn categories(&self) -> RentalResult<Vec<Category>>;

    /// Products, optionally restricted to one category.
    async fn products(&self, category_id: Option<i64>) -> RentalResult<Vec<Product>>;

    /// Packages on offer.
    async fn packages(&self) -> RentalResult<Vec<Package>>;

    /// Fetch a product or package and snapshot it for the cart.
    async fn rental_item(&self, key: ItemKey) -> RentalResult<RentalItem>;

    /// Log a customer in. Implementations keep the returned token for
    /// subsequent authenticated calls.
    async fn login(&self, email: &str, password: &str) -> RentalResult<LoginResponse>;

    /// Profile behind the current token.
    async fn current_user(&self) -> RentalResult<UserProfile>;

    /// The logged-in customer's saved cards.
    async fn list_cards(&self) -> RentalResult<Vec<SavedCard>>;

    /// Create the order (solicitud) from a cart snapshot.
    ///
    /// # Arguments
    /// * `request` - Event data and order lines
    /// * `idempotency_key` - Stable per checkout attempt
    async fn create_order(
        &self,
        request: &OrderRequest,
        idempotency_key: &str,
    ) -> RentalResult<CreatedOrder>;

    /// Register a payment against an existing order.
    async fn register_payment(&self, request: &PaymentRequest) -> RentalResult<PaymentRecord>;

    /// Orders the logged-in customer has placed.
    async fn my_orders(&self) -> RentalResult<Vec<OrderSummary>>;

    /// Payments the logged-in customer has made.
    async fn my_payments(&self) -> RentalResult<Vec<PaymentRecord>>;

    /// Replace (or drop) the bearer token used for authenticated calls.
    fn set_access_token(&self, token: Option<String>);

    /// Whether authenticated calls can be made.
    fn has_credentials(&self) -> bool;

    /// Name used in logs.
    fn backend_name(&self) -> &'static str {
        "rental-api"
    }
}

/// Type alias for a shared backend (dynamic dispatch)
pub type BoxedRentalBackend = Arc<dyn RentalBackend>;
