//! # Request Handlers
//!
//! Axum request handlers for the storefront: catalog, cart, checkout,
//! session and order history.

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rental_core::{
    format_cop, session, AddRequest, CartLedger, CartLineItem, CartTotals, Category,
    CheckoutPhase, CheckoutSequencer, CheckoutStep, EventDetails, ItemKey, ItemKind,
    OrderSummary, Package, PaymentRecord, Product, RentalError, RentalResult, SavedCard,
    UserProfile,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add-to-cart request
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    /// `producto` or `paquete`
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub rental_days: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Line update request; at least one field must be present
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub rental_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SelectCardRequest {
    pub card_id: i64,
}

/// Product listing filter
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub category: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A cart line with its computed subtotal
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLineItem,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

/// Totals formatted for display
#[derive(Debug, Serialize)]
pub struct TotalsDisplay {
    pub subtotal: String,
    pub tax: String,
    pub total: String,
}

impl From<&CartTotals> for TotalsDisplay {
    fn from(totals: &CartTotals) -> Self {
        Self {
            subtotal: format_cop(totals.subtotal),
            tax: format_cop(totals.tax),
            total: format_cop(totals.total),
        }
    }
}

/// Cart response
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub item_count: u64,
    pub totals: CartTotals,
    pub display: TotalsDisplay,
}

impl CartView {
    pub fn of(ledger: &CartLedger) -> RentalResult<Self> {
        let totals = ledger.totals()?;
        let items = ledger
            .lines()
            .iter()
            .map(|line| {
                Ok(CartLineView {
                    subtotal: ledger.line_subtotal(line)?,
                    line: line.clone(),
                })
            })
            .collect::<RentalResult<Vec<_>>>()?;
        Ok(Self {
            items,
            item_count: ledger.item_count(),
            display: TotalsDisplay::from(&totals),
            totals,
        })
    }
}

/// Checkout response
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub step: CheckoutStep,
    #[serde(flatten)]
    pub phase: CheckoutPhase,
    pub event: EventDetails,
    pub cards: Vec<SavedCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_card: Option<i64>,
    pub totals: CartTotals,
    pub display: TotalsDisplay,
}

impl CheckoutView {
    pub fn of(checkout: &CheckoutSequencer, ledger: &CartLedger) -> RentalResult<Self> {
        let totals = ledger.totals()?;
        Ok(Self {
            step: checkout.step(),
            phase: checkout.phase().clone(),
            event: checkout.event().clone(),
            cards: checkout.cards().to_vec(),
            selected_card: checkout.selected_card(),
            display: TotalsDisplay::from(&totals),
            totals,
        })
    }
}

/// Orders and payments of the logged-in customer
#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub orders: Vec<OrderSummary>,
    pub payments: Vec<PaymentRecord>,
}

/// Successful submit or resume
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub payment: PaymentRecord,
    pub checkout: CheckoutView,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Set when an order exists but its payment is still owed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solicitud_id: Option<i64>,
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
            solicitud_id: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub fn rental_error_to_response(err: RentalError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    response.retryable = err.is_retryable();

    match &err {
        RentalError::PaymentPending {
            solicitud_id,
            message,
        } => {
            response.solicitud_id = Some(*solicitud_id);
            response.details = Some(message.clone());
        }
        RentalError::Backend { message, .. } => response.details = Some(message.clone()),
        _ => {}
    }

    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn cart_view(ledger: &CartLedger) -> ApiResult<Json<CartView>> {
    CartView::of(ledger).map(Json).map_err(rental_error_to_response)
}

fn checkout_view(checkout: &CheckoutSequencer, ledger: &CartLedger) -> ApiResult<CheckoutView> {
    CheckoutView::of(checkout, ledger).map_err(rental_error_to_response)
}

fn no_checkout() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("No checkout in progress", 404)),
    )
}

fn parse_key(kind: &str, id: i64) -> ApiResult<ItemKey> {
    let kind = ItemKind::parse(kind).ok_or_else(|| {
        rental_error_to_response(RentalError::InvalidRequest(format!(
            "unknown item kind: {}",
            kind
        )))
    })?;
    Ok(ItemKey { kind, id })
}

/// Saturate a client-supplied count into `u32`; the ledger raises 0 to 1
fn count(value: Option<i64>) -> u32 {
    value
        .map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "rental-storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Active categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories = state
        .backend
        .categories()
        .await
        .map_err(rental_error_to_response)?;
    Ok(Json(categories))
}

/// Products, optionally narrowed to one category
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = state
        .backend
        .products(query.category)
        .await
        .map_err(|e| {
            error!("Failed to list products: {}", e);
            rental_error_to_response(e)
        })?;
    Ok(Json(products))
}

pub async fn list_packages(State(state): State<AppState>) -> ApiResult<Json<Vec<Package>>> {
    let packages = state
        .backend
        .packages()
        .await
        .map_err(rental_error_to_response)?;
    Ok(Json(packages))
}

/// Current cart
pub async fn get_cart(State(state): State<AppState>) -> ApiResult<Json<CartView>> {
    let storefront = state.storefront.lock().await;
    cart_view(storefront.cart.ledger())
}

/// Add a product or package, merging into an existing line
#[instrument(skip(state, request), fields(kind = %request.kind, id = request.id))]
pub async fn add_item(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<(StatusCode, Json<CartView>)> {
    let key = parse_key(&request.kind, request.id)?;

    let item = state.backend.rental_item(key).await.map_err(|e| {
        error!("Failed to fetch {}: {}", key, e);
        rental_error_to_response(e)
    })?;

    let mut add = AddRequest::new(count(request.quantity), count(request.rental_days));
    add.start_date = request.start_date;
    add.end_date = request.end_date;

    let mut storefront = state.storefront.lock().await;
    storefront
        .cart
        .add_item(item, add)
        .map_err(rental_error_to_response)?;
    info!("Cart now holds {} units", storefront.cart.ledger().item_count());

    Ok((StatusCode::CREATED, cart_view(storefront.cart.ledger())?))
}

/// Change quantity and/or rental days of a line
#[instrument(skip(state, request))]
pub async fn update_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(request): Json<UpdateItemRequest>,
) -> ApiResult<Json<CartView>> {
    let key = parse_key(&kind, id)?;
    if request.quantity.is_none() && request.rental_days.is_none() {
        return Err(rental_error_to_response(RentalError::InvalidRequest(
            "quantity or rental_days is required".to_string(),
        )));
    }

    let mut storefront = state.storefront.lock().await;
    if storefront.cart.ledger().get(key).is_none() {
        return Err(rental_error_to_response(RentalError::ItemNotFound {
            key: key.to_string(),
        }));
    }

    if let Some(days) = request.rental_days {
        let applied = storefront
            .cart
            .update_rental_days(key, days)
            .map_err(rental_error_to_response)?;
        if !applied {
            warn!("Ignored rental days {} for {}", days, key);
        }
    }
    if let Some(quantity) = request.quantity {
        storefront
            .cart
            .update_quantity(key, quantity)
            .map_err(rental_error_to_response)?;
    }

    cart_view(storefront.cart.ledger())
}

/// Remove a line
pub async fn remove_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<CartView>> {
    let key = parse_key(&kind, id)?;

    let mut storefront = state.storefront.lock().await;
    if !storefront.cart.remove_item(key) {
        return Err(rental_error_to_response(RentalError::ItemNotFound {
            key: key.to_string(),
        }));
    }

    cart_view(storefront.cart.ledger())
}

/// Empty the cart
pub async fn clear_cart(State(state): State<AppState>) -> ApiResult<Json<CartView>> {
    let mut storefront = state.storefront.lock().await;
    storefront.cart.clear();
    cart_view(storefront.cart.ledger())
}

/// Start a checkout, or pick up an order still waiting for its payment
#[instrument(skip(state))]
pub async fn begin_checkout(State(state): State<AppState>) -> ApiResult<Json<CheckoutView>> {
    if !state.backend.has_credentials() {
        return Err(rental_error_to_response(RentalError::NotAuthenticated));
    }

    let mut checkout = {
        let storefront = state.storefront.lock().await;
        match storefront.cart.pending_checkout() {
            Some(pending) => {
                info!("Resuming pending order {}", pending.order.id);
                CheckoutSequencer::from_pending(pending)
            }
            None => CheckoutSequencer::begin(storefront.cart.ledger(), true)
                .map_err(rental_error_to_response)?,
        }
    };

    // Cards are fetched without holding the storefront lock
    match state.backend.list_cards().await {
        Ok(cards) => {
            checkout.use_cards(cards);
        }
        Err(e) => warn!("Could not load saved cards: {}", e),
    }

    let mut storefront = state.storefront.lock().await;
    let view = checkout_view(&checkout, storefront.cart.ledger())?;
    storefront.checkout = Some(checkout);
    Ok(Json(view))
}

/// Current checkout state
pub async fn get_checkout(State(state): State<AppState>) -> ApiResult<Json<CheckoutView>> {
    let storefront = state.storefront.lock().await;
    let checkout = storefront.checkout.as_ref().ok_or_else(no_checkout)?;
    checkout_view(checkout, storefront.cart.ledger()).map(Json)
}

/// Step one: record event details and move on to payment
#[instrument(skip(state, details))]
pub async fn set_event_details(
    State(state): State<AppState>,
    Json(details): Json<EventDetails>,
) -> ApiResult<Json<CheckoutView>> {
    let mut guard = state.storefront.lock().await;
    let storefront = &mut *guard;
    let checkout = storefront.checkout.as_mut().ok_or_else(no_checkout)?;

    checkout
        .set_event_details(details)
        .and_then(|_| checkout.advance())
        .map_err(rental_error_to_response)?;

    checkout_view(checkout, storefront.cart.ledger()).map(Json)
}

/// Step two: choose the card for the deposit
pub async fn select_card(
    State(state): State<AppState>,
    Json(request): Json<SelectCardRequest>,
) -> ApiResult<Json<CheckoutView>> {
    let mut guard = state.storefront.lock().await;
    let storefront = &mut *guard;
    let checkout = storefront.checkout.as_mut().ok_or_else(no_checkout)?;

    checkout
        .select_card(request.card_id)
        .map_err(rental_error_to_response)?;

    checkout_view(checkout, storefront.cart.ledger()).map(Json)
}

/// Create the order and register the deposit
#[instrument(skip(state))]
pub async fn submit_checkout(State(state): State<AppState>) -> ApiResult<Json<SubmitResponse>> {
    let mut guard = state.storefront.lock().await;
    let storefront = &mut *guard;
    let checkout = storefront.checkout.as_mut().ok_or_else(no_checkout)?;

    let payment = checkout
        .submit(state.backend.as_ref(), &mut storefront.cart)
        .await
        .map_err(rental_error_to_response)?;

    Ok(Json(SubmitResponse {
        payment,
        checkout: checkout_view(checkout, storefront.cart.ledger())?,
    }))
}

/// Retry the deposit of a pending order
#[instrument(skip(state))]
pub async fn resume_checkout(State(state): State<AppState>) -> ApiResult<Json<SubmitResponse>> {
    let mut guard = state.storefront.lock().await;
    let storefront = &mut *guard;
    let checkout = storefront.checkout.as_mut().ok_or_else(no_checkout)?;

    let payment = checkout
        .resume_payment(state.backend.as_ref(), &mut storefront.cart)
        .await
        .map_err(rental_error_to_response)?;

    Ok(Json(SubmitResponse {
        payment,
        checkout: checkout_view(checkout, storefront.cart.ledger())?,
    }))
}

/// Log in and keep the session in client storage
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<UserProfile>> {
    let login = state
        .backend
        .login(&request.email, &request.password)
        .await
        .map_err(rental_error_to_response)?;

    if let Err(e) = session::save_session(&state.storage, &login) {
        warn!("Session not persisted: {}", e);
    }

    Ok(Json(login.user))
}

/// Profile of the logged-in customer
pub async fn current_user(State(state): State<AppState>) -> ApiResult<Json<UserProfile>> {
    let user = state
        .backend
        .current_user()
        .await
        .map_err(rental_error_to_response)?;
    Ok(Json(user))
}

/// Past orders and payments of the logged-in customer
#[instrument(skip(state))]
pub async fn history(State(state): State<AppState>) -> ApiResult<Json<HistoryView>> {
    let (orders, payments) = tokio::try_join!(state.backend.my_orders(), state.backend.my_payments())
        .map_err(|e| {
            error!("Failed to load order history: {}", e);
            rental_error_to_response(e)
        })?;
    info!("History has {} orders and {} payments", orders.len(), payments.len());
    Ok(Json(HistoryView { orders, payments }))
}

/// Forget the session and any checkout in progress
pub async fn logout(State(state): State<AppState>) -> StatusCode {
    if let Err(e) = session::clear_session(&state.storage) {
        warn!("Failed to clear stored session: {}", e);
    }
    state.backend.set_access_token(None);
    state.storefront.lock().await.checkout = None;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400).with_details("more");
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert_eq!(err.details.as_deref(), Some("more"));
    }

    #[test]
    fn test_rental_error_conversion() {
        let (status, _json) = rental_error_to_response(RentalError::EmptyCart);
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, Json(body)) = rental_error_to_response(RentalError::PaymentPending {
            solicitud_id: 41,
            message: "pasarela no disponible".into(),
        });
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.solicitud_id, Some(41));
        assert!(body.retryable);

        let (status, _json) = rental_error_to_response(RentalError::Backend {
            status: 422,
            message: "body.monto: field required".into(),
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_count_saturates() {
        assert_eq!(count(None), 1);
        assert_eq!(count(Some(-4)), 0);
        assert_eq!(count(Some(3)), 3);
        assert_eq!(count(Some(i64::MAX)), u32::MAX);
    }
}
