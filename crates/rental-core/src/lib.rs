//! # rental-core
//!
//! Core types and traits for the event-rental storefront.
//!
//! This crate provides:
//! - `CartLedger` and `CartLineItem` for the rental cart and its totals
//! - `KeyValueStorage` adapters and `CartStore` for write-through persistence
//! - `CheckoutSequencer` for the three-step checkout
//! - `RentalBackend` trait for the remote rental API
//! - `RentalError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use rental_core::{AddRequest, CartStore, CheckoutSequencer, MemoryStorage, RentalItem};
//! use rust_decimal::Decimal;
//!
//! let mut store = CartStore::open(MemoryStorage::new());
//! let silla = RentalItem::product(1, "Silla Tiffany Blanca", Decimal::from(15_000));
//! store.add_item(silla, AddRequest::new(10, 3))?;
//!
//! let mut checkout = CheckoutSequencer::begin(store.ledger(), true)?;
//! checkout.load_cards(&backend).await?;
//! checkout.set_event_details(details)?;
//! checkout.advance()?;
//! let payment = checkout.submit(&backend, &mut store).await?;
//! ```

pub mod backend;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod ledger;
pub mod money;
pub mod session;
pub mod storage;
pub mod store;

// Re-exports for convenience
pub use backend::{BoxedRentalBackend, RentalBackend};
pub use catalog::{Category, ItemKey, ItemKind, Package, Product, RentalItem, DEFAULT_IMAGE};
pub use checkout::{
    build_order_request, CheckoutPhase, CheckoutSequencer, CheckoutStep, CreatedOrder,
    EventDetails, OrderRequest, OrderSummary, PackageOrderLine, PaymentMethod, PaymentRecord,
    PaymentRequest, PaymentType, PendingCheckout, ProductOrderLine, SavedCard,
};
pub use error::{RentalError, RentalResult};
pub use ledger::{end_date_for, AddRequest, CartLedger, CartLineItem, CartTotals};
pub use money::{format_cop, round_cop, IVA_RATE};
pub use session::{AuthSession, LoginResponse, UserProfile};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, SharedStorage};
pub use store::{CartStore, CART_KEY, PENDING_CHECKOUT_KEY};
