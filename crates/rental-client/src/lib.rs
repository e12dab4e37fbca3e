//! # rental-client
//!
//! HTTP client for the event-rental backend API.
//!
//! [`HttpRentalBackend`] implements `rental_core::RentalBackend` with
//! `reqwest`, so the checkout sequencer can create orders and register
//! payments against the real backend.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rental_client::HttpRentalBackend;
//! use rental_core::{ItemKey, RentalBackend};
//!
//! // Reads RENTAL_API_BASE_URL, RENTAL_ACCESS_TOKEN, RENTAL_HTTP_TIMEOUT_SECS
//! let backend = HttpRentalBackend::from_env()?;
//!
//! backend.login("ana@example.com", "secreta").await?;
//! let silla = backend.rental_item(ItemKey::product(1)).await?;
//! let cards = backend.list_cards().await?;
//! ```

pub mod client;
pub mod config;

// Re-exports
pub use client::{extract_error_message, HttpRentalBackend};
pub use config::{BackendConfig, DEFAULT_API_BASE_URL};
