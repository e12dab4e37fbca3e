//! # Cart Store
//!
//! Owns the session's [`CartLedger`] and writes it through a
//! [`KeyValueStorage`] adapter after every mutation. Also holds the slot
//! for a checkout whose order exists but whose payment does not.

use crate::catalog::{ItemKey, RentalItem};
use crate::checkout::PendingCheckout;
use crate::error::RentalResult;
use crate::ledger::{AddRequest, CartLedger, CartTotals};
use crate::storage::KeyValueStorage;
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Storage key of the serialized cart
pub const CART_KEY: &str = "carrito";

/// Storage key of an order awaiting its deposit payment
pub const PENDING_CHECKOUT_KEY: &str = "checkout_pendiente";

/// The cart ledger plus its persistence
#[derive(Debug)]
pub struct CartStore<S> {
    ledger: CartLedger,
    storage: S,
}

impl<S: KeyValueStorage> CartStore<S> {
    /// Load the cart from storage.
    ///
    /// Missing, unreadable or invalid data yields an empty cart.
    pub fn open(storage: S) -> Self {
        let ledger = match storage.get(CART_KEY) {
            Ok(Some(raw)) => match CartLedger::from_json(&raw) {
                Ok(ledger) => {
                    debug!("Restored cart with {} lines", ledger.len());
                    ledger
                }
                Err(e) => {
                    warn!("Discarding stored cart: {}", e);
                    CartLedger::new()
                }
            },
            Ok(None) => CartLedger::new(),
            Err(e) => {
                warn!("Cannot read stored cart: {}", e);
                CartLedger::new()
            }
        };

        Self { ledger, storage }
    }

    pub fn ledger(&self) -> &CartLedger {
        &self.ledger
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Add an item; refused only when the quote would no longer fit
    pub fn add_item(&mut self, item: RentalItem, request: AddRequest) -> RentalResult<()> {
        self.ledger.add_item(item, request)?;
        self.persist();
        Ok(())
    }

    /// Add with an explicit "today"
    pub fn add_item_on(
        &mut self,
        item: RentalItem,
        request: AddRequest,
        today: NaiveDate,
    ) -> RentalResult<()> {
        self.ledger.add_item_on(item, request, today)?;
        self.persist();
        Ok(())
    }

    pub fn remove_item(&mut self, key: ItemKey) -> bool {
        let removed = self.ledger.remove_item(key);
        self.persist();
        removed
    }

    pub fn update_quantity(&mut self, key: ItemKey, quantity: i64) -> RentalResult<bool> {
        let matched = self.ledger.update_quantity(key, quantity)?;
        self.persist();
        Ok(matched)
    }

    pub fn update_rental_days(&mut self, key: ItemKey, days: i64) -> RentalResult<bool> {
        let changed = self.ledger.update_rental_days(key, days)?;
        self.persist();
        Ok(changed)
    }

    pub fn clear(&mut self) {
        self.ledger.clear();
        self.persist();
    }

    pub fn totals(&self) -> RentalResult<CartTotals> {
        self.ledger.totals()
    }

    /// The order left waiting for its payment, if any
    pub fn pending_checkout(&self) -> Option<PendingCheckout> {
        match self.storage.get(PENDING_CHECKOUT_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(pending) => Some(pending),
                Err(e) => {
                    warn!("Discarding unreadable pending checkout: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cannot read pending checkout: {}", e);
                None
            }
        }
    }

    pub fn save_pending(&self, pending: &PendingCheckout) -> RentalResult<()> {
        self.storage
            .set(PENDING_CHECKOUT_KEY, &serde_json::to_string(pending)?)
    }

    pub fn clear_pending(&self) -> RentalResult<()> {
        self.storage.remove(PENDING_CHECKOUT_KEY)
    }

    /// Mutations never fail: a failed write is logged and the in-memory
    /// ledger stays authoritative for the session.
    fn persist(&self) {
        let result = self
            .ledger
            .to_json()
            .and_then(|json| self.storage.set(CART_KEY, &json));
        if let Err(e) = result {
            warn!("Failed to persist cart: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CreatedOrder;
    use crate::error::{RentalError, RentalResult};
    use crate::storage::MemoryStorage;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
    }

    fn silla() -> RentalItem {
        RentalItem::product(1, "Silla Tiffany Blanca", Decimal::from(15_000))
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CartStore::open(Arc::clone(&storage));

        store.add_item_on(silla(), AddRequest::new(10, 3), today()).unwrap();
        let reopened = CartStore::open(Arc::clone(&storage));
        assert_eq!(reopened.ledger(), store.ledger());

        store.update_quantity(ItemKey::product(1), 4).unwrap();
        assert_eq!(
            CartStore::open(Arc::clone(&storage))
                .ledger()
                .get(ItemKey::product(1))
                .unwrap()
                .quantity,
            4
        );

        store.clear();
        assert!(CartStore::open(Arc::clone(&storage)).ledger().is_empty());
        assert_eq!(storage.get(CART_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_missing_cart_opens_empty() {
        let store = CartStore::open(MemoryStorage::new());
        assert!(store.ledger().is_empty());
    }

    #[test]
    fn test_corrupt_cart_opens_empty() {
        for blob in ["{not json", r#"{"id":1}"#, r#"[{"id":"uno"}]"#, "null"] {
            let store = CartStore::open(MemoryStorage::new().with_entry(CART_KEY, blob));
            assert!(store.ledger().is_empty(), "blob {:?} should be discarded", blob);
        }
    }

    #[test]
    fn test_unpriceable_cart_opens_empty() {
        let blob = r#"[{"id":1,"nombre":"x","precioPorDia":1e20,"cantidad":4000000000,
            "diasRenta":4000000000,"fechaInicio":"2025-11-01","fechaFin":"2025-11-02"}]"#;
        let store = CartStore::open(MemoryStorage::new().with_entry(CART_KEY, blob));

        assert!(store.ledger().is_empty());
        assert!(store.totals().unwrap().total.is_zero());
    }

    struct ReadOnlyStorage;

    impl KeyValueStorage for ReadOnlyStorage {
        fn get(&self, _key: &str) -> RentalResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> RentalResult<()> {
            Err(RentalError::Storage("quota exceeded".into()))
        }

        fn remove(&self, _key: &str) -> RentalResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_keeps_mutation() {
        let mut store = CartStore::open(ReadOnlyStorage);
        store.add_item_on(silla(), AddRequest::default(), today()).unwrap();

        assert_eq!(store.ledger().len(), 1);
    }

    #[test]
    fn test_pending_checkout_slot() {
        let store = CartStore::open(MemoryStorage::new());
        assert!(store.pending_checkout().is_none());

        let pending = PendingCheckout {
            order: CreatedOrder {
                id: 41,
                number: Some("SOL-2025-0041".into()),
                status: Some("pendiente".into()),
                subtotal: Some(Decimal::from(875_000)),
                taxes: Some(Decimal::from(166_250)),
                total_quote: Decimal::from(1_041_250),
            },
            card_id: 7,
            card_last_digits: Some("4242".into()),
            idempotency_key: "k-1".into(),
            created_at: Utc::now(),
        };
        store.save_pending(&pending).unwrap();
        assert_eq!(store.pending_checkout(), Some(pending));

        store.clear_pending().unwrap();
        assert!(store.pending_checkout().is_none());
    }
}
