//! # rental-wasm
//!
//! WebAssembly bindings for the event-rental cart.
//!
//! `WasmCart` keeps the cart in `window.localStorage` under the `carrito`
//! key, in the same format the storefront pages have always written, so an
//! existing browser cart loads unchanged.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCart, format_cop } from 'rental-wasm';
//!
//! await init();
//!
//! const cart = new WasmCart();
//! cart.add_product(producto, 10, 3, null);
//! cart.add_package(paquete, 1, 2, '2025-11-05');
//!
//! console.log(cart.items(), cart.total_display());
//! ```
//!
//! ## Building
//!
//! ```bash
//! wasm-pack build --target web
//! ```

use chrono::NaiveDate;
use rental_core::{
    format_cop as format_pesos, session, AddRequest, CartStore, ItemKey, ItemKind,
    KeyValueStorage, Package, Product, RentalError, RentalItem, RentalResult,
};
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

/// `window.localStorage` as a [`KeyValueStorage`]
pub struct LocalStorage {
    inner: web_sys::Storage,
}

impl LocalStorage {
    pub fn open() -> RentalResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| RentalError::Storage("no window object".to_string()))?;
        let inner = window
            .local_storage()
            .map_err(|e| RentalError::Storage(js_error(&e)))?
            .ok_or_else(|| RentalError::Storage("localStorage unavailable".to_string()))?;
        Ok(Self { inner })
    }
}

impl KeyValueStorage for LocalStorage {
    fn get(&self, key: &str) -> RentalResult<Option<String>> {
        self.inner
            .get_item(key)
            .map_err(|e| RentalError::Storage(js_error(&e)))
    }

    fn set(&self, key: &str, value: &str) -> RentalResult<()> {
        self.inner
            .set_item(key, value)
            .map_err(|e| RentalError::Storage(js_error(&e)))
    }

    fn remove(&self, key: &str) -> RentalResult<()> {
        self.inner
            .remove_item(key)
            .map_err(|e| RentalError::Storage(js_error(&e)))
    }
}

fn js_error(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

fn to_js(err: RentalError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Parse `producto`/`paquete` (or `product`/`package`) plus an id
fn item_key(kind: &str, id: i64) -> Result<ItemKey, String> {
    ItemKind::parse(kind)
        .map(|kind| ItemKey { kind, id })
        .ok_or_else(|| format!("unknown item kind: {}", kind))
}

fn parse_start(start_date: Option<String>) -> Result<Option<NaiveDate>, String> {
    start_date
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| format!("invalid start date {:?}: {}", s, e))
        })
        .transpose()
}

fn add_request(quantity: u32, rental_days: u32, start_date: Option<String>) -> Result<AddRequest, String> {
    let mut request = AddRequest::new(quantity, rental_days);
    request.start_date = parse_start(start_date)?;
    Ok(request)
}

/// Format a peso amount for display (`$ 1.041.250`)
fn cop_display(amount: f64) -> String {
    Decimal::try_from(amount)
        .map(format_pesos)
        .unwrap_or_default()
}

/// Browser cart backed by `localStorage`
#[wasm_bindgen]
pub struct WasmCart {
    store: CartStore<LocalStorage>,
}

#[wasm_bindgen]
impl WasmCart {
    /// Load the cart from `localStorage`
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmCart, JsValue> {
        let storage = LocalStorage::open().map_err(to_js)?;
        Ok(Self {
            store: CartStore::open(storage),
        })
    }

    /// Add a product record as returned by `GET /productos/{id}`
    pub fn add_product(
        &mut self,
        product: JsValue,
        quantity: u32,
        rental_days: u32,
        start_date: Option<String>,
    ) -> Result<(), JsValue> {
        let product: Product = serde_wasm_bindgen::from_value(product)
            .map_err(|e| JsValue::from_str(&format!("Invalid product: {}", e)))?;
        let request = add_request(quantity, rental_days, start_date).map_err(|e| JsValue::from_str(&e))?;
        self.store
            .add_item(RentalItem::from(&product), request)
            .map_err(to_js)
    }

    /// Add a package record as returned by `GET /paquetes/{id}`
    pub fn add_package(
        &mut self,
        package: JsValue,
        quantity: u32,
        rental_days: u32,
        start_date: Option<String>,
    ) -> Result<(), JsValue> {
        let package: Package = serde_wasm_bindgen::from_value(package)
            .map_err(|e| JsValue::from_str(&format!("Invalid package: {}", e)))?;
        let request = add_request(quantity, rental_days, start_date).map_err(|e| JsValue::from_str(&e))?;
        self.store
            .add_item(RentalItem::from(&package), request)
            .map_err(to_js)
    }

    pub fn remove_item(&mut self, kind: &str, id: i64) -> Result<bool, JsValue> {
        let key = item_key(kind, id).map_err(|e| JsValue::from_str(&e))?;
        Ok(self.store.remove_item(key))
    }

    /// Zero or less removes the line
    pub fn update_quantity(&mut self, kind: &str, id: i64, quantity: i64) -> Result<bool, JsValue> {
        let key = item_key(kind, id).map_err(|e| JsValue::from_str(&e))?;
        self.store.update_quantity(key, quantity).map_err(to_js)
    }

    pub fn update_rental_days(&mut self, kind: &str, id: i64, days: i64) -> Result<bool, JsValue> {
        let key = item_key(kind, id).map_err(|e| JsValue::from_str(&e))?;
        self.store.update_rental_days(key, days).map_err(to_js)
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Cart lines, in the `localStorage` format
    pub fn items(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.store.ledger().lines())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// `{ subtotal, tax, total }` as numbers
    pub fn totals(&self) -> Result<JsValue, JsValue> {
        let totals = self.store.totals().map_err(to_js)?;
        serde_wasm_bindgen::to_value(&totals)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn item_count(&self) -> u32 {
        u32::try_from(self.store.ledger().item_count()).unwrap_or(u32::MAX)
    }

    pub fn total_display(&self) -> Result<String, JsValue> {
        let totals = self.store.totals().map_err(to_js)?;
        Ok(format_pesos(totals.total))
    }

    /// Whether a customer session token is stored
    pub fn is_authenticated(&self) -> bool {
        session::is_authenticated(self.store.storage())
    }
}

/// Format a peso amount for display
#[wasm_bindgen]
pub fn format_cop(amount: f64) -> String {
    cop_display(amount)
}

/// Log to browser console
#[wasm_bindgen]
pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
