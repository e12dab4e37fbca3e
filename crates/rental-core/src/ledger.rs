//! # Cart Ledger
//!
//! The client-side list of what the customer intends to rent, and the
//! quote (cotización) derived from it.
//!
//! Lines are keyed by [`ItemKey`]; adding an item that is already in the
//! ledger increments its quantity instead of adding a second row.

use crate::catalog::{ItemKey, ItemKind, RentalItem, DEFAULT_IMAGE};
use crate::error::{RentalError, RentalResult};
use crate::money::IVA_RATE;
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A line in the cart.
///
/// Serialized with the field names the storefront has always written to
/// client storage, so existing carts keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Catalog id of the product or package
    pub id: i64,

    #[serde(rename = "tipo", default = "default_kind")]
    pub kind: ItemKind,

    #[serde(rename = "nombre")]
    pub name: String,

    #[serde(rename = "codigo", default)]
    pub code: String,

    #[serde(rename = "imagen", default = "default_image")]
    pub image: String,

    #[serde(rename = "precioPorDia", with = "rust_decimal::serde::float")]
    pub unit_price_per_day: Decimal,

    #[serde(rename = "cantidad")]
    pub quantity: u32,

    #[serde(rename = "diasRenta")]
    pub rental_days: u32,

    #[serde(rename = "fechaInicio")]
    pub start_date: NaiveDate,

    #[serde(rename = "fechaFin")]
    pub end_date: NaiveDate,

    /// Package discount, 0-100
    #[serde(
        rename = "descuento",
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount_percent: Option<Decimal>,

    #[serde(rename = "disponible", default = "default_available")]
    pub available: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,

    /// Deposit per unit, carried into the order for products that need one
    #[serde(
        rename = "depositoUnitario",
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deposit_per_unit: Option<Decimal>,
}

fn default_kind() -> ItemKind {
    ItemKind::Product
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_available() -> bool {
    true
}

impl CartLineItem {
    /// Build a new line from a catalog snapshot
    pub fn from_item(
        item: RentalItem,
        quantity: u32,
        rental_days: u32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Self {
        let rental_days = rental_days.max(1);
        let discount_percent = match item.key.kind {
            ItemKind::Package => item.discount_percent,
            ItemKind::Product => None,
        };

        Self {
            id: item.key.id,
            kind: item.key.kind,
            name: item.name,
            code: item.code,
            image: item.image,
            unit_price_per_day: item.unit_price_per_day,
            quantity: quantity.max(1),
            rental_days,
            start_date,
            end_date: end_date.unwrap_or_else(|| end_date_for(start_date, rental_days)),
            discount_percent,
            available: item.available,
            stock: item.stock,
            deposit_per_unit: item.deposit_per_unit,
        }
    }

    /// Key identifying this line in the ledger
    pub fn key(&self) -> ItemKey {
        ItemKey {
            kind: self.kind,
            id: self.id,
        }
    }

    /// Price before any discount: `unit_price_per_day * quantity * rental_days`
    pub fn base_amount(&self) -> RentalResult<Decimal> {
        self.unit_price_per_day
            .checked_mul(Decimal::from(self.quantity))
            .and_then(|amount| amount.checked_mul(Decimal::from(self.rental_days)))
            .ok_or_else(|| out_of_range(&self.key().to_string()))
    }

    /// Line subtotal, with the package discount applied when present
    pub fn subtotal(&self) -> RentalResult<Decimal> {
        let base = self.base_amount()?;
        match (self.kind, self.discount_percent) {
            (ItemKind::Package, Some(pct)) => base
                .checked_mul(Decimal::ONE - pct / Decimal::ONE_HUNDRED)
                .ok_or_else(|| out_of_range(&self.key().to_string())),
            _ => Ok(base),
        }
    }

    /// Deposit owed for the whole line
    pub fn deposit_total(&self) -> RentalResult<Decimal> {
        self.deposit_per_unit
            .unwrap_or(Decimal::ZERO)
            .checked_mul(Decimal::from(self.quantity))
            .ok_or_else(|| out_of_range(&self.key().to_string()))
    }

    fn validate(&self) -> RentalResult<()> {
        if self.quantity < 1 {
            return Err(RentalError::Validation(format!(
                "{}: quantity must be at least 1",
                self.key()
            )));
        }
        if self.rental_days < 1 {
            return Err(RentalError::Validation(format!(
                "{}: rental days must be at least 1",
                self.key()
            )));
        }
        if self.unit_price_per_day.is_sign_negative() {
            return Err(RentalError::Validation(format!(
                "{}: negative price",
                self.key()
            )));
        }
        if let Some(pct) = self.discount_percent {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(RentalError::Validation(format!(
                    "{}: discount {} outside 0-100",
                    self.key(),
                    pct
                )));
            }
        }
        self.subtotal()?;
        self.deposit_total()?;
        Ok(())
    }
}

fn out_of_range(what: &str) -> RentalError {
    RentalError::Validation(format!("{}: amount out of range", what))
}

/// `start + days`, saturating at the last representable date
pub fn end_date_for(start: NaiveDate, days: u32) -> NaiveDate {
    start
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Quantity, rental days and dates for a new line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRequest {
    pub quantity: u32,
    pub rental_days: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AddRequest {
    pub fn new(quantity: u32, rental_days: u32) -> Self {
        Self {
            quantity,
            rental_days,
            start_date: None,
            end_date: None,
        }
    }

    /// Builder: set the first rental day
    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Builder: set the last rental day explicitly
    pub fn ending(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }
}

impl Default for AddRequest {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Quote derived from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    /// IVA
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Ordered list of cart lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartLedger {
    lines: Vec<CartLineItem>,
}

impl CartLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a ledger from already-validated lines
    pub fn from_lines(lines: Vec<CartLineItem>) -> RentalResult<Self> {
        let mut seen = HashSet::with_capacity(lines.len());
        for line in &lines {
            line.validate()?;
            if !seen.insert(line.key()) {
                return Err(RentalError::Validation(format!(
                    "duplicated line {}",
                    line.key()
                )));
            }
        }

        let ledger = Self { lines };
        ledger.totals()?;
        Ok(ledger)
    }

    /// Parse and validate a persisted ledger
    pub fn from_json(json: &str) -> RentalResult<Self> {
        let lines: Vec<CartLineItem> = serde_json::from_str(json)?;
        Self::from_lines(lines)
    }

    /// Serialize for client storage
    pub fn to_json(&self) -> RentalResult<String> {
        Ok(serde_json::to_string(&self.lines)?)
    }

    /// Add an item, starting today (UTC) unless the request says otherwise
    pub fn add_item(&mut self, item: RentalItem, request: AddRequest) -> RentalResult<()> {
        self.add_item_on(item, request, Utc::now().date_naive())
    }

    /// Add an item with an explicit notion of "today".
    ///
    /// Refused, leaving the ledger as it was, only when the resulting quote
    /// does not fit in a decimal.
    pub fn add_item_on(
        &mut self,
        item: RentalItem,
        request: AddRequest,
        today: NaiveDate,
    ) -> RentalResult<()> {
        let quantity = request.quantity.max(1);

        if let Some(pos) = self.position(item.key) {
            let previous = self.lines[pos].quantity;
            self.lines[pos].quantity = previous.saturating_add(quantity);
            return self.keep_if_priced(|ledger| ledger.lines[pos].quantity = previous);
        }

        let start = request.start_date.unwrap_or(today);
        self.lines.push(CartLineItem::from_item(
            item,
            quantity,
            request.rental_days,
            start,
            request.end_date,
        ));
        self.keep_if_priced(|ledger| {
            ledger.lines.pop();
        })
    }

    /// Remove a line. Returns whether a line was removed.
    pub fn remove_item(&mut self, key: ItemKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.key() != key);
        self.lines.len() != before
    }

    /// Replace a line's quantity; zero or less removes the line.
    /// Returns whether a line matched.
    pub fn update_quantity(&mut self, key: ItemKey, quantity: i64) -> RentalResult<bool> {
        if quantity <= 0 {
            return Ok(self.remove_item(key));
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let Some(pos) = self.position(key) else {
            return Ok(false);
        };
        let previous = self.lines[pos].quantity;
        self.lines[pos].quantity = quantity;
        self.keep_if_priced(|ledger| ledger.lines[pos].quantity = previous)?;
        Ok(true)
    }

    /// Change the rental length and move the end date accordingly.
    /// Zero or less is ignored. Returns whether a line changed.
    pub fn update_rental_days(&mut self, key: ItemKey, days: i64) -> RentalResult<bool> {
        if days <= 0 {
            return Ok(false);
        }

        let days = u32::try_from(days).unwrap_or(u32::MAX);
        let Some(pos) = self.position(key) else {
            return Ok(false);
        };
        let previous = (self.lines[pos].rental_days, self.lines[pos].end_date);
        let line = &mut self.lines[pos];
        line.rental_days = days;
        line.end_date = end_date_for(line.start_date, days);
        self.keep_if_priced(|ledger| {
            let line = &mut ledger.lines[pos];
            (line.rental_days, line.end_date) = previous;
        })?;
        Ok(true)
    }

    /// Empty the ledger
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Subtotal of one line
    pub fn line_subtotal(&self, line: &CartLineItem) -> RentalResult<Decimal> {
        line.subtotal()
    }

    /// Subtotal, IVA and total of the whole cart
    pub fn totals(&self) -> RentalResult<CartTotals> {
        let subtotal = self.lines.iter().try_fold(Decimal::ZERO, |sum, line| {
            sum.checked_add(line.subtotal()?)
                .ok_or_else(|| out_of_range("cart subtotal"))
        })?;
        let tax = subtotal
            .checked_mul(IVA_RATE)
            .ok_or_else(|| out_of_range("cart tax"))?;
        let total = subtotal
            .checked_add(tax)
            .ok_or_else(|| out_of_range("cart total"))?;

        Ok(CartTotals {
            subtotal,
            tax,
            total,
        })
    }

    /// Total number of units in the cart
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    fn position(&self, key: ItemKey) -> Option<usize> {
        self.lines.iter().position(|l| l.key() == key)
    }

    /// Undo the last mutation when the cart can no longer be priced
    fn keep_if_priced(&mut self, undo: impl FnOnce(&mut Self)) -> RentalResult<()> {
        match self.totals() {
            Ok(_) => Ok(()),
            Err(e) => {
                undo(self);
                Err(e)
            }
        }
    }

    pub fn get(&self, key: ItemKey) -> Option<&CartLineItem> {
        self.lines.iter().find(|l| l.key() == key)
    }

    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
