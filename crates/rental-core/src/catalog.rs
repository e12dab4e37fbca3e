//! # Catalog Types
//!
//! Catalog records as served by the rental backend, and the snapshot
//! (`RentalItem`) a cart line copies from them at add-time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Image shown for items the backend has no picture for
pub const DEFAULT_IMAGE: &str = "/images/silla.jpg";

/// Kind of rentable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// A single product (chair, table, ...)
    #[serde(rename = "producto")]
    Product,
    /// A bundle of products sold as a package
    #[serde(rename = "paquete")]
    Package,
}

impl ItemKind {
    /// Wire name used by the storefront and the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Product => "producto",
            ItemKind::Package => "paquete",
        }
    }

    /// Parse a wire name (also accepts the English names)
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "producto" | "product" => Some(ItemKind::Product),
            "paquete" | "package" => Some(ItemKind::Package),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a cart line: the catalog record it refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: ItemKind,
    pub id: i64,
}

impl ItemKey {
    pub fn product(id: i64) -> Self {
        Self {
            kind: ItemKind::Product,
            id,
        }
    }

    pub fn package(id: i64) -> Self {
        Self {
            kind: ItemKind::Package,
            id,
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "categoria_id")]
    pub id: i64,

    #[serde(rename = "nombre")]
    pub name: String,

    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "imagen_url", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
}

/// A rentable product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "producto_id")]
    pub id: i64,

    #[serde(rename = "categoria_id", default)]
    pub category_id: Option<i64>,

    #[serde(rename = "codigo_producto", default)]
    pub code: Option<String>,

    #[serde(rename = "nombre")]
    pub name: String,

    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Rental price per day
    #[serde(rename = "precio_por_dia")]
    pub price_per_day: Decimal,

    #[serde(rename = "stock_total", default)]
    pub stock_total: u32,

    #[serde(rename = "stock_disponible", default)]
    pub stock_available: u32,

    /// Backend state (`disponible`, `mantenimiento`, ...)
    #[serde(rename = "estado", default = "default_state")]
    pub state: String,

    #[serde(rename = "requiere_deposito", default)]
    pub requires_deposit: bool,

    /// Refundable deposit per unit
    #[serde(rename = "deposito_cantidad", default, skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<Decimal>,

    #[serde(rename = "imagen_url", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(rename = "categoria_nombre", default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
}

impl Product {
    /// Whether the product can currently be rented
    pub fn is_available(&self) -> bool {
        self.stock_available > 0 && self.state == "disponible"
    }
}

/// A package bundling several products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(rename = "paquete_id")]
    pub id: i64,

    #[serde(rename = "codigo_paquete", default)]
    pub code: Option<String>,

    #[serde(rename = "nombre")]
    pub name: String,

    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "precio_por_dia")]
    pub price_per_day: Decimal,

    #[serde(rename = "descuento_porcentaje", default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<Decimal>,

    #[serde(rename = "capacidad_personas", default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,

    #[serde(rename = "imagen_url", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

fn default_state() -> String {
    "disponible".to_string()
}

/// Snapshot of a catalog record, copied into the cart when added.
/// Display data and price are not kept in sync with the catalog afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalItem {
    pub key: ItemKey,
    pub name: String,
    pub code: String,
    pub image: String,
    pub unit_price_per_day: Decimal,
    /// Only meaningful for packages
    pub discount_percent: Option<Decimal>,
    pub available: bool,
    pub stock: Option<u32>,
    /// Deposit per unit (products that require one)
    pub deposit_per_unit: Option<Decimal>,
}

impl RentalItem {
    /// Minimal product snapshot, mostly useful for tests and tooling
    pub fn product(id: i64, name: impl Into<String>, price_per_day: Decimal) -> Self {
        Self {
            key: ItemKey::product(id),
            name: name.into(),
            code: format!("PROD-{}", id),
            image: DEFAULT_IMAGE.to_string(),
            unit_price_per_day: price_per_day,
            discount_percent: None,
            available: true,
            stock: None,
            deposit_per_unit: None,
        }
    }

    /// Minimal package snapshot
    pub fn package(id: i64, name: impl Into<String>, price_per_day: Decimal) -> Self {
        Self {
            key: ItemKey::package(id),
            name: name.into(),
            code: format!("PAQ-{}", id),
            image: DEFAULT_IMAGE.to_string(),
            unit_price_per_day: price_per_day,
            discount_percent: None,
            available: true,
            stock: None,
            deposit_per_unit: None,
        }
    }

    /// Builder: set the package discount
    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    /// Builder: set the display code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}

impl From<&Product> for RentalItem {
    fn from(product: &Product) -> Self {
        let deposit_per_unit = if product.requires_deposit {
            product.deposit_amount
        } else {
            None
        };

        Self {
            key: ItemKey::product(product.id),
            name: product.name.clone(),
            code: product
                .code
                .clone()
                .unwrap_or_else(|| format!("PROD-{}", product.id)),
            image: product
                .image_url
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            unit_price_per_day: product.price_per_day,
            discount_percent: None,
            available: product.is_available(),
            stock: Some(product.stock_available),
            deposit_per_unit,
        }
    }
}

impl From<&Package> for RentalItem {
    fn from(package: &Package) -> Self {
        Self {
            key: ItemKey::package(package.id),
            name: package.name.clone(),
            code: package
                .code
                .clone()
                .unwrap_or_else(|| format!("PAQ-{}", package.id)),
            image: package
                .image_url
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            unit_price_per_day: package.price_per_day,
            discount_percent: package.discount_percent.filter(|pct| *pct > Decimal::ZERO),
            available: package.active,
            stock: None,
            deposit_per_unit: None,
        }
    }
}
