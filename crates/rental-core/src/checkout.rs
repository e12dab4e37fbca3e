//! # Checkout
//!
//! Three-step checkout (event details → payment method → confirmation)
//! and the order/payment records exchanged with the backend.
//!
//! Submitting is a two-phase operation:
//!
//! ```text
//!  PaymentMethod ──create_order──▶ PendingPayment ──register_payment──▶ Confirmed
//!       │                              │   ▲
//!       └─ error: stay, nothing sent   │   └─ resume_payment (same or later session)
//!                                      └─ error: order kept, PaymentPending returned
//! ```
//!
//! The pending order is written to client storage as soon as it exists, so
//! a failed deposit can be retried later instead of leaving an orphaned
//! order behind.

use crate::backend::RentalBackend;
use crate::catalog::ItemKind;
use crate::error::{RentalError, RentalResult};
use crate::ledger::CartLedger;
use crate::storage::KeyValueStorage;
use crate::store::CartStore;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// =============================================================================
// Order & payment records
// =============================================================================

/// Product line of an order request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOrderLine {
    #[serde(rename = "producto_id")]
    pub product_id: i64,

    #[serde(rename = "cantidad_solicitada")]
    pub quantity: u32,

    #[serde(rename = "precio_unitario", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,

    #[serde(rename = "dias_renta")]
    pub rental_days: u32,

    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,

    #[serde(rename = "deposito_unitario", with = "rust_decimal::serde::float")]
    pub deposit_per_unit: Decimal,

    #[serde(rename = "deposito_total", with = "rust_decimal::serde::float")]
    pub deposit_total: Decimal,
}

/// Package line of an order request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageOrderLine {
    #[serde(rename = "paquete_id")]
    pub package_id: i64,

    #[serde(rename = "cantidad_solicitada")]
    pub quantity: u32,

    #[serde(rename = "precio_unitario", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,

    #[serde(rename = "dias_renta")]
    pub rental_days: u32,

    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

/// Body of the create-order (solicitud) call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(rename = "fecha_evento_inicio")]
    pub event_start: NaiveDate,

    #[serde(rename = "fecha_evento_fin")]
    pub event_end: NaiveDate,

    #[serde(rename = "direccion_evento")]
    pub address: String,

    #[serde(rename = "tipo_evento")]
    pub event_type: String,

    #[serde(rename = "num_personas_estimado")]
    pub estimated_guests: u32,

    #[serde(rename = "observaciones_cliente")]
    pub notes: String,

    #[serde(rename = "productos")]
    pub products: Vec<ProductOrderLine>,

    #[serde(rename = "paquetes")]
    pub packages: Vec<PackageOrderLine>,
}

/// Order as acknowledged by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedOrder {
    #[serde(rename = "solicitud_id")]
    pub id: i64,

    #[serde(rename = "numero_solicitud", default)]
    pub number: Option<String>,

    #[serde(rename = "estado", default)]
    pub status: Option<String>,

    #[serde(default)]
    pub subtotal: Option<Decimal>,

    #[serde(rename = "impuestos", default)]
    pub taxes: Option<Decimal>,

    /// Quote total computed by the backend; the deposit charges this amount
    #[serde(rename = "total_cotizacion")]
    pub total_quote: Decimal,
}

/// A past order as listed in the customer's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(rename = "solicitud_id")]
    pub id: i64,

    #[serde(rename = "numero_solicitud")]
    pub number: String,

    #[serde(rename = "fecha_evento_inicio", default)]
    pub event_start: Option<NaiveDate>,

    #[serde(rename = "fecha_evento_fin", default)]
    pub event_end: Option<NaiveDate>,

    #[serde(rename = "tipo_evento", default)]
    pub event_type: Option<String>,

    #[serde(rename = "num_personas_estimado", default)]
    pub estimated_guests: Option<u32>,

    #[serde(rename = "estado")]
    pub status: String,

    #[serde(rename = "total_cotizacion")]
    pub total_quote: Decimal,

    #[serde(rename = "fecha_solicitud", default)]
    pub requested_at: Option<String>,

    #[serde(rename = "total_productos", default)]
    pub product_lines: u32,

    #[serde(rename = "total_paquetes", default)]
    pub package_lines: u32,
}

/// Kind of payment registered against an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    /// Advance paid right after the order is created
    #[serde(rename = "anticipo")]
    Advance,
    #[serde(rename = "deposito")]
    SecurityDeposit,
    #[serde(rename = "pago_final")]
    FinalPayment,
    #[serde(rename = "devolucion_deposito")]
    DepositRefund,
}

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "efectivo")]
    Cash,
    #[serde(rename = "transferencia")]
    Transfer,
    #[serde(rename = "tarjeta")]
    Card,
    #[serde(rename = "paypal")]
    Paypal,
}

/// Body of the register-payment call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "solicitud_id")]
    pub order_id: i64,

    #[serde(rename = "tipo_pago")]
    pub payment_type: PaymentType,

    #[serde(rename = "metodo_pago")]
    pub method: PaymentMethod,

    #[serde(rename = "monto", with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    #[serde(rename = "observaciones", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(rename = "tarjeta_id", skip_serializing_if = "Option::is_none")]
    pub card_id: Option<i64>,
}

/// Payment confirmation from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(rename = "pago_id")]
    pub id: i64,

    #[serde(rename = "solicitud_id")]
    pub order_id: i64,

    #[serde(rename = "numero_transaccion", default)]
    pub transaction_number: Option<String>,

    #[serde(rename = "estado_pago", default)]
    pub status: Option<String>,

    #[serde(rename = "monto")]
    pub amount: Decimal,

    #[serde(rename = "fecha_pago", default)]
    pub paid_at: Option<String>,
}

/// A card saved by the customer (only the last digits are ever exposed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCard {
    #[serde(rename = "tarjeta_id")]
    pub id: i64,

    /// `credito` or `debito`
    #[serde(rename = "tipo_tarjeta", default)]
    pub card_type: String,

    #[serde(rename = "marca", default)]
    pub brand: String,

    #[serde(rename = "ultimos_digitos")]
    pub last_digits: String,

    #[serde(rename = "nombre_titular", default)]
    pub holder_name: String,

    #[serde(rename = "mes_expiracion", default)]
    pub expiry_month: u8,

    #[serde(rename = "anio_expiracion", default)]
    pub expiry_year: u16,

    #[serde(rename = "es_predeterminada", default)]
    pub is_default: bool,

    #[serde(rename = "activa", default = "default_true")]
    pub active: bool,

    #[serde(rename = "esta_expirada", default)]
    pub expired: bool,
}

fn default_true() -> bool {
    true
}

/// Event data collected in step one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDetails {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub address: String,
    /// Boda, Cumpleaños, Corporativo, Graduación, Otro
    pub event_type: String,
    pub estimated_guests: Option<u32>,
    pub notes: String,
}

impl EventDetails {
    /// Step-one gating: both dates present, end not before start
    pub fn validate(&self) -> RentalResult<(NaiveDate, NaiveDate)> {
        let (Some(start), Some(end)) = (self.start_date, self.end_date) else {
            return Err(RentalError::Validation(
                "event start and end dates are required".to_string(),
            ));
        };
        if end < start {
            return Err(RentalError::Validation(format!(
                "event ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok((start, end))
    }
}

/// Build the order request from the cart and the event data
pub fn build_order_request(ledger: &CartLedger, event: &EventDetails) -> RentalResult<OrderRequest> {
    if ledger.is_empty() {
        return Err(RentalError::EmptyCart);
    }
    let (event_start, event_end) = event.validate()?;

    let mut products = Vec::new();
    let mut packages = Vec::new();
    for line in ledger.lines() {
        match line.kind {
            ItemKind::Product => products.push(ProductOrderLine {
                product_id: line.id,
                quantity: line.quantity,
                unit_price: line.unit_price_per_day,
                rental_days: line.rental_days,
                subtotal: line.subtotal()?,
                deposit_per_unit: line.deposit_per_unit.unwrap_or(Decimal::ZERO),
                deposit_total: line.deposit_total()?,
            }),
            ItemKind::Package => packages.push(PackageOrderLine {
                package_id: line.id,
                quantity: line.quantity,
                unit_price: line.unit_price_per_day,
                rental_days: line.rental_days,
                subtotal: line.subtotal()?,
            }),
        }
    }

    Ok(OrderRequest {
        event_start,
        event_end,
        address: event.address.clone(),
        event_type: event.event_type.clone(),
        estimated_guests: event.estimated_guests.unwrap_or(0),
        notes: event.notes.clone(),
        products,
        packages,
    })
}

// =============================================================================
// Sequencer
// =============================================================================

/// Visible checkout step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    EventDetails,
    PaymentMethod,
    Confirmation,
}

impl CheckoutStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::EventDetails => "event_details",
            CheckoutStep::PaymentMethod => "payment_method",
            CheckoutStep::Confirmation => "confirmation",
        }
    }
}

/// Where the checkout stands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CheckoutPhase {
    EventDetails,
    PaymentMethod,
    /// Order exists on the backend, deposit not registered yet
    PendingPayment { order: CreatedOrder },
    Confirmed {
        order: CreatedOrder,
        payment: PaymentRecord,
    },
}

impl CheckoutPhase {
    pub fn step(&self) -> CheckoutStep {
        match self {
            CheckoutPhase::EventDetails => CheckoutStep::EventDetails,
            CheckoutPhase::PaymentMethod | CheckoutPhase::PendingPayment { .. } => {
                CheckoutStep::PaymentMethod
            }
            CheckoutPhase::Confirmed { .. } => CheckoutStep::Confirmation,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CheckoutPhase::EventDetails => "event_details",
            CheckoutPhase::PaymentMethod => "payment_method",
            CheckoutPhase::PendingPayment { .. } => "pending_payment",
            CheckoutPhase::Confirmed { .. } => "confirmed",
        }
    }
}

/// Order created, payment still owed. Persisted so it survives restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub order: CreatedOrder,
    pub card_id: i64,
    #[serde(default)]
    pub card_last_digits: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Drives one checkout attempt
#[derive(Debug, Clone)]
pub struct CheckoutSequencer {
    phase: CheckoutPhase,
    event: EventDetails,
    cards: Vec<SavedCard>,
    selected_card: Option<i64>,
    idempotency_key: String,
}

impl CheckoutSequencer {
    /// Start a checkout for the current cart.
    pub fn begin(ledger: &CartLedger, authenticated: bool) -> RentalResult<Self> {
        if !authenticated {
            return Err(RentalError::NotAuthenticated);
        }
        if ledger.is_empty() {
            return Err(RentalError::EmptyCart);
        }

        Ok(Self {
            phase: CheckoutPhase::EventDetails,
            event: EventDetails::default(),
            cards: Vec::new(),
            selected_card: None,
            idempotency_key: Uuid::new_v4().to_string(),
        })
    }

    /// Pick up an order whose deposit was never registered.
    pub fn from_pending(pending: PendingCheckout) -> Self {
        let cards = pending
            .card_last_digits
            .clone()
            .map(|last_digits| {
                vec![SavedCard {
                    id: pending.card_id,
                    card_type: String::new(),
                    brand: String::new(),
                    last_digits,
                    holder_name: String::new(),
                    expiry_month: 0,
                    expiry_year: 0,
                    is_default: false,
                    active: true,
                    expired: false,
                }]
            })
            .unwrap_or_default();

        Self {
            phase: CheckoutPhase::PendingPayment {
                order: pending.order,
            },
            event: EventDetails::default(),
            cards,
            selected_card: Some(pending.card_id),
            idempotency_key: pending.idempotency_key,
        }
    }

    pub fn phase(&self) -> &CheckoutPhase {
        &self.phase
    }

    pub fn step(&self) -> CheckoutStep {
        self.phase.step()
    }

    pub fn event(&self) -> &EventDetails {
        &self.event
    }

    pub fn cards(&self) -> &[SavedCard] {
        &self.cards
    }

    pub fn selected_card(&self) -> Option<i64> {
        self.selected_card
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    /// Fetch saved cards and preselect the default one.
    pub async fn load_cards(&mut self, backend: &dyn RentalBackend) -> RentalResult<&[SavedCard]> {
        let cards = backend.list_cards().await?;
        Ok(self.use_cards(cards))
    }

    /// Take cards fetched elsewhere; preselects the default one when no
    /// card is chosen yet.
    pub fn use_cards(&mut self, cards: Vec<SavedCard>) -> &[SavedCard] {
        debug!("Loaded {} saved cards", cards.len());

        if self.selected_card.is_none() {
            self.selected_card = cards.iter().find(|c| c.is_default).map(|c| c.id);
        }
        self.cards = cards;
        &self.cards
    }

    /// Replace the event data (step one only)
    pub fn set_event_details(&mut self, details: EventDetails) -> RentalResult<()> {
        self.expect_phase(&[CheckoutStep::EventDetails], false)?;
        self.event = details;
        Ok(())
    }

    /// Choose the card for the deposit
    pub fn select_card(&mut self, card_id: i64) -> RentalResult<()> {
        self.expect_phase(&[CheckoutStep::EventDetails, CheckoutStep::PaymentMethod], false)?;
        if !self.cards.iter().any(|c| c.id == card_id) {
            return Err(RentalError::InvalidRequest(format!(
                "card {} is not one of the customer's saved cards",
                card_id
            )));
        }
        self.selected_card = Some(card_id);
        Ok(())
    }

    /// Leave step one once the event data is complete
    pub fn advance(&mut self) -> RentalResult<CheckoutStep> {
        self.expect_phase(&[CheckoutStep::EventDetails], false)?;
        self.event.validate()?;
        self.phase = CheckoutPhase::PaymentMethod;
        Ok(self.step())
    }

    /// Create the order, then register the deposit.
    ///
    /// On success the cart is emptied and the checkout is `Confirmed`. If
    /// the order is created but the payment fails, the checkout stays in
    /// `PendingPayment` and [`RentalError::PaymentPending`] is returned;
    /// call [`resume_payment`](Self::resume_payment) to retry.
    #[instrument(skip_all, fields(key = %self.idempotency_key))]
    pub async fn submit<S: KeyValueStorage>(
        &mut self,
        backend: &dyn RentalBackend,
        store: &mut CartStore<S>,
    ) -> RentalResult<PaymentRecord> {
        self.expect_phase(&[CheckoutStep::PaymentMethod], false)?;
        let card_id = self.selected_card.ok_or(RentalError::NoPaymentMethod)?;

        let request = build_order_request(store.ledger(), &self.event)?;
        info!(
            "Creating order: {} product lines, {} package lines, quote={}",
            request.products.len(),
            request.packages.len(),
            store.totals()?.total
        );

        let order = backend
            .create_order(&request, &self.idempotency_key)
            .await
            .map_err(|e| {
                error!("Order creation failed: {}", e);
                e
            })?;
        info!("Order {} created, total={}", order.id, order.total_quote);

        let pending = PendingCheckout {
            order: order.clone(),
            card_id,
            card_last_digits: self.card_last_digits(card_id),
            idempotency_key: self.idempotency_key.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = store.save_pending(&pending) {
            warn!("Could not record pending order {}: {}", order.id, e);
        }
        self.phase = CheckoutPhase::PendingPayment { order };

        self.register_deposit(backend, store).await
    }

    /// Retry the deposit of an order created earlier.
    #[instrument(skip_all, fields(key = %self.idempotency_key))]
    pub async fn resume_payment<S: KeyValueStorage>(
        &mut self,
        backend: &dyn RentalBackend,
        store: &mut CartStore<S>,
    ) -> RentalResult<PaymentRecord> {
        self.expect_phase(&[CheckoutStep::PaymentMethod], true)?;
        self.register_deposit(backend, store).await
    }

    /// Payment body for the deposit of `order`
    pub fn deposit_request(&self, order: &CreatedOrder) -> RentalResult<PaymentRequest> {
        let card_id = self.selected_card.ok_or(RentalError::NoPaymentMethod)?;
        let notes = self
            .card_last_digits(card_id)
            .map(|digits| format!("Pago con tarjeta terminada en {}", digits));

        Ok(PaymentRequest {
            order_id: order.id,
            payment_type: PaymentType::Advance,
            method: PaymentMethod::Card,
            amount: order.total_quote,
            notes,
            card_id: Some(card_id),
        })
    }

    async fn register_deposit<S: KeyValueStorage>(
        &mut self,
        backend: &dyn RentalBackend,
        store: &mut CartStore<S>,
    ) -> RentalResult<PaymentRecord> {
        let CheckoutPhase::PendingPayment { order } = &self.phase else {
            return Err(RentalError::InvalidStep {
                expected: "pending_payment",
                actual: self.phase.name(),
            });
        };
        let order = order.clone();
        let request = self.deposit_request(&order)?;

        match backend.register_payment(&request).await {
            Ok(payment) => {
                info!("Deposit {} registered for order {}", payment.id, order.id);
                store.clear();
                if let Err(e) = store.clear_pending() {
                    warn!("Could not clear pending order {}: {}", order.id, e);
                }
                self.phase = CheckoutPhase::Confirmed {
                    order,
                    payment: payment.clone(),
                };
                Ok(payment)
            }
            Err(e) => {
                error!("Deposit for order {} failed: {}", order.id, e);
                let message = match e {
                    RentalError::Backend { message, .. } => message,
                    other => other.to_string(),
                };
                Err(RentalError::PaymentPending {
                    solicitud_id: order.id,
                    message,
                })
            }
        }
    }

    fn card_last_digits(&self, card_id: i64) -> Option<String> {
        self.cards
            .iter()
            .find(|c| c.id == card_id)
            .map(|c| c.last_digits.clone())
    }

    /// `pending` selects whether `PendingPayment` (true) or the plain
    /// phase of that step (false) is accepted.
    fn expect_phase(&self, steps: &[CheckoutStep], pending: bool) -> RentalResult<()> {
        let is_pending = matches!(self.phase, CheckoutPhase::PendingPayment { .. });
        let ok = steps.contains(&self.step())
            && is_pending == pending
            && !matches!(self.phase, CheckoutPhase::Confirmed { .. });
        if ok {
            Ok(())
        } else {
            let expected = match (steps.first(), pending) {
                (_, true) => "pending_payment",
                (Some(step), false) => step.as_str(),
                (None, false) => "none",
            };
            Err(RentalError::InvalidStep {
                expected,
                actual: self.phase.name(),
            })
        }
    }
}
