//! # Rental API Client
//!
//! `reqwest` implementation of [`RentalBackend`] against the rental REST API:
//! catalog reads, login, saved cards, orders (solicitudes) and payments.

use crate::config::{auth_header, BackendConfig};
use async_trait::async_trait;
use rental_core::{
    Category, CreatedOrder, ItemKey, ItemKind, LoginResponse, OrderRequest, OrderSummary,
    Package, PaymentRecord, PaymentRequest, Product, RentalBackend, RentalError, RentalItem,
    RentalResult, SavedCard, UserProfile,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use tracing::{debug, error, info, instrument};

/// HTTP client for the rental backend
pub struct HttpRentalBackend {
    config: BackendConfig,
    client: Client,
    token: RwLock<Option<String>>,
}

impl HttpRentalBackend {
    /// Create a new client
    pub fn new(config: BackendConfig) -> RentalResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                RentalError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let token = RwLock::new(config.access_token.clone());
        Ok(Self {
            config,
            client,
            token,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> RentalResult<Self> {
        let config = BackendConfig::from_env()?;
        Self::new(config)
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    pub async fn product(&self, id: i64) -> RentalResult<Product> {
        self.get_json(&format!("/productos/{}", id), false).await
    }

    pub async fn package(&self, id: i64) -> RentalResult<Package> {
        self.get_json(&format!("/paquetes/{}", id), false).await
    }

    // -------------------------------------------------------------------------
    // Plumbing
    // -------------------------------------------------------------------------

    fn bearer(&self) -> RentalResult<String> {
        self.token
            .read()
            .ok()
            .and_then(|token| token.clone())
            .map(|token| auth_header(&token))
            .ok_or(RentalError::NotAuthenticated)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, authenticated: bool) -> RentalResult<T> {
        let mut request = self.client.get(self.config.url(path));
        if authenticated {
            request = request.header("Authorization", self.bearer()?);
        }
        self.send(request, path).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> RentalResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| RentalError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RentalError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Rental API error: path={}, status={}, body={}", path, status, body);
            return Err(RentalError::Backend {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            RentalError::Serialization(format!("Failed to parse {} response: {}", path, e))
        })
    }
}

#[async_trait]
impl RentalBackend for HttpRentalBackend {
    async fn categories(&self) -> RentalResult<Vec<Category>> {
        self.get_json("/categorias", false).await
    }

    async fn products(&self, category_id: Option<i64>) -> RentalResult<Vec<Product>> {
        match category_id {
            Some(id) => {
                self.get_json(&format!("/productos/categoria/{}", id), false)
                    .await
            }
            None => self.get_json("/productos", false).await,
        }
    }

    async fn packages(&self) -> RentalResult<Vec<Package>> {
        self.get_json("/paquetes", false).await
    }

    #[instrument(skip(self))]
    async fn rental_item(&self, key: ItemKey) -> RentalResult<RentalItem> {
        let result = match key.kind {
            ItemKind::Product => self.product(key.id).await.map(|p| RentalItem::from(&p)),
            ItemKind::Package => self.package(key.id).await.map(|p| RentalItem::from(&p)),
        };

        result.map_err(|e| match e {
            RentalError::Backend { status: 404, .. } => RentalError::ItemNotFound {
                key: key.to_string(),
            },
            other => other,
        })
    }

    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> RentalResult<LoginResponse> {
        let request = self
            .client
            .post(self.config.url("/login"))
            .json(&LoginBody { email, password });

        let login: LoginResponse = self.send(request, "/login").await?;
        info!("Logged in customer {}", login.user.id);

        self.set_access_token(Some(login.access_token.clone()));
        Ok(login)
    }

    async fn current_user(&self) -> RentalResult<UserProfile> {
        self.get_json("/me", true).await
    }

    async fn list_cards(&self) -> RentalResult<Vec<SavedCard>> {
        let list: CardList = self.get_json("/me/tarjetas", true).await?;
        debug!("Backend reports {} saved cards", list.total);
        Ok(list.tarjetas)
    }

    #[instrument(skip(self, request))]
    async fn create_order(
        &self,
        request: &OrderRequest,
        idempotency_key: &str,
    ) -> RentalResult<CreatedOrder> {
        debug!(
            "Creating order: {} products, {} packages, event {}..{}",
            request.products.len(),
            request.packages.len(),
            request.event_start,
            request.event_end
        );

        let http = self
            .client
            .post(self.config.url("/solicitudes"))
            .header("Authorization", self.bearer()?)
            .header("Idempotency-Key", idempotency_key)
            .json(request);

        let order: CreatedOrder = self.send(http, "/solicitudes").await?;
        info!(
            "Created order: id={}, number={}",
            order.id,
            order.number.as_deref().unwrap_or("-")
        );
        Ok(order)
    }

    #[instrument(skip(self, request), fields(order_id = request.order_id))]
    async fn register_payment(&self, request: &PaymentRequest) -> RentalResult<PaymentRecord> {
        let http = self
            .client
            .post(self.config.url("/pagos"))
            .header("Authorization", self.bearer()?)
            .json(request);

        let payment: PaymentRecord = self.send(http, "/pagos").await?;
        info!("Registered payment: id={}, amount={}", payment.id, payment.amount);
        Ok(payment)
    }

    /// Newest first, as the backend lists them
    async fn my_orders(&self) -> RentalResult<Vec<OrderSummary>> {
        self.get_json("/solicitudes/mis-solicitudes", true).await
    }

    async fn my_payments(&self) -> RentalResult<Vec<PaymentRecord>> {
        let list: PaymentList = self.get_json("/pagos/mis-pagos", true).await?;
        debug!("Backend reports {} payments", list.total);
        Ok(list.pagos)
    }

    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut current) = self.token.write() {
            *current = token;
        }
    }

    fn has_credentials(&self) -> bool {
        matches!(self.token.read().as_deref(), Ok(Some(_)))
    }
}

/// Human-readable message from an error body.
///
/// A string `detail` is used as-is; a validation `detail` array becomes one
/// `loc.path: msg` line per entry; anything else falls back to the status.
pub fn extract_error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());

    match detail {
        Some(Value::String(message)) if !message.is_empty() => message,
        Some(Value::Array(issues)) if !issues.is_empty() => issues
            .into_iter()
            .map(|issue| match serde_json::from_value::<ValidationIssue>(issue.clone()) {
                Ok(issue) => issue.to_line(),
                Err(_) => issue.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => format!("HTTP error! status: {}", status),
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct CardList {
    #[serde(default)]
    tarjetas: Vec<SavedCard>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct PaymentList {
    #[serde(default)]
    pagos: Vec<PaymentRecord>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct ValidationIssue {
    #[serde(default)]
    loc: Vec<Value>,
    msg: String,
}

impl ValidationIssue {
    fn to_line(&self) -> String {
        if self.loc.is_empty() {
            return self.msg.clone();
        }
        let loc = self
            .loc
            .iter()
            .map(|part| match part {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        format!("{}: {}", loc, self.msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rental_core::{PaymentMethod, PaymentType, ProductOrderLine};
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpRentalBackend {
        HttpRentalBackend::new(BackendConfig::new(format!("{}/api/v1", server.uri()))).unwrap()
    }

    fn logged_in(server: &MockServer) -> HttpRentalBackend {
        let backend = backend_for(server);
        backend.set_access_token(Some("tok-123".into()));
        backend
    }

    fn order_request() -> OrderRequest {
        OrderRequest {
            event_start: NaiveDate::from_ymd_opt(2025, 11, 5).unwrap(),
            event_end: NaiveDate::from_ymd_opt(2025, 11, 6).unwrap(),
            address: "Cra 7 # 45-10".into(),
            event_type: "Boda".into(),
            estimated_guests: 120,
            notes: String::new(),
            products: vec![ProductOrderLine {
                product_id: 1,
                quantity: 10,
                unit_price: Decimal::from(15_000),
                rental_days: 3,
                subtotal: Decimal::from(450_000),
                deposit_per_unit: Decimal::ZERO,
                deposit_total: Decimal::ZERO,
            }],
            packages: vec![],
        }
    }

    #[tokio::test]
    async fn test_rental_item_snapshots_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/productos/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "producto_id": 1,
                "categoria_id": 2,
                "codigo_producto": "SIL-001",
                "nombre": "Silla Tiffany Blanca",
                "precio_por_dia": 15000.0,
                "stock_total": 200,
                "stock_disponible": 150,
                "estado": "disponible",
                "imagen_url": null,
                "requiere_deposito": true,
                "deposito_cantidad": 5000.0,
                "peso": 3.5
            })))
            .mount(&server)
            .await;

        let item = backend_for(&server)
            .rental_item(ItemKey::product(1))
            .await
            .unwrap();

        assert_eq!(item.key, ItemKey::product(1));
        assert_eq!(item.code, "SIL-001");
        assert_eq!(item.unit_price_per_day, Decimal::from(15_000));
        assert_eq!(item.deposit_per_unit, Some(Decimal::from(5_000)));
        assert_eq!(item.stock, Some(150));
        assert!(item.available);
    }

    #[tokio::test]
    async fn test_rental_item_snapshots_package() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/paquetes/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paquete_id": 3,
                "nombre": "Paquete Boda Premium",
                "precio_por_dia": "250000.00",
                "descuento_porcentaje": "15.00",
                "activo": true
            })))
            .mount(&server)
            .await;

        let item = backend_for(&server)
            .rental_item(ItemKey::package(3))
            .await
            .unwrap();

        assert_eq!(item.code, "PAQ-3");
        assert_eq!(item.discount_percent, Some(Decimal::from(15)));
    }

    #[tokio::test]
    async fn test_missing_item_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/productos/99"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Producto no encontrado"})),
            )
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .rental_item(ItemKey::product(99))
            .await
            .unwrap_err();

        match err {
            RentalError::ItemNotFound { key } => assert_eq!(key, "producto:99"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_keeps_token_for_card_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/login"))
            .and(body_json(json!({"email": "ana@example.com", "password": "secreta"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-abc",
                "token_type": "bearer",
                "user": {"usuario_id": 12, "nombre": "Ana", "apellido": "Gómez", "email": "ana@example.com"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me/tarjetas"))
            .and(header("Authorization", "Bearer tok-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tarjetas": [
                    {"tarjeta_id": 5, "ultimos_digitos": "1111", "marca": "mastercard", "es_predeterminada": false},
                    {"tarjeta_id": 7, "ultimos_digitos": "4242", "marca": "visa", "es_predeterminada": true}
                ],
                "total": 2
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        assert!(!backend.has_credentials());

        let login = backend.login("ana@example.com", "secreta").await.unwrap();
        assert_eq!(login.user.full_name(), "Ana Gómez");
        assert!(backend.has_credentials());

        let cards = backend.list_cards().await.unwrap();
        assert_eq!(cards.len(), 2);
        assert!(cards[1].is_default);
        assert_eq!(cards[1].last_digits, "4242");
    }

    #[tokio::test]
    async fn test_authenticated_calls_need_token() {
        let server = MockServer::start().await;
        let backend = backend_for(&server);

        assert!(matches!(
            backend.list_cards().await,
            Err(RentalError::NotAuthenticated)
        ));
        assert!(matches!(
            backend.create_order(&order_request(), "k").await,
            Err(RentalError::NotAuthenticated)
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_sends_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/solicitudes"))
            .and(header("Idempotency-Key", "key-001"))
            .and(header("Authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "solicitud_id": 41,
                "numero_solicitud": "SOL-2025-0041",
                "estado": "pendiente",
                "subtotal": "450000.00",
                "impuestos": "85500.00",
                "total_cotizacion": "535500.00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = logged_in(&server)
            .create_order(&order_request(), "key-001")
            .await
            .unwrap();

        assert_eq!(order.id, 41);
        assert_eq!(order.total_quote, Decimal::from(535_500));

        let requests = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["fecha_evento_fin"], "2025-11-06");
        assert_eq!(body["productos"][0]["cantidad_solicitada"], 10);
        assert_eq!(body["paquetes"], json!([]));
    }

    #[tokio::test]
    async fn test_register_payment_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pagos"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "detail": [
                    {"loc": ["body", "monto"], "msg": "ensure this value is greater than 0", "type": "value_error"},
                    {"loc": ["body", "tarjeta_id"], "msg": "field required", "type": "missing"}
                ]
            })))
            .mount(&server)
            .await;

        let request = PaymentRequest {
            order_id: 41,
            payment_type: PaymentType::Advance,
            method: PaymentMethod::Card,
            amount: Decimal::ZERO,
            notes: None,
            card_id: None,
        };
        let err = logged_in(&server).register_payment(&request).await.unwrap_err();

        match err {
            RentalError::Backend { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(
                    message,
                    "body.monto: ensure this value is greater than 0\nbody.tarjeta_id: field required"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_payment_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pagos"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "pago_id": 900,
                "solicitud_id": 41,
                "numero_transaccion": "TX-900",
                "estado_pago": "completado",
                "monto": "1041250.00",
                "fecha_pago": "2025-11-01T10:00:00"
            })))
            .mount(&server)
            .await;

        let request = PaymentRequest {
            order_id: 41,
            payment_type: PaymentType::Advance,
            method: PaymentMethod::Card,
            amount: Decimal::from(1_041_250),
            notes: Some("Pago con tarjeta terminada en 4242".into()),
            card_id: Some(7),
        };
        let payment = logged_in(&server).register_payment(&request).await.unwrap();
        assert_eq!(payment.amount, Decimal::from(1_041_250));

        let body: Value = server.received_requests().await.unwrap()[0]
            .body_json()
            .unwrap();
        assert_eq!(body["tipo_pago"], "anticipo");
        assert_eq!(body["metodo_pago"], "tarjeta");
        assert_eq!(body["tarjeta_id"], 7);
    }

    #[tokio::test]
    async fn test_catalog_listings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/categorias"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"categoria_id": 2, "nombre": "Sillas", "descripcion": "Sillas para eventos", "activo": true},
                {"categoria_id": 3, "nombre": "Mesas", "activo": true}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/productos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"producto_id": 1, "categoria_id": 2, "nombre": "Silla Tiffany Blanca",
                 "precio_por_dia": 15000.0, "stock_disponible": 150, "estado": "disponible"},
                {"producto_id": 2, "categoria_id": 3, "nombre": "Mesa Rectangular 2m",
                 "precio_por_dia": 35000.0, "stock_disponible": 0, "estado": "disponible"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/productos/categoria/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"producto_id": 2, "categoria_id": 3, "nombre": "Mesa Rectangular 2m",
                 "precio_por_dia": 35000.0, "stock_disponible": 0, "estado": "disponible"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/paquetes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"paquete_id": 3, "nombre": "Paquete Boda Premium", "precio_por_dia": "250000.00",
                 "descuento_porcentaje": "15.00", "capacidad_personas": 100}
            ])))
            .mount(&server)
            .await;

        let backend = backend_for(&server);

        let categories = backend.categories().await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Sillas");

        let products = backend.products(None).await.unwrap();
        assert_eq!(products.len(), 2);
        let mesas = backend.products(Some(3)).await.unwrap();
        assert_eq!(mesas.len(), 1);
        assert!(!mesas[0].is_available());

        let packages = backend.packages().await.unwrap();
        assert_eq!(packages[0].discount_percent, Some(Decimal::from(15)));
    }

    #[tokio::test]
    async fn test_customer_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me"))
            .and(header("Authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "usuario_id": 12, "nombre": "Ana", "apellido": "Gómez", "email": "ana@example.com"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/solicitudes/mis-solicitudes"))
            .and(header("Authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"solicitud_id": 41, "numero_solicitud": "SOL-2025-0041",
                 "fecha_evento_inicio": "2025-11-05", "fecha_evento_fin": "2025-11-06",
                 "tipo_evento": "Boda", "estado": "pendiente", "total_cotizacion": "1041250.00",
                 "fecha_solicitud": "2025-11-01T10:20:30", "total_productos": 1, "total_paquetes": 1}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pagos/mis-pagos"))
            .and(header("Authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagos": [
                    {"pago_id": 900, "solicitud_id": 41, "usuario_id": 12, "tipo_pago": "anticipo",
                     "metodo_pago": "tarjeta", "monto": "1041250.00", "numero_transaccion": "TX-900",
                     "estado_pago": "completado", "fecha_pago": "2025-11-01T10:21:00"}
                ],
                "total": 1
            })))
            .mount(&server)
            .await;

        let backend = logged_in(&server);

        assert_eq!(backend.current_user().await.unwrap().id, 12);

        let orders = backend.my_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].number, "SOL-2025-0041");
        assert_eq!(orders[0].total_quote, Decimal::from(1_041_250));

        let payments = backend.my_payments().await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].order_id, 41);
        assert_eq!(payments[0].transaction_number.as_deref(), Some("TX-900"));

        assert!(matches!(
            backend_for(&server).my_orders().await,
            Err(RentalError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/paquetes"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = BackendConfig::new(format!("{}/api/v1", server.uri()))
            .with_timeout(Duration::from_millis(100));
        let err = HttpRentalBackend::new(config)
            .unwrap()
            .packages()
            .await
            .unwrap_err();

        assert!(matches!(err, RentalError::NetworkError(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            extract_error_message(400, r#"{"detail": "Stock insuficiente"}"#),
            "Stock insuficiente"
        );
        assert_eq!(
            extract_error_message(422, r#"{"detail": [{"loc": ["body", "productos", 0, "cantidad_solicitada"], "msg": "value is not a valid integer"}]}"#),
            "body.productos.0.cantidad_solicitada: value is not a valid integer"
        );
        assert_eq!(extract_error_message(500, "Internal Server Error"), "HTTP error! status: 500");
        assert_eq!(extract_error_message(503, r#"{"error": "down"}"#), "HTTP error! status: 503");
    }
}
