//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use api::config::Config;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, NewProduct, ProductId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (Router, Arc<AppState<InMemoryStore>>) {
    let state = api::create_default_state(InMemoryStore::new(), &Config::default());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn seed_product(state: &AppState<InMemoryStore>, price_cents: i64, stock: u32) -> ProductId {
    state
        .catalog
        .create_product(NewProduct::new("Widget", Money::from_cents(price_cents), stock))
        .await
        .unwrap()
        .id
}

struct Call {
    method: &'static str,
    uri: String,
    user: Option<i64>,
    roles: Option<&'static str>,
    body: Option<Value>,
}

impl Call {
    fn new(method: &'static str, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            user: None,
            roles: None,
            body: None,
        }
    }

    fn user(mut self, id: i64) -> Self {
        self.user = Some(id);
        self
    }

    fn admin(mut self) -> Self {
        self.user = Some(1000);
        self.roles = Some("USER,ADMIN");
        self
    }

    fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    async fn send(self, app: &Router) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(user) = self.user {
            builder = builder.header("x-user-id", user.to_string());
        }
        if let Some(roles) = self.roles {
            builder = builder.header("x-roles", roles);
        }
        let body = match self.body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&value).unwrap())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

fn card() -> Value {
    json!({
        "card_number": "4111111111111111",
        "expiry_date": "12/30",
        "cvv": "123"
    })
}

async fn stock_of(app: &Router, id: ProductId) -> u64 {
    let (status, json) = Call::new("GET", format!("/api/products/{id}")).send(app).await;
    assert_eq!(status, StatusCode::OK);
    json["stock_quantity"].as_u64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = Call::new("GET", "/health").send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_product_writes_require_admin() {
    let (app, _) = setup();
    let body = json!({"name": "Lamp", "price_cents": 2500, "stock_quantity": 3});

    let (status, _) = Call::new("POST", "/api/products")
        .json(body.clone())
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = Call::new("POST", "/api/products")
        .user(7)
        .json(body.clone())
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["error"].as_str().is_some());

    let (status, json) = Call::new("POST", "/api/products")
        .admin()
        .json(body)
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["price_cents"], 2500);
    assert_eq!(json["active"], true);

    let (status, json) = Call::new("GET", "/api/products").send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stale_product_update_conflicts() {
    let (app, state) = setup();
    let id = seed_product(&state, 1000, 5).await;
    let update = json!({"name": "Widget v2", "price_cents": 1200, "version": 1});

    let (status, json) = Call::new("PUT", format!("/api/products/{id}"))
        .admin()
        .json(update.clone())
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);
    assert_eq!(json["stock_quantity"], 5);

    let (status, _) = Call::new("PUT", format!("/api/products/{id}"))
        .admin()
        .json(update)
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_deactivate_and_restock() {
    let (app, state) = setup();
    let id = seed_product(&state, 1000, 1).await;

    let (status, json) = Call::new("POST", format!("/api/products/{id}/restock"))
        .admin()
        .json(json!({"quantity": 4}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stock_quantity"], 5);

    let (status, _) = Call::new("DELETE", format!("/api/products/{id}"))
        .admin()
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = Call::new("GET", "/api/products").send(&app).await;
    assert!(json.as_array().unwrap().is_empty());

    let (status, _) = Call::new("POST", "/api/cart/items")
        .user(1)
        .json(json!({"product_id": id.as_i64(), "quantity": 1}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_low_stock_listing() {
    let (app, state) = setup();
    seed_product(&state, 100, 2).await;
    seed_product(&state, 100, 50).await;

    let (status, json) = Call::new("GET", "/api/products/low-stock?threshold=10")
        .admin()
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::OK);
    let products = json.as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["stock_quantity"], 2);
}

#[tokio::test]
async fn test_cart_add_update_and_cap() {
    let (app, state) = setup();
    let id = seed_product(&state, 250, 100).await;

    let (status, json) = Call::new("POST", "/api/cart/items")
        .user(1)
        .json(json!({"product_id": id.as_i64(), "quantity": 4}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_quantity"], 4);
    assert_eq!(json["total_cents"], 1000);

    let (status, _) = Call::new("POST", "/api/cart/items")
        .user(1)
        .json(json!({"product_id": id.as_i64(), "quantity": 7}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = Call::new("PUT", format!("/api/cart/items/{id}"))
        .user(1)
        .json(json!({"quantity": 0}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_merge_and_validate() {
    let (app, state) = setup();
    let id = seed_product(&state, 300, 10).await;

    Call::new("POST", "/api/cart/items")
        .user(-50)
        .json(json!({"product_id": id.as_i64(), "quantity": 2}))
        .send(&app)
        .await;

    let (status, json) = Call::new("POST", "/api/cart/merge")
        .user(1)
        .json(json!({"guest_id": -50}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_quantity"], 2);

    let (_, guest) = Call::new("GET", "/api/cart").user(-50).send(&app).await;
    assert_eq!(guest["total_quantity"], 0);

    let (status, json) = Call::new("POST", "/api/cart/checkout/validate")
        .user(1)
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["estimated_total_cents"], 600);

    let (status, _) = Call::new("POST", "/api/cart/checkout/validate")
        .user(-50)
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cart_merge_of_registered_user_is_forbidden() {
    let (app, state) = setup();
    let id = seed_product(&state, 300, 10).await;

    Call::new("POST", "/api/cart/items")
        .user(50)
        .json(json!({"product_id": id.as_i64(), "quantity": 2}))
        .send(&app)
        .await;

    let (status, _) = Call::new("POST", "/api/cart/merge")
        .user(1)
        .json(json!({"guest_id": 50}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, victim) = Call::new("GET", "/api/cart").user(50).send(&app).await;
    assert_eq!(victim["total_quantity"], 2);
    let (_, caller) = Call::new("GET", "/api/cart").user(1).send(&app).await;
    assert_eq!(caller["total_quantity"], 0);

    let (status, json) = Call::new("POST", "/api/cart/merge")
        .admin()
        .json(json!({"guest_id": 50}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_quantity"], 2);
}

#[tokio::test]
async fn test_place_paid_order() {
    let (app, state) = setup();
    let id = seed_product(&state, 1000, 5).await;

    let (status, json) = Call::new("POST", "/api/orders/with-payment")
        .user(1)
        .json(json!({
            "items": [{"product_id": id.as_i64(), "quantity": 2}],
            "shipping_address": "1 Main St",
            "payment_method": "Credit Card",
            "payment_details": card()
        }))
        .send(&app)
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "PROCESSING");
    assert_eq!(json["payment_status"], "COMPLETED");
    assert_eq!(json["total_cents"], 2000);
    assert!(json["transaction_id"].as_str().unwrap().starts_with("CC-"));
    assert_eq!(json["items"][0]["unit_price_cents"], 1000);
    assert_eq!(stock_of(&app, id).await, 3);
}

#[tokio::test]
async fn test_failed_orders_leave_stock_untouched() {
    let (app, state) = setup();
    let id = seed_product(&state, 1000, 5).await;
    let items = json!([{"product_id": id.as_i64(), "quantity": 2}]);

    let (status, _) = Call::new("POST", "/api/orders/with-payment")
        .user(1)
        .json(json!({"items": items, "payment_method": "bitcoin"}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = Call::new("POST", "/api/orders/with-payment")
        .user(1)
        .json(json!({"items": items, "payment_method": "creditcard"}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (status, _) = Call::new("POST", "/api/orders")
        .user(1)
        .json(json!({"items": [{"product_id": id.as_i64(), "quantity": 6}]}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(stock_of(&app, id).await, 5);

    let (_, json) = Call::new("GET", "/api/orders/my-orders").user(1).send(&app).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_from_cart_clears_it() {
    let (app, state) = setup();
    let id = seed_product(&state, 500, 5).await;

    Call::new("POST", "/api/cart/items")
        .user(3)
        .json(json!({"product_id": id.as_i64(), "quantity": 3}))
        .send(&app)
        .await;

    let (status, json) = Call::new("POST", "/api/orders/checkout")
        .user(3)
        .json(json!({"payment_method": "paypal", "payment_details": {"paypal_email": "a@b.c"}}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["total_cents"], 1500);
    assert_eq!(json["payment_status"], "COMPLETED");

    let (_, cart) = Call::new("GET", "/api/cart").user(3).send(&app).await;
    assert_eq!(cart["total_quantity"], 0);
    assert_eq!(stock_of(&app, id).await, 2);
}

#[tokio::test]
async fn test_order_visibility() {
    let (app, state) = setup();
    let id = seed_product(&state, 100, 5).await;

    let (_, order) = Call::new("POST", "/api/orders")
        .user(1)
        .json(json!({"items": [{"product_id": id.as_i64(), "quantity": 1}]}))
        .send(&app)
        .await;
    let order_id = order["id"].as_i64().unwrap();

    let (status, _) = Call::new("GET", format!("/api/orders/{order_id}"))
        .user(1)
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = Call::new("GET", format!("/api/orders/{order_id}"))
        .user(2)
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = Call::new("GET", format!("/api/orders/{order_id}"))
        .admin()
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = Call::new("GET", "/api/orders/999").admin().send(&app).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = Call::new("GET", "/api/orders/my-orders?page=0&size=5")
        .user(1)
        .send(&app)
        .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = Call::new("GET", "/api/orders").user(1).send(&app).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_status_updates() {
    let (app, state) = setup();
    let id = seed_product(&state, 100, 5).await;

    let (_, order) = Call::new("POST", "/api/orders")
        .user(1)
        .json(json!({"items": [{"product_id": id.as_i64(), "quantity": 2}]}))
        .send(&app)
        .await;
    let order_id = order["id"].as_i64().unwrap();
    assert_eq!(stock_of(&app, id).await, 3);

    let (status, _) = Call::new("PUT", format!("/api/orders/{order_id}/status"))
        .admin()
        .json(json!({"status": "SHIPPED"}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = Call::new("PUT", format!("/api/orders/{order_id}/status"))
        .admin()
        .json(json!({"status": "LOST"}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = Call::new("PUT", format!("/api/orders/{order_id}/status"))
        .admin()
        .json(json!({"status": "cancelled"}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CANCELLED");
    assert_eq!(stock_of(&app, id).await, 5);

    let (_, cancelled) = Call::new("GET", "/api/orders/by-status?status=CANCELLED")
        .admin()
        .send(&app)
        .await;
    assert_eq!(cancelled.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_update_and_refund() {
    let (app, state) = setup();
    let id = seed_product(&state, 800, 5).await;

    let (_, order) = Call::new("POST", "/api/orders/with-payment")
        .user(1)
        .json(json!({
            "items": [{"product_id": id.as_i64(), "quantity": 1}],
            "payment_method": "creditcard",
            "payment_details": card()
        }))
        .send(&app)
        .await;
    let order_id = order["id"].as_i64().unwrap();

    let (status, json) = Call::new("POST", format!("/api/orders/{order_id}/refund"))
        .admin()
        .json(json!({}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment_status"], "REFUNDED");

    let (_, unpaid) = Call::new("POST", "/api/orders")
        .user(1)
        .json(json!({"items": [{"product_id": id.as_i64(), "quantity": 1}]}))
        .send(&app)
        .await;
    let unpaid_id = unpaid["id"].as_i64().unwrap();

    let (status, json) = Call::new("PUT", format!("/api/orders/{unpaid_id}/payment"))
        .admin()
        .json(json!({"payment_status": "COMPLETED"}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "PROCESSING");
}

#[tokio::test]
async fn test_order_count_and_date_range() {
    let (app, state) = setup();
    let id = seed_product(&state, 100, 5).await;

    Call::new("POST", "/api/orders")
        .user(1)
        .json(json!({"items": [{"product_id": id.as_i64(), "quantity": 1}]}))
        .send(&app)
        .await;

    let (status, json) = Call::new("GET", "/api/orders/count").admin().send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);

    let (status, json) = Call::new(
        "GET",
        "/api/orders/by-date?start=2000-01-01T00:00:00Z&end=2999-01-01T00:00:00Z",
    )
    .admin()
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, _) = Call::new(
        "GET",
        "/api/orders/by-date?start=2999-01-01T00:00:00Z&end=2000-01-01T00:00:00Z",
    )
    .admin()
    .send(&app)
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_methods() {
    let (app, _) = setup();

    let (status, json) = Call::new("GET", "/api/payments/methods").send(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["methods"], json!(["banktransfer", "creditcard", "paypal"]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, state) = setup();
    let id = seed_product(&state, 100, 5).await;

    let (status, _) = Call::new("POST", "/api/orders")
        .user(1)
        .json(json!({"items": [{"product_id": id.as_i64(), "quantity": 1}]}))
        .send(&app)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
    assert!(text.contains("inventory_debits_total"));
}
