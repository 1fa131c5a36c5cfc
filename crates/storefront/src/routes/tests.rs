#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use cartwheel_core::{UserId, UserRole};

use super::app;
use crate::db::MemoryStore;
use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::services::checkout::CheckoutPolicy;
use crate::state::AppState;

const PASSWORD: &str = "Sup3r$ecret";

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::in_memory(
            store.clone(),
            SecretString::from("k3Y!v9#Qz2@Lm8$Rt5%Wx1^Bn7&Hc4*Pd6"),
            CheckoutPolicy {
                clear_attempts: 2,
                backoff: Duration::ZERO,
            },
        );
        Self {
            router: app(state.clone()),
            state,
            store,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.10");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_owned()
    }

    fn admin_token(&self) -> String {
        self.state
            .tokens()
            .issue(UserId::new(9_999), UserRole::Admin)
            .unwrap()
    }

    async fn create_product(&self, name: &str, price: &str, category: &str) -> i64 {
        let admin = self.admin_token();
        let (status, body) = self
            .send(
                Method::POST,
                "/api/products",
                Some(&admin),
                Some(json!({ "name": name, "price": price, "category": category })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

// =============================================================================
// Health and middleware
// =============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, _) = app.send(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_every_response_carries_request_id() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/cart")
                .header(REQUEST_ID_HEADER, "edge-42")
                .header("x-forwarded-for", "203.0.113.10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "edge-42");

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new();
    let token = app.register("Ada Lovelace", "Ada@Example.com").await;

    let (status, me) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["isAdmin"], false);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "Wr0ng$pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_flood_is_rejected_with_json_body() {
    let app = TestApp::new();
    let attempt = json!({ "email": "nobody@example.com", "password": "Wr0ng$pass" });

    for _ in 0..5 {
        let (status, _) = app
            .send(Method::POST, "/api/auth/login", None, Some(attempt.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = app
        .send(Method::POST, "/api/auth/login", None, Some(attempt))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["msg"], "Too many requests, please try again later");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_input() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ada Again", "email": "ADA@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["msg"], "User already exists");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Grace", "email": "grace@example.com", "password": "password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].as_str().unwrap().starts_with("Password must include"));
}

#[tokio::test]
async fn test_profile_update() {
    let app = TestApp::new();
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/auth/profile",
            Some(&token),
            Some(json!({ "name": "Ada King" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada King");
    assert_eq!(body["user"]["email"], "ada@example.com");

    let (_, body) = app
        .send(Method::GET, "/api/auth/profile", Some(&token), None)
        .await;
    assert_eq!(body["user"]["name"], "Ada King");
}

#[tokio::test]
async fn test_token_failures_are_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "No token, authorization denied");

    let (status, body) = app
        .send(Method::GET, "/api/cart", Some("not.a.token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Token is not valid");

    let two_hours_ago = chrono::Utc::now().timestamp() - 7_200;
    let expired = app
        .state
        .tokens()
        .issue_at(UserId::new(1), UserRole::Customer, two_hours_ago)
        .unwrap();
    let (status, body) = app.send(Method::GET, "/api/cart", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Token expired, please log in again");
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_product_writes_require_admin() {
    let app = TestApp::new();
    let customer = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/products",
            Some(&customer),
            Some(json!({ "name": "Kite", "price": "12.50", "category": "Toys" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["msg"], "Admin access required");
}

#[tokio::test]
async fn test_product_crud_and_category_filter() {
    let app = TestApp::new();
    let kite = app.create_product("Kite", "12.50", "Toys").await;
    app.create_product("Teapot", "30.00", "Kitchen").await;

    let (status, body) = app
        .send(Method::GET, "/api/products?category=toys", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let products = body["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Kite");
    assert_eq!(products[0]["price"], "12.50");

    let admin = app.admin_token();
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/products/{kite}"),
            Some(&admin),
            Some(json!({ "name": "Box Kite", "price": "14.00", "category": "Toys" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Box Kite");

    let (_, body) = app
        .send(Method::GET, &format!("/api/products/{kite}"), None, None)
        .await;
    assert_eq!(body["price"], "14.00");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/products/{kite}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(Method::GET, &format!("/api/products/{kite}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Product not found");
}

#[tokio::test]
async fn test_product_price_must_fit_the_catalog() {
    let app = TestApp::new();
    let admin = app.admin_token();

    for price in ["1.999", "10000000000.00", "-1.00"] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/products",
                Some(&admin),
                Some(json!({ "name": "Kite", "price": price, "category": "Toys" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{price}: {body}");
        assert!(body["msg"].is_string());
    }

    let (_, body) = app.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(body["products"], json!([]));
}

// =============================================================================
// Cart and wishlist
// =============================================================================

#[tokio::test]
async fn test_cart_lifecycle() {
    let app = TestApp::new();
    let kite = app.create_product("Kite", "12.50", "Toys").await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    app.send(
        Method::POST,
        "/api/cart",
        Some(&token),
        Some(json!({ "productId": kite, "quantity": 1 })),
    )
    .await;
    let (status, cart) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": kite, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let lines = cart.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 3);
    assert_eq!(lines[0]["product"]["name"], "Kite");

    let (status, cart) = app
        .send(
            Method::PUT,
            &format!("/api/cart/{kite}"),
            Some(&token),
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart, json!([]));

    let (status, cart) = app
        .send(Method::DELETE, &format!("/api/cart/{kite}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart, json!([]));
}

#[tokio::test]
async fn test_cart_validation_errors() {
    let app = TestApp::new();
    let kite = app.create_product("Kite", "12.50", "Toys").await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": kite, "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Quantity must be at least 1");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": 4_040 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Product not found");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/cart/{kite}"),
            Some(&token),
            Some(json!({ "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Item not found in cart");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].is_string());
}

#[tokio::test]
async fn test_wishlist_add_is_idempotent() {
    let app = TestApp::new();
    let kite = app.create_product("Kite", "12.50", "Toys").await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    for _ in 0..2 {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/wishlist",
                Some(&token),
                Some(json!({ "productId": kite })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.send(Method::GET, "/api/wishlist", Some(&token), None).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["product"]["name"], "Kite");

    let (_, body) = app
        .send(Method::DELETE, &format!("/api/wishlist/{kite}"), Some(&token), None)
        .await;
    assert_eq!(body["items"], json!([]));
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_checkout_totals_and_empties_cart() {
    let app = TestApp::new();
    let p1 = app.create_product("Kite", "10.00", "Toys").await;
    let p2 = app.create_product("Yo-yo", "5.00", "Toys").await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    for (product, quantity) in [(p1, 2), (p2, 1)] {
        app.send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product, "quantity": quantity })),
        )
        .await;
    }

    let (status, body) = app.send(Method::POST, "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["order"]["total"], "25.00");
    assert_eq!(body["order"]["status"], "Pending");
    assert_eq!(body["order"]["items"].as_array().unwrap().len(), 2);
    assert!(body.get("warning").is_none());

    let (_, cart) = app.send(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(cart, json!([]));

    let (_, orders) = app.send(Method::GET, "/api/orders", Some(&token), None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_on_empty_cart_creates_nothing() {
    let app = TestApp::new();
    let token = app.register("Ada Lovelace", "ada@example.com").await;

    let (status, body) = app.send(Method::POST, "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Cart is empty");

    let (_, orders) = app.send(Method::GET, "/api/orders", Some(&token), None).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_checkout_rejects_total_too_large_for_an_order() {
    let app = TestApp::new();
    let yacht = app.create_product("Yacht", "9999999999.99", "Boats").await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": yacht, "quantity": 101 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::POST, "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Order total is too large");

    let (_, orders) = app.send(Method::GET, "/api/orders", Some(&token), None).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_checkout_warns_when_cart_cannot_be_cleared() {
    let app = TestApp::new();
    let kite = app.create_product("Kite", "10.00", "Toys").await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    app.send(
        Method::POST,
        "/api/cart",
        Some(&token),
        Some(json!({ "productId": kite })),
    )
    .await;

    app.store.fail_cart_clears(10);
    let (status, body) = app.send(Method::POST, "/api/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["warning"], "cart_not_cleared");
    assert_eq!(body["order"]["total"], "10.00");

    let (_, cart) = app.send(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(cart.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_orders_are_private_and_admin_drives_status() {
    let app = TestApp::new();
    let kite = app.create_product("Kite", "10.00", "Toys").await;
    let ada = app.register("Ada Lovelace", "ada@example.com").await;
    let grace = app.register("Grace Hopper", "grace@example.com").await;

    app.send(
        Method::POST,
        "/api/cart",
        Some(&ada),
        Some(json!({ "productId": kite })),
    )
    .await;
    let (_, body) = app.send(Method::POST, "/api/orders", Some(&ada), None).await;
    let order_id = body["order"]["id"].as_i64().unwrap();
    let order_uri = format!("/api/orders/{order_id}");

    let (status, _) = app.send(Method::GET, &order_uri, Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::GET, &order_uri, Some(&grace), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Order not found");

    let status_uri = format!("{order_uri}/status");
    let (status, _) = app
        .send(
            Method::PUT,
            &status_uri,
            Some(&ada),
            Some(json!({ "status": "Shipped" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.admin_token();
    let (status, body) = app
        .send(
            Method::PUT,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "Shipped" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Cannot change order status from Pending to Shipped");

    let (status, body) = app
        .send(
            Method::PUT,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "Processing" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Processing");
}

#[tokio::test]
async fn test_price_change_leaves_order_total() {
    let app = TestApp::new();
    let kite = app.create_product("Kite", "10.00", "Toys").await;
    let token = app.register("Ada Lovelace", "ada@example.com").await;
    app.send(
        Method::POST,
        "/api/cart",
        Some(&token),
        Some(json!({ "productId": kite, "quantity": 2 })),
    )
    .await;
    let (_, body) = app.send(Method::POST, "/api/orders", Some(&token), None).await;
    let order_id = body["order"]["id"].as_i64().unwrap();

    let admin = app.admin_token();
    app.send(
        Method::PUT,
        &format!("/api/products/{kite}"),
        Some(&admin),
        Some(json!({ "name": "Kite", "price": "99.00", "category": "Toys" })),
    )
    .await;

    let (_, order) = app
        .send(Method::GET, &format!("/api/orders/{order_id}"), Some(&token), None)
        .await;
    assert_eq!(order["total"], "20.00");
    assert_eq!(order["items"][0]["product"]["price"], "99.00");
}
