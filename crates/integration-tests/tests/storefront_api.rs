//! Raw HTTP checks against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (cartwheel migrate)
//! - The storefront running (cargo run -p cartwheel-storefront)

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use cartwheel_integration_tests::{PASSWORD, base_url, unique_email};

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_health_and_readiness() {
    let client = Client::new();

    let resp = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to call /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to call /health/ready");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_request_id_is_echoed() {
    let resp = Client::new()
        .get(format!("{}/health", base_url()))
        .header("x-request-id", "it-trace-1")
        .send()
        .await
        .expect("Failed to call /health");

    assert_eq!(
        resp.headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("it-trace-1")
    );
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_errors_use_msg_body() {
    let resp = Client::new()
        .get(format!("{}/api/cart", base_url()))
        .send()
        .await
        .expect("Failed to call /api/cart");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Failed to parse error body");
    assert!(body["msg"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_duplicate_registration_conflicts() {
    let client = Client::new();
    // Keyed separately from the other tests in the auth limiter.
    let client_ip = format!("198.51.100.{}", uuid::Uuid::new_v4().as_u128() % 250 + 1);
    let body = json!({
        "name": "Twice",
        "email": unique_email(),
        "password": PASSWORD,
    });

    let first = client
        .post(format!("{}/api/auth/register", base_url()))
        .header("x-forwarded-for", &client_ip)
        .json(&body)
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(format!("{}/api/auth/register", base_url()))
        .header("x-forwarded-for", &client_ip)
        .json(&body)
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_product_writes_need_admin() {
    let resp = Client::new()
        .post(format!("{}/api/products", base_url()))
        .json(&json!({"name": "Mug", "price": "5.00", "category": "kitchen"}))
        .send()
        .await
        .expect("Failed to call /api/products");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
