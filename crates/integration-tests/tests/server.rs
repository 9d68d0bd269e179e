//! HTTP smoke tests against a running server.
//!
//! These tests require:
//! - A running `PostgreSQL` database, migrated and seeded (`depot-cli migrate`, `depot-cli seed`)
//! - The server running (`cargo run -p sample-depot-server`)
//!
//! Run with: `cargo test -p sample-depot-integration-tests -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

/// Base URL for the server (configurable via environment).
fn base_url() -> String {
    std::env::var("DEPOT_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Log in as the seeded admin.
async fn admin_client() -> Client {
    let client = client();
    let resp = client
        .post(format!("{}/api/login", base_url()))
        .json(&json!({ "name": "admin", "password": "admin" }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health_endpoints() {
    let client = client();
    for path in ["/health", "/health/ready"] {
        let resp = client
            .get(format!("{}{path}", base_url()))
            .send()
            .await
            .expect("Failed to reach server");
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_anonymous_session() {
    let body: Value = client()
        .get(format!("{}/api/check-session", base_url()))
        .send()
        .await
        .expect("Failed to check session")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body, json!({ "logged_in": false }));
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_login_then_logout() {
    let client = admin_client().await;
    let body: Value = client
        .get(format!("{}/api/check-session", base_url()))
        .send()
        .await
        .expect("Failed to check session")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body["logged_in"], json!(true));
    assert_eq!(body["user"]["role"], json!("admin"));

    client
        .post(format!("{}/api/logout", base_url()))
        .send()
        .await
        .expect("Failed to log out");
    let body: Value = client
        .get(format!("{}/api/check-session", base_url()))
        .send()
        .await
        .expect("Failed to check session")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body["logged_in"], json!(false));
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_wrong_password_is_unauthorized() {
    let resp = client()
        .post(format!("{}/api/login", base_url()))
        .json(&json!({ "name": "admin", "password": "not-the-password" }))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Inventory
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_inventory_requires_login() {
    let resp = client()
        .get(format!("{}/api/samples", base_url()))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_shelves_listed_for_admin() {
    let shelves: Vec<Value> = admin_client()
        .await
        .get(format!("{}/api/shelves", base_url()))
        .send()
        .await
        .expect("Failed to list shelves")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(shelves.iter().any(|s| s["id"] == json!("S1")));
}
