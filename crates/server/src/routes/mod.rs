//! HTTP route handlers.
//!
//! # Route Structure
//!
//! Everything below is nested under `/api`. Bodies are JSON unless noted.
//!
//! ```text
//! # Samples
//! GET    /samples                     - List samples
//! GET    /samples/{code}              - Get one sample
//! POST   /samples                     - Create sample (multipart: code, description, image)
//! PUT    /samples/{code}/code         - Rename sample
//! PUT    /samples/{code}/description  - Set description
//! PUT    /samples/{code}/image        - Replace image (multipart: image)
//! DELETE /samples/{code}              - Delete sample and its sizes
//!
//! # Sizes
//! GET    /sample-sizes                - List all sizes
//! GET    /sample-sizes/{code}         - Sizes of one sample
//! POST   /sample-sizes                - Create size
//! PUT    /sample-sizes/{id}           - Update size (spreads placement over the box)
//! DELETE /sample-sizes/{id}           - Delete size
//!
//! # Shelves and shipments
//! GET    /shelves                     - Shelf layout
//! GET    /shipments                   - Shipment history, newest first
//! POST   /shipments                   - Create shipment
//!
//! # Auth
//! POST   /login                       - Password login
//! POST   /logout                      - Destroy session
//! GET    /check-session               - Current identity
//!
//! # Users (admin)
//! GET    /users                       - List users
//! POST   /users                       - Create user with the default password
//! PUT    /users/{id}/role             - Set role
//! PUT    /users/{id}/reset-password   - Reset to the default password
//! DELETE /users/{id}                  - Delete user
//!
//! # Self-service
//! PUT    /user/name                   - Rename yourself
//! PUT    /user/password               - Change your password
//!
//! # Real-time
//! GET    /events                      - WebSocket event stream
//! ```

pub mod auth;
pub mod samples;
pub mod shelves;
pub mod shipments;
pub mod sizes;
pub mod users;

use axum::{Router, routing::get};

use crate::realtime::socket::event_stream;
use crate::state::AppState;

/// Build the complete API router, mounted at `/api`.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(samples::router())
        .merge(sizes::router())
        .merge(shelves::router())
        .merge(shipments::router())
        .merge(auth::router())
        .merge(users::router())
        .route("/events", get(event_stream));

    Router::new().nest("/api", api)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::cookie::Key;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;
    use crate::config::ServerConfig;

    /// The API over a pool that never connects, with in-memory sessions.
    fn app() -> Router {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://depot@localhost/depot"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            session_key: Key::generate(),
            image_dir: PathBuf::from("images"),
            default_password: SecretString::from("azira"),
            db_retry_interval: Duration::from_secs(5),
            event_queue_capacity: 16,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://depot@localhost/depot")
            .unwrap();
        let sessions =
            SessionManagerLayer::new(MemoryStore::default()).with_signed(config.session_key.clone());
        routes()
            .layer(sessions)
            .with_state(AppState::new(config, pool))
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_anonymous_check_session() {
        let (status, body) = get("/api/check-session").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "logged_in": false }));
    }

    #[tokio::test]
    async fn test_inventory_requires_login() {
        for uri in ["/api/samples", "/api/sample-sizes", "/api/shipments", "/api/shelves"] {
            let (status, _) = get(uri).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_user_admin_requires_login() {
        let (status, _) = get("/api/users").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (status, _) = get("/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
