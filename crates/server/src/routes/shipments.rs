//! Shipment handlers.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use tracing::instrument;

use sample_depot_core::{Shipment, ShipmentRequest};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the shipments router.
pub fn router() -> Router<AppState> {
    Router::new().route("/shipments", get(list).post(create))
}

/// Shipment history, newest first.
#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Shipment>>> {
    Ok(Json(state.inventory().list_shipments().await?))
}

/// The creator is always the session user.
#[instrument(skip(user, state, body), fields(user_id = %user.id, lines = body.lines.len()))]
async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<ShipmentRequest>,
) -> Result<(StatusCode, Json<Shipment>)> {
    let shipment = state
        .inventory()
        .create_shipment(user.id, &user.name, body)
        .await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}
