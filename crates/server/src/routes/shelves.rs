//! Shelf layout handler.

use axum::{Json, Router, extract::State, routing::get};
use tracing::instrument;

use sample_depot_core::Shelf;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Build the shelves router.
pub fn router() -> Router<AppState> {
    Router::new().route("/shelves", get(list))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Shelf>>> {
    Ok(Json(state.inventory().list_shelves().await?))
}
