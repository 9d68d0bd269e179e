//! Size handlers. Updates spread a box's placement to every record in it.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Serialize;
use tracing::instrument;

use sample_depot_core::{Size, SizeId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::{SizeInput, SizeUpdate};
use crate::state::AppState;

/// Build the sizes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sample-sizes", get(list).post(create))
        // GET addresses a sample code, PUT and DELETE a size id
        .route(
            "/sample-sizes/{key}",
            get(list_for_sample).put(update).delete(delete),
        )
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Size>>> {
    Ok(Json(state.inventory().list_sizes().await?))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn list_for_sample(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Size>>> {
    Ok(Json(state.inventory().sizes_of(&code).await?))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<SizeInput>,
) -> Result<(StatusCode, Json<Size>)> {
    let size = state.inventory().create_size(body).await?;
    Ok((StatusCode::CREATED, Json(size)))
}

/// Every record touched by the update: the whole box, or the cleared record.
#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<SizeUpdate>,
) -> Result<Json<Vec<Size>>> {
    Ok(Json(
        state.inventory().update_size(SizeId::new(id), body).await?,
    ))
}

#[derive(Debug, Serialize)]
struct Deleted {
    id: SizeId,
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Deleted>> {
    let id = state.inventory().delete_size(SizeId::new(id)).await?;
    Ok(Json(Deleted { id }))
}
