//! User administration (admin only) and self-service account handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use sample_depot_core::{UserId, UserSummary};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list).post(create))
        .route("/users/{id}", delete(remove))
        .route("/users/{id}/role", put(set_role))
        .route("/users/{id}/reset-password", put(reset_password))
        .route("/user/name", put(rename_self))
        .route("/user/password", put(change_password))
}

#[derive(Debug, Serialize)]
struct Done {
    message: &'static str,
}

#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn list(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>> {
    Ok(Json(state.users().list_users().await?))
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    name: Option<String>,
    role: Option<String>,
}

/// New accounts start with the configured default password.
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>)> {
    let user = state
        .users()
        .create_user(body.name.as_deref(), body.role.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role: Option<String>,
}

#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<UserSummary>> {
    Ok(Json(
        state
            .users()
            .set_role(UserId::new(id), body.role.as_deref())
            .await?,
    ))
}

#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn reset_password(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Done>> {
    state.users().reset_password(UserId::new(id)).await?;
    Ok(Json(Done {
        message: "password reset",
    }))
}

#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn remove(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Done>> {
    state.users().delete_user(admin.id, UserId::new(id)).await?;
    Ok(Json(Done {
        message: "user deleted",
    }))
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    name: Option<String>,
}

/// Rename the session user; the session picks up the new name at once.
#[instrument(skip(user, state, session), fields(user_id = %user.id))]
async fn rename_self(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RenameRequest>,
) -> Result<Json<UserSummary>> {
    let renamed = state.users().rename(user.id, body.name.as_deref()).await?;
    set_current_user(&session, &CurrentUser::from(renamed.clone()))
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    Ok(Json(renamed))
}

#[derive(Deserialize)]
struct PasswordRequest {
    old_password: Option<String>,
    new_password: Option<String>,
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<PasswordRequest>,
) -> Result<Json<Done>> {
    state
        .users()
        .change_password(
            user.id,
            body.old_password.as_deref(),
            body.new_password.as_deref(),
        )
        .await?;
    Ok(Json(Done {
        message: "password changed",
    }))
}
