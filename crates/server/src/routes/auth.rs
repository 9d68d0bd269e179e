//! Password login and session handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use sample_depot_core::UserSummary;

use crate::db::UserStore;
use crate::error::{AppError, Result};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::ServiceError;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/check-session", get(check_session))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    name: Option<String>,
    password: Option<String>,
}

/// Session status reported to clients.
#[derive(Debug, Serialize)]
struct SessionResponse {
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserSummary>,
}

impl SessionResponse {
    const fn anonymous() -> Self {
        Self {
            logged_in: false,
            user: None,
        }
    }

    fn of(user: CurrentUser) -> Self {
        Self {
            logged_in: true,
            user: Some(user.into()),
        }
    }
}

fn session_error(e: &tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}

#[instrument(skip(state, session, body), fields(name = ?body.name))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let (Some(name), Some(password)) = (body.name, body.password) else {
        return Err(ServiceError::Validation("name and password are required".to_owned()).into());
    };

    let user = CurrentUser::from(state.users().authenticate(&name, &password).await?);

    // new identity, new session id
    session.cycle_id().await.map_err(|e| session_error(&e))?;
    set_current_user(&session, &user)
        .await
        .map_err(|e| session_error(&e))?;

    Ok(Json(SessionResponse::of(user)))
}

#[instrument(skip(session))]
async fn logout(session: Session) -> Result<Json<SessionResponse>> {
    clear_current_user(&session)
        .await
        .map_err(|e| session_error(&e))?;
    session.flush().await.map_err(|e| session_error(&e))?;
    Ok(Json(SessionResponse::anonymous()))
}

/// The session identity, re-read from the store.
#[instrument(skip(state, session))]
async fn check_session(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SessionResponse>> {
    let Some(stored) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .map_err(|e| session_error(&e))?
    else {
        return Ok(Json(SessionResponse::anonymous()));
    };

    let fresh = state
        .store()
        .get_user(stored.id)
        .await
        .map_err(ServiceError::from)?;
    let Some(fresh) = fresh.map(CurrentUser::from) else {
        clear_current_user(&session)
            .await
            .map_err(|e| session_error(&e))?;
        return Ok(Json(SessionResponse::anonymous()));
    };

    if fresh != stored {
        set_current_user(&session, &fresh)
            .await
            .map_err(|e| session_error(&e))?;
    }
    Ok(Json(SessionResponse::of(fresh)))
}

#[cfg(test)]
mod tests {
    use sample_depot_core::{Role, UserId};

    use super::*;

    #[test]
    fn test_session_response_shape() {
        let anonymous = serde_json::to_value(SessionResponse::anonymous()).ok();
        assert_eq!(anonymous, Some(serde_json::json!({ "logged_in": false })));

        let user = CurrentUser {
            id: UserId::new(1),
            name: "admin".to_owned(),
            role: Role::Admin,
        };
        let logged_in = serde_json::to_value(SessionResponse::of(user)).ok();
        assert_eq!(
            logged_in,
            Some(serde_json::json!({
                "logged_in": true,
                "user": { "id": 1, "name": "admin", "role": "admin" }
            }))
        );
    }
}
