//! Sample handlers.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sample_depot_core::Sample;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::NewSample;
use crate::state::AppState;

/// Build the samples router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/samples", get(list).post(create))
        .route("/samples/{code}", get(show).delete(delete))
        .route("/samples/{code}/code", put(rename))
        .route("/samples/{code}/description", put(set_description))
        .route("/samples/{code}/image", put(replace_image))
}

/// An uploaded file field.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Text fields and the optional `image` file of a sample form.
#[derive(Default)]
struct SampleForm {
    code: Option<String>,
    description: Option<String>,
    image: Option<Upload>,
}

async fn read_form(mut multipart: Multipart) -> Result<SampleForm> {
    let mut form = SampleForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // browsers send an empty part when no file was picked
                if !bytes.is_empty() {
                    form.image = Some(Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "code" | "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if name == "code" {
                    form.code = Some(text);
                } else {
                    form.description = Some(text);
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }
    Ok(form)
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Sample>>> {
    Ok(Json(state.inventory().list_samples().await?))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Sample>> {
    Ok(Json(state.inventory().get_sample(&code).await?))
}

/// `POST /api/samples` - multipart `code`, `description`, `image`.
#[instrument(skip(user, state, multipart), fields(user_id = %user.id))]
async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Sample>)> {
    let form = read_form(multipart).await?;

    let image = match (&form.image, form.code.as_deref()) {
        (Some(upload), Some(code)) if !code.trim().is_empty() => Some(
            state
                .images()
                .save(code.trim(), &upload.file_name, &upload.bytes)
                .await?,
        ),
        _ => None,
    };

    let created = state
        .inventory()
        .create_sample(NewSample {
            code: form.code,
            description: form.description,
            image: image.clone(),
        })
        .await;

    match created {
        Ok(sample) => Ok((StatusCode::CREATED, Json(sample))),
        Err(e) => {
            if let Some(image) = image {
                state.images().remove(&image).await;
            }
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    code: Option<String>,
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn rename(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<RenameRequest>,
) -> Result<Json<Sample>> {
    Ok(Json(
        state
            .inventory()
            .rename_sample(&code, body.code.as_deref())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct DescriptionRequest {
    description: Option<String>,
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn set_description(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<DescriptionRequest>,
) -> Result<Json<Sample>> {
    Ok(Json(
        state
            .inventory()
            .set_description(&code, body.description.as_deref())
            .await?,
    ))
}

/// `PUT /api/samples/{code}/image` - multipart `image`.
#[instrument(skip(user, state, multipart), fields(user_id = %user.id))]
async fn replace_image(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(code): Path<String>,
    multipart: Multipart,
) -> Result<Json<Sample>> {
    let Some(upload) = read_form(multipart).await?.image else {
        return Err(AppError::BadRequest("no image received".to_owned()));
    };
    // fail fast before writing a file for an unknown sample
    state.inventory().get_sample(&code).await?;

    let image = state
        .images()
        .save(&code, &upload.file_name, &upload.bytes)
        .await?;
    match state.inventory().replace_image(&code, &image).await {
        Ok((sample, previous)) => {
            state.images().remove(&previous).await;
            Ok(Json(sample))
        }
        Err(e) => {
            state.images().remove(&image).await;
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
struct Deleted {
    code: String,
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Deleted>> {
    let removed = state.inventory().delete_sample(&code).await?;
    state.images().remove(&removed.image).await;
    Ok(Json(Deleted { code: removed.code }))
}
