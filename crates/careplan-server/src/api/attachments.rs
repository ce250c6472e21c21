//! Attachment endpoints backed by the blob store

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::errors::ApiError;
use super::identity::CurrentUser;
use crate::server::CarePlanServer;

/// `POST /attachments/*name`: store the raw body, 201 with the blob metadata
pub async fn upload_attachment_handler(
    State(server): State<Arc<CarePlanServer>>,
    user: CurrentUser,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let identity = user.require_editor()?;

    let blob = server.blobs().upload(&body, &name).await?;
    info!(name = %blob.name, size = blob.size, user_id = identity.user_id, "Attachment uploaded");

    Ok((StatusCode::CREATED, Json(blob)))
}

/// `GET /attachments/*name`: raw bytes of a stored attachment
pub async fn get_attachment_handler(
    State(server): State<Arc<CarePlanServer>>,
    _user: CurrentUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let content = server.blobs().read(&name).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        content,
    ))
}

/// `DELETE /attachments/*name`
pub async fn delete_attachment_handler(
    State(server): State<Arc<CarePlanServer>>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let identity = user.require_editor()?;

    server.blobs().delete(&name).await?;
    info!(name = %name, user_id = identity.user_id, "Attachment deleted");

    Ok(StatusCode::NO_CONTENT)
}
