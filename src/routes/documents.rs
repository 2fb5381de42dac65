use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::errors::ApiError;
use crate::models::{DownloadCredential, UploadCredential, UploadUrlRequest};
use crate::services::{DownloadService, UploadService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload-url", post(request_upload_url))
        .route("/{id}/download-url", get(request_download_url))
}

#[utoipa::path(
    post,
    path = "/api/documents/upload-url",
    tag = "documents",
    request_body = UploadUrlRequest,
    responses(
        (status = 200, description = "Presigned upload credential issued", body = UploadCredential),
        (status = 400, description = "Bad request - invalid filename or identifiers"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Unsupported file type")
    )
)]
async fn request_upload_url(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(request): Json<UploadUrlRequest>,
) -> Result<Json<UploadCredential>, ApiError> {
    let service = UploadService::new(
        state.storage.clone(),
        state.config.allowed_extensions.clone(),
        state.config.max_upload_bytes,
        Duration::from_secs(state.config.presign_expiry_secs),
    );

    let credential = service
        .request_upload_credential(
            &ctx.tenant_id,
            &request.filename,
            &request.mime_type,
            request.file_size,
            request.document_id.as_deref(),
        )
        .await?;

    Ok(Json(credential))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}/download-url",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Document id")
    ),
    responses(
        (status = 200, description = "Presigned download credential issued", body = DownloadCredential),
        (status = 403, description = "Document storage location invalid"),
        (status = 404, description = "Document not found")
    )
)]
async fn request_download_url(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadCredential>, ApiError> {
    let service = DownloadService::new(
        state.db.clone(),
        state.storage.clone(),
        Duration::from_secs(state.config.presign_expiry_secs),
    );

    let credential = service
        .issue_download_credential(id, &ctx.tenant_id, &ctx.roles)
        .await?;

    Ok(Json(credential))
}
