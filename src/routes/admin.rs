use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, post};
use axum::Router;
use serde::Deserialize;

use crate::auth::TenantContext;
use crate::errors::ApiError;
use crate::services::tenant_deletion::{TenantDeletionReport, TenantDeletionService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tenants/{tenant_id}/reprocess", post(reprocess_tenant))
        .route("/tenants/{tenant_id}", delete(delete_tenant))
}

#[derive(Debug, Deserialize)]
struct DeleteTenantQuery {
    /// Proceed even when the tenant still has active users.
    #[serde(default)]
    force: bool,
    /// Remove relational records too, not just storage objects.
    #[serde(default)]
    purge_records: bool,
}

#[utoipa::path(
    post,
    path = "/api/admin/tenants/{tenant_id}/reprocess",
    tag = "admin",
    params(
        ("tenant_id" = String, Path, description = "Tenant id")
    ),
    responses(
        (status = 200, description = "Ingestion pass completed, returns processed count"),
        (status = 403, description = "Caller is not an admin")
    )
)]
async fn reprocess_tenant(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(tenant_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !ctx.is_admin() {
        return Err(ApiError::NotFoundOrForbidden);
    }

    let processed = state.pipeline.process_all_for_tenant(&tenant_id).await?;
    Ok(Json(serde_json::json!({ "processed": processed })))
}

#[utoipa::path(
    delete,
    path = "/api/admin/tenants/{tenant_id}",
    tag = "admin",
    params(
        ("tenant_id" = String, Path, description = "Tenant id"),
        ("force" = bool, Query, description = "Delete even with active users"),
        ("purge_records" = bool, Query, description = "Also remove relational records")
    ),
    responses(
        (status = 200, description = "Deletion report", body = TenantDeletionReport),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Tenant not found"),
        (status = 409, description = "Tenant still has active users")
    )
)]
async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(tenant_id): Path<String>,
    Query(query): Query<DeleteTenantQuery>,
) -> Result<(StatusCode, Json<TenantDeletionReport>), ApiError> {
    if !ctx.is_admin() {
        return Err(ApiError::NotFoundOrForbidden);
    }

    let service = TenantDeletionService::new(state.db.clone(), state.storage.clone());

    let report = if query.purge_records {
        service
            .delete_complete(&tenant_id, query.force, &ctx.user_id)
            .await?
    } else {
        let storage = service
            .delete_tenant_storage(&tenant_id, query.force, &ctx.user_id)
            .await?;
        TenantDeletionReport {
            storage,
            records_deleted: false,
        }
    };

    Ok((StatusCode::OK, Json(report)))
}
