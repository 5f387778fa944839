//! Reorder and inventory log handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ApiResponse, Guard, PaginatedData, INVENTORY_VIEW, REORDER_MANAGEMENT, VIEW_LOGS};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory_log::{InventoryLog, LogQuery};
use crate::services::reorder::{CreateReorderInput, Reorder, ReorderQuery, UpdateReorderStatusInput};
use crate::services::{InventoryLogService, ReorderService};
use crate::AppState;

const READ: Guard = Guard::AnyPermission(&[INVENTORY_VIEW, REORDER_MANAGEMENT]);
const MANAGE: Guard = Guard::Permission(REORDER_MANAGEMENT);

pub async fn list_reorders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReorderQuery>,
) -> AppResult<Json<ApiResponse<PaginatedData<Reorder>>>> {
    user.authorize(&[READ])?;
    let reorders = ReorderService::new(state.db.clone()).list(query).await?;
    Ok(Json(ApiResponse::ok("Reorders retrieved", reorders)))
}

pub async fn get_reorder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(reorder_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Reorder>>> {
    user.authorize(&[READ])?;
    let reorder = ReorderService::new(state.db.clone()).get(reorder_id).await?;
    Ok(Json(ApiResponse::ok("Reorder retrieved", reorder)))
}

/// Anyone who can see stock may ask for more of it
pub async fn create_reorder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateReorderInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Reorder>>)> {
    user.authorize(&[READ])?;
    let reorder = ReorderService::new(state.db.clone())
        .create(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Reorder requested", reorder))))
}

pub async fn update_reorder_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(reorder_id): Path<Uuid>,
    Json(input): Json<UpdateReorderStatusInput>,
) -> AppResult<Json<ApiResponse<Reorder>>> {
    user.authorize(&[MANAGE])?;
    let reorder = ReorderService::new(state.db.clone())
        .update_status(user.user_id, reorder_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Reorder status updated", reorder)))
}

pub async fn delete_reorder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(reorder_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.authorize(&[MANAGE])?;
    ReorderService::new(state.db.clone()).delete(reorder_id).await?;
    Ok(Json(ApiResponse::message("Reorder deleted")))
}

pub async fn list_inventory_logs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<ApiResponse<PaginatedData<InventoryLog>>>> {
    user.authorize(&[Guard::Permission(VIEW_LOGS)])?;
    let logs = InventoryLogService::new(state.db.clone()).list(query).await?;
    Ok(Json(ApiResponse::ok("Inventory logs retrieved", logs)))
}
