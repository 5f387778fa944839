//! HTTP handlers for inventory management endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use shared::{ApiResponse, Guard, PaginatedData, INVENTORY_MANAGEMENT, INVENTORY_VIEW};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{
    AdjustStockInput, CreateItemInput, InventoryItem, InventoryQuery, UpdateItemInput,
};
use crate::services::InventoryService;
use crate::AppState;

const READ: Guard = Guard::AnyPermission(&[INVENTORY_VIEW, INVENTORY_MANAGEMENT]);
const WRITE: Guard = Guard::Permission(INVENTORY_MANAGEMENT);

pub async fn list_inventory(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<InventoryQuery>,
) -> AppResult<Json<ApiResponse<PaginatedData<InventoryItem>>>> {
    user.authorize(&[READ])?;
    let items = InventoryService::new(state.db.clone()).list_items(query).await?;
    Ok(Json(ApiResponse::ok("Inventory retrieved", items)))
}

pub async fn get_inventory_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<InventoryItem>>> {
    user.authorize(&[READ])?;
    let item = InventoryService::new(state.db.clone()).get_item(item_id).await?;
    Ok(Json(ApiResponse::ok("Inventory item retrieved", item)))
}

pub async fn create_inventory_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<InventoryItem>>)> {
    user.authorize(&[WRITE])?;
    let item = InventoryService::new(state.db.clone())
        .create_item(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Inventory item created", item))))
}

pub async fn update_inventory_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<ApiResponse<InventoryItem>>> {
    user.authorize(&[WRITE])?;
    let item = InventoryService::new(state.db.clone())
        .update_item(user.user_id, item_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Inventory item updated", item)))
}

pub async fn delete_inventory_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.authorize(&[WRITE])?;
    InventoryService::new(state.db.clone())
        .delete_item(user.user_id, item_id)
        .await?;
    Ok(Json(ApiResponse::message("Inventory item deleted")))
}

pub async fn adjust_inventory_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<ApiResponse<InventoryItem>>> {
    user.authorize(&[WRITE])?;
    let item = InventoryService::new(state.db.clone())
        .adjust_stock(user.user_id, item_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Stock adjusted", item)))
}

pub async fn low_stock_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<InventoryItem>>>> {
    user.authorize(&[READ])?;
    let items = InventoryService::new(state.db.clone()).low_stock().await?;
    Ok(Json(ApiResponse::ok("Low stock items retrieved", items)))
}

pub async fn export_inventory(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    user.authorize(&[READ])?;
    let csv = InventoryService::new(state.db.clone()).export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"inventory.csv\""),
        ],
        csv,
    ))
}
