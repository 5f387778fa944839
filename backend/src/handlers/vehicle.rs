//! Vehicle and on-vehicle stock handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ApiResponse, Guard, INVENTORY_VIEW, VEHICLE_MANAGEMENT};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::vehicle::{CreateVehicleInput, UpdateVehicleInput, Vehicle, VehicleQuery};
use crate::services::vehicle_items::{AssignItemInput, UpdateAssignmentInput, VehicleItem};
use crate::services::{VehicleItemService, VehicleService};
use crate::AppState;

const READ: Guard = Guard::AnyPermission(&[INVENTORY_VIEW, VEHICLE_MANAGEMENT]);
const WRITE: Guard = Guard::Permission(VEHICLE_MANAGEMENT);

pub async fn list_vehicles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<VehicleQuery>,
) -> AppResult<Json<ApiResponse<Vec<Vehicle>>>> {
    user.authorize(&[READ])?;
    let vehicles = VehicleService::new(state.db.clone()).list_vehicles(query).await?;
    Ok(Json(ApiResponse::ok("Vehicles retrieved", vehicles)))
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vehicle>>> {
    user.authorize(&[READ])?;
    let vehicle = VehicleService::new(state.db.clone()).get_vehicle(vehicle_id).await?;
    Ok(Json(ApiResponse::ok("Vehicle retrieved", vehicle)))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateVehicleInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vehicle>>)> {
    user.authorize(&[WRITE])?;
    let vehicle = VehicleService::new(state.db.clone()).create_vehicle(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Vehicle created", vehicle))))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(vehicle_id): Path<Uuid>,
    Json(input): Json<UpdateVehicleInput>,
) -> AppResult<Json<ApiResponse<Vehicle>>> {
    user.authorize(&[WRITE])?;
    let vehicle = VehicleService::new(state.db.clone())
        .update_vehicle(vehicle_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Vehicle updated", vehicle)))
}

/// Deleting a vehicle returns everything it carried to inventory
pub async fn delete_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.authorize(&[WRITE])?;
    VehicleService::new(state.db.clone())
        .delete_vehicle(user.user_id, vehicle_id)
        .await?;
    Ok(Json(ApiResponse::message("Vehicle deleted")))
}

pub async fn list_vehicle_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(vehicle_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<VehicleItem>>>> {
    user.authorize(&[READ])?;
    let items = VehicleItemService::new(state.db.clone()).list_items(vehicle_id).await?;
    Ok(Json(ApiResponse::ok("Vehicle items retrieved", items)))
}

pub async fn assign_vehicle_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(vehicle_id): Path<Uuid>,
    Json(input): Json<AssignItemInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<VehicleItem>>)> {
    user.authorize(&[WRITE])?;
    let item = VehicleItemService::new(state.db.clone())
        .assign(user.user_id, vehicle_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Item assigned to vehicle", item))))
}

pub async fn update_vehicle_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((vehicle_id, inventory_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateAssignmentInput>,
) -> AppResult<Json<ApiResponse<VehicleItem>>> {
    user.authorize(&[WRITE])?;
    let item = VehicleItemService::new(state.db.clone())
        .update_quantity(user.user_id, vehicle_id, inventory_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Vehicle item updated", item)))
}

pub async fn remove_vehicle_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((vehicle_id, inventory_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.authorize(&[WRITE])?;
    VehicleItemService::new(state.db.clone())
        .remove(user.user_id, vehicle_id, inventory_id)
        .await?;
    Ok(Json(ApiResponse::message("Item returned to inventory")))
}
