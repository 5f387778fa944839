//! Role management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{ApiResponse, Guard, RoleName, KNOWN_PERMISSIONS};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::role::{CreateRoleInput, RoleRecord, UpdateRoleInput};
use crate::services::RoleService;
use crate::AppState;

const ROLE_READERS: Guard = Guard::AnyRole(&[RoleName::Admin, RoleName::FirstClassOfficer]);
const ROLE_WRITERS: Guard = Guard::Role(RoleName::Admin);

/// Roles visible to the caller; officers do not see admin or cfo
pub async fn list_roles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<RoleRecord>>>> {
    user.authorize(&[ROLE_READERS])?;

    let roles = RoleService::new(state.db.clone())
        .list_roles(user.access_tier())
        .await?;
    Ok(Json(ApiResponse::ok("Roles retrieved", roles)))
}

pub async fn get_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RoleRecord>>> {
    user.authorize(&[ROLE_READERS])?;

    let role = RoleService::new(state.db.clone())
        .get_role(user.access_tier(), role_id)
        .await?;
    Ok(Json(ApiResponse::ok("Role retrieved", role)))
}

/// The permission strings a role may carry
pub async fn list_permissions(
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<&'static str>>>> {
    user.authorize(&[ROLE_READERS])?;
    Ok(Json(ApiResponse::ok(
        "Permissions retrieved",
        KNOWN_PERMISSIONS.to_vec(),
    )))
}

pub async fn create_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateRoleInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<RoleRecord>>)> {
    user.authorize(&[ROLE_WRITERS])?;

    let role = RoleService::new(state.db.clone()).create_role(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Role created", role))))
}

pub async fn update_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(role_id): Path<Uuid>,
    Json(input): Json<UpdateRoleInput>,
) -> AppResult<Json<ApiResponse<RoleRecord>>> {
    user.authorize(&[ROLE_WRITERS])?;

    let role = RoleService::new(state.db.clone())
        .update_role(role_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Role updated", role)))
}

pub async fn delete_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.authorize(&[ROLE_WRITERS])?;

    RoleService::new(state.db.clone()).delete_role(role_id).await?;
    Ok(Json(ApiResponse::message("Role deleted")))
}
