//! User management handlers
//!
//! Access rules live in the user service's tier policy; these handlers only
//! translate HTTP.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ApiResponse, PaginatedData};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, ListUsersQuery, UpdateUserInput, UserView};
use crate::services::UserService;
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<ApiResponse<PaginatedData<UserView>>>> {
    let users = UserService::new(state.db.clone()).list_users(&user, query).await?;
    Ok(Json(ApiResponse::ok("Users retrieved", users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let target = UserService::new(state.db.clone()).get_user(&user, user_id).await?;
    Ok(Json(ApiResponse::ok("User retrieved", target)))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserView>>)> {
    let created = UserService::new(state.db.clone()).create_user(&user, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("User created", created))))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let updated = UserService::new(state.db.clone())
        .update_user(&user, user_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("User updated", updated)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    UserService::new(state.db.clone()).delete_user(&user, user_id).await?;
    Ok(Json(ApiResponse::message("User deleted")))
}
