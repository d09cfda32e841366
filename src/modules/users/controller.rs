use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use casedesk_core::{ApiResponse, AppError};
use casedesk_models::{
    AssignUserRoleDto, CreateUserDto, PaginatedUsersResponse, UserFilterParams, UserId,
    UserProfile, UserStatusDto,
};
use tracing::instrument;

use crate::middleware::auth::{AuthUser, RequireUsersManage};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::UserService;

/// Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user's profile", body = UserProfile),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth_user))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let user = UserService::get_user(&state.db, auth_user.user_id()?).await?;
    Ok(Json(ApiResponse::ok(user)))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("role_id" = Option<uuid::Uuid>, Query, description = "Filter by role"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Substring of email or full name"),
        ("limit" = Option<i64>, Query, description = "Items per page (1-100)"),
        ("offset" = Option<i64>, Query, description = "Items to skip"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Paginated users", body = PaginatedUsersResponse),
        (status = 403, description = "Forbidden - requires users.manage.all")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: RequireUsersManage,
    Query(filter): Query<UserFilterParams>,
) -> Result<Json<ApiResponse<PaginatedUsersResponse>>, AppError> {
    let users = UserService::list_users(&state.db, filter).await?;
    Ok(Json(ApiResponse::ok(users)))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 400, description = "Role is inactive"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error"),
        (status = 403, description = "Forbidden - requires users.manage.all")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, dto))]
pub async fn create_user(
    State(state): State<AppState>,
    _auth: RequireUsersManage,
    ValidatedJson(dto): ValidatedJson<CreateUserDto>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), AppError> {
    let user = UserService::create_user(&state.db, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(user, "Usuario creado")),
    ))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    request_body = AssignUserRoleDto,
    responses(
        (status = 200, description = "Role assigned or removed", body = UserProfile),
        (status = 400, description = "Role is inactive"),
        (status = 404, description = "User or role not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn assign_role(
    State(state): State<AppState>,
    _auth: RequireUsersManage,
    Path(id): Path<UserId>,
    Json(dto): Json<AssignUserRoleDto>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let user = UserService::assign_role(&state.db, id, dto.role_id).await?;
    Ok(Json(ApiResponse::ok(user)))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/status",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    request_body = UserStatusDto,
    responses(
        (status = 200, description = "Active flag changed", body = UserProfile),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn set_user_status(
    State(state): State<AppState>,
    _auth: RequireUsersManage,
    Path(id): Path<UserId>,
    Json(dto): Json<UserStatusDto>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let user = UserService::set_active(&state.db, id, dto.is_active).await?;
    Ok(Json(ApiResponse::ok(user)))
}
