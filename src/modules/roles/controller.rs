use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use casedesk_core::{ApiResponse, AppError};
use casedesk_models::{
    AssignPermissionsDto, CloneRoleDto, CreateRoleDto, HighestScopeQuery, HighestScopeResponse,
    ModulePermissions, PaginatedRolesResponse, PermissionCheckQuery, PermissionCheckResponse,
    PermissionId, Role, RoleDeletionOutcome, RoleDeletionSafety, RoleFilterParams, RoleId,
    RoleWithPermissions, UpdateRoleDto, UserProfile,
};
use tracing::instrument;

use crate::middleware::auth::{RequireRolesManage, RequireRolesRead};
use crate::modules::permissions::service as permission_service;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service;

// ============ Role CRUD ============

#[utoipa::path(
    get,
    path = "/api/roles",
    params(
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Case-insensitive substring of the name"),
        ("limit" = Option<i64>, Query, description = "Items per page (1-100)"),
        ("offset" = Option<i64>, Query, description = "Items to skip"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Roles with permission and user counts", body = PaginatedRolesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires roles.read.all")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn list_roles(
    State(state): State<AppState>,
    _auth: RequireRolesRead,
    Query(filter): Query<RoleFilterParams>,
) -> Result<Json<ApiResponse<PaginatedRolesResponse>>, AppError> {
    let roles = service::list_roles(&state.db, filter).await?;
    Ok(Json(ApiResponse::ok(roles)))
}

#[utoipa::path(
    post,
    path = "/api/roles",
    request_body = CreateRoleDto,
    responses(
        (status = 201, description = "Role created", body = RoleWithPermissions),
        (status = 400, description = "Unknown permission ids"),
        (status = 409, description = "Role name already exists"),
        (status = 422, description = "Validation error"),
        (status = 403, description = "Forbidden - requires roles.manage.all")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_role(
    State(state): State<AppState>,
    _auth: RequireRolesManage,
    ValidatedJson(dto): ValidatedJson<CreateRoleDto>,
) -> Result<(StatusCode, Json<ApiResponse<RoleWithPermissions>>), AppError> {
    let role = service::create_role(&state.db, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(role, "Rol creado")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role with every assigned permission", body = RoleWithPermissions),
        (status = 404, description = "Role not found")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_role(
    State(state): State<AppState>,
    _auth: RequireRolesRead,
    Path(id): Path<RoleId>,
) -> Result<Json<ApiResponse<RoleWithPermissions>>, AppError> {
    let role = service::get_role_by_id(&state.db, id).await?;
    Ok(Json(ApiResponse::ok(role)))
}

#[utoipa::path(
    put,
    path = "/api/roles/{id}",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleDto,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 403, description = "The system role cannot be deactivated"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role name already exists")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_role(
    State(state): State<AppState>,
    _auth: RequireRolesManage,
    Path(id): Path<RoleId>,
    ValidatedJson(dto): ValidatedJson<UpdateRoleDto>,
) -> Result<Json<ApiResponse<Role>>, AppError> {
    let role = service::update_role(&state.db, id, dto).await?;
    Ok(Json(ApiResponse::with_message(role, "Rol actualizado")))
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted, or deactivated when users still hold it", body = RoleDeletionOutcome),
        (status = 403, description = "The system role cannot be deleted"),
        (status = 404, description = "Role not found")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_role(
    State(state): State<AppState>,
    _auth: RequireRolesManage,
    Path(id): Path<RoleId>,
) -> Result<Json<ApiResponse<RoleDeletionOutcome>>, AppError> {
    let outcome = service::delete_role(&state.db, id).await?;
    let message = outcome.message.clone();
    Ok(Json(ApiResponse::with_message(outcome, message)))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}/deletion-safety",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "What deleting the role would do", body = RoleDeletionSafety),
        (status = 404, description = "Role not found")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_deletion_safety(
    State(state): State<AppState>,
    _auth: RequireRolesRead,
    Path(id): Path<RoleId>,
) -> Result<Json<ApiResponse<RoleDeletionSafety>>, AppError> {
    let safety = service::get_deletion_safety(&state.db, id).await?;
    Ok(Json(ApiResponse::ok(safety)))
}

#[utoipa::path(
    post,
    path = "/api/roles/{id}/clone",
    params(("id" = uuid::Uuid, Path, description = "Source role ID")),
    request_body = CloneRoleDto,
    responses(
        (status = 201, description = "Role cloned with the source's permissions", body = RoleWithPermissions),
        (status = 404, description = "Source role not found"),
        (status = 409, description = "Role name already exists")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn clone_role(
    State(state): State<AppState>,
    _auth: RequireRolesManage,
    Path(id): Path<RoleId>,
    ValidatedJson(dto): ValidatedJson<CloneRoleDto>,
) -> Result<(StatusCode, Json<ApiResponse<RoleWithPermissions>>), AppError> {
    let role = service::clone_role(&state.db, id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(role, "Rol clonado")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}/users",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Users holding the role", body = Vec<UserProfile>),
        (status = 404, description = "Role not found")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_role_users(
    State(state): State<AppState>,
    _auth: RequireRolesRead,
    Path(id): Path<RoleId>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, AppError> {
    let users = service::get_role_users(&state.db, id).await?;
    Ok(Json(ApiResponse::ok(users)))
}

// ============ Role Permissions ============

#[utoipa::path(
    put,
    path = "/api/roles/{id}/permissions",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    request_body = AssignPermissionsDto,
    responses(
        (status = 200, description = "Permission set replaced", body = RoleWithPermissions),
        (status = 400, description = "Unknown permission ids"),
        (status = 404, description = "Role not found")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn assign_permissions(
    State(state): State<AppState>,
    _auth: RequireRolesManage,
    Path(id): Path<RoleId>,
    Json(dto): Json<AssignPermissionsDto>,
) -> Result<Json<ApiResponse<RoleWithPermissions>>, AppError> {
    let role = service::assign_permissions_to_role(&state.db, id, &dto.permission_ids).await?;
    Ok(Json(ApiResponse::with_message(role, "Permisos asignados")))
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}/permissions/{permission_id}",
    params(
        ("id" = uuid::Uuid, Path, description = "Role ID"),
        ("permission_id" = uuid::Uuid, Path, description = "Permission ID")
    ),
    responses(
        (status = 204, description = "Permission removed from the role"),
        (status = 404, description = "Role not found or permission not assigned")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn remove_permission(
    State(state): State<AppState>,
    _auth: RequireRolesManage,
    Path((id, permission_id)): Path<(RoleId, PermissionId)>,
) -> Result<StatusCode, AppError> {
    service::remove_permission_from_role(&state.db, id, permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}/permissions/by-module",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "The role's active permissions grouped by module", body = Vec<ModulePermissions>)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_permissions_by_module(
    State(state): State<AppState>,
    _auth: RequireRolesRead,
    Path(id): Path<RoleId>,
) -> Result<Json<ApiResponse<Vec<ModulePermissions>>>, AppError> {
    let groups = permission_service::get_permissions_by_module(&state.db, Some(id)).await?;
    Ok(Json(ApiResponse::ok(groups)))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}/highest-scope",
    params(
        ("id" = uuid::Uuid, Path, description = "Role ID"),
        ("module" = String, Query, description = "Permission module"),
        ("action" = String, Query, description = "Permission action")
    ),
    responses(
        (status = 200, description = "Broadest scope held, or null", body = HighestScopeResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_highest_scope(
    State(state): State<AppState>,
    _auth: RequireRolesRead,
    Path(id): Path<RoleId>,
    Query(query): Query<HighestScopeQuery>,
) -> Result<Json<ApiResponse<HighestScopeResponse>>, AppError> {
    let scope =
        permission_service::get_highest_scope(&state.db, id, &query.module, &query.action).await?;
    Ok(Json(ApiResponse::ok(HighestScopeResponse {
        module: query.module,
        action: query.action,
        scope,
    })))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}/check",
    params(
        ("id" = uuid::Uuid, Path, description = "Role ID"),
        ("permission" = Option<String>, Query, description = "Full permission name"),
        ("module" = Option<String>, Query, description = "Module, used with action"),
        ("action" = Option<String>, Query, description = "Action, used with module"),
        ("scope" = Option<String>, Query, description = "own, team or all (default own)")
    ),
    responses(
        (status = 200, description = "Whether the role holds the permission", body = PermissionCheckResponse),
        (status = 400, description = "Neither permission nor module and action given")
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn check_permission(
    State(state): State<AppState>,
    _auth: RequireRolesRead,
    Path(id): Path<RoleId>,
    Query(query): Query<PermissionCheckQuery>,
) -> Result<Json<ApiResponse<PermissionCheckResponse>>, AppError> {
    let permission = query.permission_name().ok_or_else(|| {
        AppError::bad_request(anyhow!("Indique 'permission' o bien 'module' y 'action'"))
    })?;
    let granted = permission_service::has_permission(&state.db, id, &permission).await?;
    Ok(Json(ApiResponse::ok(PermissionCheckResponse {
        permission,
        granted,
    })))
}
