use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use casedesk_core::{ApiResponse, AppError};
use casedesk_models::{
    CreatePermissionDto, ModuleGroupingQuery, ModulePermissions, PaginatedPermissionsResponse,
    Permission, PermissionFilterParams, PermissionId, PermissionStatusDto, RepairReport,
    UpdatePermissionDto,
};
use tracing::instrument;

use crate::middleware::auth::{RequirePermissionsManage, RequirePermissionsRead};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service;

#[utoipa::path(
    get,
    path = "/api/permissions",
    params(
        ("module" = Option<String>, Query, description = "Filter by module"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Substring of name or description"),
        ("limit" = Option<i64>, Query, description = "Items per page (1-100)"),
        ("offset" = Option<i64>, Query, description = "Items to skip"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Paginated permission catalog", body = PaginatedPermissionsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires permissions.read.all")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn list_permissions(
    State(state): State<AppState>,
    _auth: RequirePermissionsRead,
    Query(filter): Query<PermissionFilterParams>,
) -> Result<Json<ApiResponse<PaginatedPermissionsResponse>>, AppError> {
    let result = service::list_permissions(&state.db, filter).await?;
    Ok(Json(ApiResponse::ok(result)))
}

#[utoipa::path(
    post,
    path = "/api/permissions",
    request_body = CreatePermissionDto,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "A permission with the same name exists"),
        (status = 422, description = "Validation error"),
        (status = 403, description = "Forbidden - requires permissions.manage.all")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_permission(
    State(state): State<AppState>,
    _auth: RequirePermissionsManage,
    ValidatedJson(dto): ValidatedJson<CreatePermissionDto>,
) -> Result<(StatusCode, Json<ApiResponse<Permission>>), AppError> {
    let permission = service::create_permission(&state.db, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(permission, "Permiso creado")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/permissions/modules",
    responses(
        (status = 200, description = "Distinct module names", body = Vec<String>),
        (status = 403, description = "Forbidden - requires permissions.read.all")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn list_modules(
    State(state): State<AppState>,
    _auth: RequirePermissionsRead,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let modules = service::list_modules(&state.db).await?;
    Ok(Json(ApiResponse::ok(modules)))
}

#[utoipa::path(
    get,
    path = "/api/permissions/by-module",
    params(
        ("role_id" = Option<uuid::Uuid>, Query, description = "Only this role's permissions")
    ),
    responses(
        (status = 200, description = "Permissions grouped by module", body = Vec<ModulePermissions>),
        (status = 403, description = "Forbidden - requires permissions.read.all")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_permissions_by_module(
    State(state): State<AppState>,
    _auth: RequirePermissionsRead,
    Query(query): Query<ModuleGroupingQuery>,
) -> Result<Json<ApiResponse<Vec<ModulePermissions>>>, AppError> {
    let groups = service::get_permissions_by_module(&state.db, query.role_id).await?;
    Ok(Json(ApiResponse::ok(groups)))
}

#[utoipa::path(
    get,
    path = "/api/permissions/{id}",
    params(("id" = uuid::Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Permission", body = Permission),
        (status = 404, description = "Permission not found")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_permission(
    State(state): State<AppState>,
    _auth: RequirePermissionsRead,
    Path(id): Path<PermissionId>,
) -> Result<Json<ApiResponse<Permission>>, AppError> {
    let permission = service::get_permission_by_id(&state.db, id).await?;
    Ok(Json(ApiResponse::ok(permission)))
}

#[utoipa::path(
    put,
    path = "/api/permissions/{id}",
    params(("id" = uuid::Uuid, Path, description = "Permission ID")),
    request_body = UpdatePermissionDto,
    responses(
        (status = 200, description = "Permission updated, name recomputed", body = Permission),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Recomputed name belongs to another permission")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_permission(
    State(state): State<AppState>,
    _auth: RequirePermissionsManage,
    Path(id): Path<PermissionId>,
    ValidatedJson(dto): ValidatedJson<UpdatePermissionDto>,
) -> Result<Json<ApiResponse<Permission>>, AppError> {
    let permission = service::update_permission(&state.db, id, dto).await?;
    Ok(Json(ApiResponse::with_message(permission, "Permiso actualizado")))
}

#[utoipa::path(
    patch,
    path = "/api/permissions/{id}/status",
    params(("id" = uuid::Uuid, Path, description = "Permission ID")),
    request_body = PermissionStatusDto,
    responses(
        (status = 200, description = "Active flag changed", body = Permission),
        (status = 404, description = "Permission not found")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn set_permission_status(
    State(state): State<AppState>,
    _auth: RequirePermissionsManage,
    Path(id): Path<PermissionId>,
    Json(dto): Json<PermissionStatusDto>,
) -> Result<Json<ApiResponse<Permission>>, AppError> {
    let permission = service::set_permission_active(&state.db, id, dto.is_active).await?;
    Ok(Json(ApiResponse::ok(permission)))
}

#[utoipa::path(
    post,
    path = "/api/permissions/repair-names",
    responses(
        (status = 200, description = "Rows renamed and conflicts found", body = RepairReport),
        (status = 403, description = "Forbidden - requires permissions.manage.all")
    ),
    tag = "Permissions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn repair_permission_names(
    State(state): State<AppState>,
    _auth: RequirePermissionsManage,
) -> Result<Json<ApiResponse<RepairReport>>, AppError> {
    let report = service::repair_permission_names(&state.db).await?;
    Ok(Json(ApiResponse::ok(report)))
}
