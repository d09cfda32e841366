use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use casedesk_cache::CacheStats;
use casedesk_core::{ApiResponse, AppError};
use casedesk_models::system_parameters::raw_from_json;
use casedesk_models::{
    CreateParameterDto, PaginatedParametersResponse, ParameterCategory, ParameterFilterParams,
    ParameterValueResponse, SetParameterValueDto, SetParameterValuesDto, SystemParameter,
    SystemParameterId, UpdateParameterDto, ValidateParameterDto, ValidationResult,
};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::middleware::auth::{RequireParametersManage, RequireParametersRead};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service;

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheClearResponse {
    /// Entries dropped from the cache
    pub removed: usize,
}

#[utoipa::path(
    get,
    path = "/api/system-parameters",
    params(
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Substring of key or description"),
        ("limit" = Option<i64>, Query, description = "Items per page (1-100)"),
        ("offset" = Option<i64>, Query, description = "Items to skip"),
        ("page" = Option<i64>, Query, description = "Page number, overrides offset")
    ),
    responses(
        (status = 200, description = "Parameters, encrypted values masked", body = PaginatedParametersResponse),
        (status = 403, description = "Forbidden - requires parameters.read.all")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn list_parameters(
    State(state): State<AppState>,
    _auth: RequireParametersRead,
    Query(filter): Query<ParameterFilterParams>,
) -> Result<Json<ApiResponse<PaginatedParametersResponse>>, AppError> {
    let parameters = service::list_parameters(&state.db, filter).await?;
    Ok(Json(ApiResponse::ok(parameters)))
}

#[utoipa::path(
    post,
    path = "/api/system-parameters",
    request_body = CreateParameterDto,
    responses(
        (status = 201, description = "Parameter created", body = SystemParameter),
        (status = 400, description = "Value or rules invalid"),
        (status = 409, description = "Key already exists"),
        (status = 422, description = "Validation error"),
        (status = 403, description = "Forbidden - requires parameters.manage.all")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, dto))]
pub async fn create_parameter(
    State(state): State<AppState>,
    _auth: RequireParametersManage,
    ValidatedJson(dto): ValidatedJson<CreateParameterDto>,
) -> Result<(StatusCode, Json<ApiResponse<SystemParameter>>), AppError> {
    let parameter = service::create_parameter(&state.db, &state.parameters, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(parameter, "Parámetro creado")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/system-parameters/categories",
    responses(
        (status = 200, description = "Categories with parameter counts", body = Vec<ParameterCategory>)
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    _auth: RequireParametersRead,
) -> Result<Json<ApiResponse<Vec<ParameterCategory>>>, AppError> {
    let categories = service::list_categories(&state.db).await?;
    Ok(Json(ApiResponse::ok(categories)))
}

#[utoipa::path(
    get,
    path = "/api/system-parameters/category/{category}",
    params(("category" = String, Path, description = "Category name")),
    responses(
        (status = 200, description = "Parameters in the category", body = Vec<SystemParameter>)
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_by_category(
    State(state): State<AppState>,
    _auth: RequireParametersRead,
    Path(category): Path<String>,
) -> Result<Json<ApiResponse<Vec<SystemParameter>>>, AppError> {
    let parameters = service::get_by_category(&state.db, &category).await?;
    Ok(Json(ApiResponse::ok(parameters)))
}

#[utoipa::path(
    get,
    path = "/api/system-parameters/key/{key}",
    params(("key" = String, Path, description = "Parameter key")),
    responses(
        (status = 200, description = "Active parameter, encrypted value masked", body = SystemParameter),
        (status = 404, description = "Unknown or inactive key")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_by_key(
    State(state): State<AppState>,
    _auth: RequireParametersRead,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<SystemParameter>>, AppError> {
    let parameter = service::get_parameter(&state.db, &state.parameters, &key)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Parámetro no encontrado")))?;
    Ok(Json(ApiResponse::ok(parameter.masked())))
}

#[utoipa::path(
    get,
    path = "/api/system-parameters/key/{key}/value",
    params(("key" = String, Path, description = "Parameter key")),
    responses(
        (status = 200, description = "Parsed value, falling back to the default", body = ParameterValueResponse),
        (status = 404, description = "Unknown or inactive key")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_value(
    State(state): State<AppState>,
    _auth: RequireParametersRead,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<ParameterValueResponse>>, AppError> {
    let value = service::get_value_response(&state.db, &state.parameters, &key).await?;
    Ok(Json(ApiResponse::ok(value)))
}

#[utoipa::path(
    put,
    path = "/api/system-parameters/key/{key}/value",
    params(("key" = String, Path, description = "Parameter key")),
    request_body = SetParameterValueDto,
    responses(
        (status = 200, description = "Value stored", body = SystemParameter),
        (status = 400, description = "Value fails the parameter's type or rules"),
        (status = 404, description = "Unknown key")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, dto))]
pub async fn set_value(
    State(state): State<AppState>,
    _auth: RequireParametersManage,
    Path(key): Path<String>,
    Json(dto): Json<SetParameterValueDto>,
) -> Result<Json<ApiResponse<SystemParameter>>, AppError> {
    let parameter =
        service::set_value(&state.db, &state.parameters, &key, raw_from_json(&dto.value)).await?;
    Ok(Json(ApiResponse::with_message(parameter, "Valor actualizado")))
}

#[utoipa::path(
    put,
    path = "/api/system-parameters/values",
    request_body = SetParameterValuesDto,
    responses(
        (status = 200, description = "All values stored", body = Vec<SystemParameter>),
        (status = 400, description = "A value is invalid, nothing was stored"),
        (status = 404, description = "A key is unknown, nothing was stored")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, dto))]
pub async fn set_values(
    State(state): State<AppState>,
    _auth: RequireParametersManage,
    Json(dto): Json<SetParameterValuesDto>,
) -> Result<Json<ApiResponse<Vec<SystemParameter>>>, AppError> {
    let parameters = service::set_values(&state.db, &state.parameters, dto.values).await?;
    Ok(Json(ApiResponse::with_message(parameters, "Valores actualizados")))
}

#[utoipa::path(
    get,
    path = "/api/system-parameters/{id}",
    params(("id" = uuid::Uuid, Path, description = "Parameter ID")),
    responses(
        (status = 200, description = "Parameter, encrypted value masked", body = SystemParameter),
        (status = 404, description = "Parameter not found")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_parameter(
    State(state): State<AppState>,
    _auth: RequireParametersRead,
    Path(id): Path<SystemParameterId>,
) -> Result<Json<ApiResponse<SystemParameter>>, AppError> {
    let parameter = service::get_parameter_by_id(&state.db, id).await?;
    Ok(Json(ApiResponse::ok(parameter)))
}

#[utoipa::path(
    put,
    path = "/api/system-parameters/{id}",
    params(("id" = uuid::Uuid, Path, description = "Parameter ID")),
    request_body = UpdateParameterDto,
    responses(
        (status = 200, description = "Parameter updated", body = SystemParameter),
        (status = 400, description = "Effective value or rules invalid"),
        (status = 404, description = "Parameter not found")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, dto))]
pub async fn update_parameter(
    State(state): State<AppState>,
    _auth: RequireParametersManage,
    Path(id): Path<SystemParameterId>,
    ValidatedJson(dto): ValidatedJson<UpdateParameterDto>,
) -> Result<Json<ApiResponse<SystemParameter>>, AppError> {
    let parameter = service::update_parameter(&state.db, &state.parameters, id, dto).await?;
    Ok(Json(ApiResponse::with_message(parameter, "Parámetro actualizado")))
}

#[utoipa::path(
    delete,
    path = "/api/system-parameters/{id}",
    params(("id" = uuid::Uuid, Path, description = "Parameter ID")),
    responses(
        (status = 204, description = "Parameter deleted"),
        (status = 400, description = "Required parameters cannot be deleted"),
        (status = 404, description = "Parameter not found")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_parameter(
    State(state): State<AppState>,
    _auth: RequireParametersManage,
    Path(id): Path<SystemParameterId>,
) -> Result<StatusCode, AppError> {
    service::delete_parameter(&state.db, &state.parameters, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/system-parameters/validate",
    request_body = ValidateParameterDto,
    responses(
        (status = 200, description = "Validation outcome, nothing is stored", body = ValidationResult),
        (status = 400, description = "Neither parameter_key nor parameter_type given"),
        (status = 404, description = "Unknown parameter_key")
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, dto))]
pub async fn validate_value(
    State(state): State<AppState>,
    _auth: RequireParametersRead,
    Json(dto): Json<ValidateParameterDto>,
) -> Result<Json<ApiResponse<ValidationResult>>, AppError> {
    let result = service::validate(&state.db, dto).await?;
    Ok(Json(ApiResponse::ok(result)))
}

#[utoipa::path(
    get,
    path = "/api/system-parameters/cache",
    responses(
        (status = 200, description = "Cache size, hit/miss counters and TTL", body = CacheStats)
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn cache_stats(
    State(state): State<AppState>,
    _auth: RequireParametersManage,
) -> Json<ApiResponse<CacheStats>> {
    Json(ApiResponse::ok(service::cache_stats(&state.parameters)))
}

#[utoipa::path(
    delete,
    path = "/api/system-parameters/cache",
    responses(
        (status = 200, description = "Cache emptied", body = CacheClearResponse)
    ),
    tag = "System Parameters",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn clear_cache(
    State(state): State<AppState>,
    _auth: RequireParametersManage,
) -> Json<ApiResponse<CacheClearResponse>> {
    let removed = service::clear_cache(&state.parameters);
    Json(ApiResponse::with_message(
        CacheClearResponse { removed },
        "Caché de parámetros vaciada",
    ))
}
