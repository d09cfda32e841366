use axum::{Json, extract::State};
use casedesk_core::{ApiResponse, AppError};
use casedesk_models::{LoginRequest, LoginResponse};
use tracing::instrument;
use utoipa::ToSchema;

use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::AuthService;

/// Body of every error response.
#[derive(ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    /// Canonical HTTP reason, e.g. `Not Found`
    pub error: String,
    pub message: String,
}

/// Login and receive a JWT access token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials or inactive user", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, dto))]
pub async fn login_user(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let response = AuthService::login_user(&state.db, dto, &state.jwt_config).await?;
    Ok(Json(ApiResponse::ok(response)))
}
