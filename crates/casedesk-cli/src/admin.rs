use anyhow::anyhow;
use casedesk::modules::users::UserService;
use casedesk::validator::format_errors;
use casedesk_core::AppError;
use casedesk_models::{CreateUserDto, SYSTEM_ADMIN_ROLE_ID, UserProfile};
use sqlx::PgPool;
use validator::Validate;

/// Creates a user holding the system administrator role.
///
/// The email and password go through the same validation as the users
/// endpoint.
pub async fn create_admin(
    db: &PgPool,
    email: &str,
    full_name: Option<String>,
    password: &str,
) -> Result<UserProfile, AppError> {
    let dto = CreateUserDto {
        email: email.to_string(),
        full_name,
        password: password.to_string(),
        role_id: Some(SYSTEM_ADMIN_ROLE_ID),
    };
    dto.validate()
        .map_err(|errors| AppError::unprocessable(anyhow!("{}", format_errors(&errors))))?;

    UserService::create_user(db, dto).await
}
