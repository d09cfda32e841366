use casedesk_auth::create_access_token;
use casedesk_config::JwtConfig;
use casedesk_core::{AppError, verify_password};
use casedesk_models::{LoginRequest, LoginResponse, RoleId, UserCredentials, UserProfile};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::metrics::{track_jwt_issued, track_user_login_failure, track_user_login_success};
use crate::modules::users::service::USER_COLUMNS;

const INVALID_CREDENTIALS: &str = "Credenciales inválidas";

pub struct AuthService;

impl AuthService {
    /// Active permission names of an active role. Empty for an inactive role.
    #[instrument(skip(db))]
    pub async fn granted_permissions(db: &PgPool, role_id: RoleId) -> Result<Vec<String>, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"SELECT p.name
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            JOIN roles r ON r.id = rp.role_id
            WHERE rp.role_id = $1 AND r.is_active = true AND p.is_active = true
            ORDER BY p.name"#,
        )
        .bind(role_id)
        .fetch_all(db)
        .await?;
        Ok(names)
    }

    #[instrument(skip(db, dto, jwt_config), fields(user.email = %dto.email))]
    pub async fn login_user(
        db: &PgPool,
        dto: LoginRequest,
        jwt_config: &JwtConfig,
    ) -> Result<LoginResponse, AppError> {
        let sql = format!(
            "SELECT {}, password FROM user_profiles WHERE email = $1",
            USER_COLUMNS
        );
        let Some(credentials) = sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(dto.email.trim().to_lowercase())
            .fetch_optional(db)
            .await?
        else {
            track_user_login_failure("unknown_email");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        if !verify_password(&dto.password, &credentials.password)? {
            track_user_login_failure("bad_password");
            warn!(user.id = %credentials.profile.id, "Login rejected: wrong password");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        if !credentials.profile.is_active {
            track_user_login_failure("inactive");
            return Err(AppError::unauthorized("Usuario inactivo"));
        }

        let permissions = match credentials.profile.role_id {
            Some(role_id) => Self::granted_permissions(db, role_id).await?,
            None => Vec::new(),
        };

        let update_sql = format!(
            "UPDATE user_profiles SET last_login_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, UserProfile>(&update_sql)
            .bind(credentials.profile.id)
            .fetch_one(db)
            .await?;

        let access_token = create_access_token(
            user.id.into_inner(),
            &user.email,
            user.role_id.map(RoleId::into_inner),
            user.role_name.clone(),
            permissions.clone(),
            jwt_config,
        )?;

        track_jwt_issued();
        track_user_login_success(user.role_name.as_deref().unwrap_or("none"));
        info!(user.id = %user.id, permissions = permissions.len(), "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: jwt_config.access_token_expiry,
            user,
            permissions,
        })
    }
}
