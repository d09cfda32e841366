use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use casedesk_auth::{Claims, verify_token};
use casedesk_core::AppError;
use casedesk_models::UserId;

use crate::state::AppState;

/// Extractor that validates the bearer token and exposes its claims.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.0.has_permission(permission)
    }

    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.0
            .user_id()
            .map(UserId::from)
            .ok_or_else(|| AppError::unauthorized("Identificador de usuario inválido en el token"))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Falta la cabecera de autorización"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Formato de cabecera de autorización inválido"))?;

        let claims = verify_token(token, &state.jwt_config)?;

        Ok(AuthUser(claims))
    }
}

/// Declares an extractor that requires one permission name in the token.
#[macro_export]
macro_rules! require_permission {
    ($name:ident, $permission:literal) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub $crate::middleware::auth::AuthUser);

        impl $name {
            pub const PERMISSION: &'static str = $permission;
        }

        impl axum::extract::FromRequestParts<$crate::state::AppState> for $name {
            type Rejection = casedesk_core::AppError;

            async fn from_request_parts(
                parts: &mut axum::http::request::Parts,
                state: &$crate::state::AppState,
            ) -> Result<Self, Self::Rejection> {
                let auth_user =
                    $crate::middleware::auth::AuthUser::from_request_parts(parts, state).await?;

                let allowed = auth_user.has_permission($permission);
                $crate::metrics::track_authorization_check(allowed, $permission);
                if !allowed {
                    return Err(casedesk_core::AppError::forbidden(format!(
                        "Acceso denegado. Permiso requerido: {}",
                        $permission
                    )));
                }

                Ok($name(auth_user))
            }
        }
    };
}

// Users
require_permission!(RequireUsersManage, "users.manage.all");

// Roles
require_permission!(RequireRolesRead, "roles.read.all");
require_permission!(RequireRolesManage, "roles.manage.all");

// Permission catalog
require_permission!(RequirePermissionsRead, "permissions.read.all");
require_permission!(RequirePermissionsManage, "permissions.manage.all");

// System parameters
require_permission!(RequireParametersRead, "parameters.read.all");
require_permission!(RequireParametersManage, "parameters.manage.all");

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn auth_user(permissions: &[&str]) -> AuthUser {
        AuthUser(Claims {
            sub: Uuid::from_u128(42).to_string(),
            email: "supervisor@casedesk.local".to_string(),
            role_id: Some(Uuid::from_u128(2)),
            role_name: Some("Supervisor".to_string()),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            exp: 9_999_999_999,
            iat: 1_234_567_890,
        })
    }

    #[test]
    fn test_has_permission() {
        let user = auth_user(&["roles.read.all", "casos.read.team"]);
        assert!(user.has_permission("roles.read.all"));
        assert!(!user.has_permission("roles.manage.all"));
    }

    #[test]
    fn test_user_id_from_claims() {
        let user = auth_user(&[]);
        assert_eq!(user.user_id().unwrap(), UserId::from_u128(42));
    }

    #[test]
    fn test_invalid_sub_is_unauthorized() {
        let mut user = auth_user(&[]);
        user.0.sub = "not-a-uuid".to_string();
        assert_eq!(user.user_id().unwrap_err().status.as_u16(), 401);
    }

    #[test]
    fn test_extractor_permission_names() {
        assert_eq!(RequireRolesManage::PERMISSION, "roles.manage.all");
        assert_eq!(RequireParametersRead::PERMISSION, "parameters.read.all");
    }
}
