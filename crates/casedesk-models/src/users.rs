//! User profile models and DTOs.

use crate::ids::{RoleId, UserId};
use casedesk_core::serde::{
    deserialize_optional_bool, deserialize_optional_parsed, deserialize_optional_string,
};
use casedesk_core::{PaginationMeta, PaginationParams};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// A user profile. `role_name` is a denormalized copy of the role's name and
/// is rewritten whenever the role changes or is renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub role_id: Option<RoleId>,
    pub role_name: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Profile row including the password hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub profile: UserProfile,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct CreateUserDto {
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    #[validate(length(max = 200, message = "El nombre no debe exceder 200 caracteres"))]
    pub full_name: Option<String>,
    #[validate(length(min = 8, message = "La contraseña debe tener al menos 8 caracteres"))]
    pub password: String,
    pub role_id: Option<RoleId>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignUserRoleDto {
    /// `null` removes the user's role
    pub role_id: Option<RoleId>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserStatusDto {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_parsed")]
    pub role_id: Option<RoleId>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
    /// Case-insensitive substring of the email or full name
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedUsersResponse {
    pub items: Vec<UserProfile>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_dto_validation() {
        let dto = CreateUserDto {
            email: "agente@casedesk.local".into(),
            full_name: Some("Ana Agente".into()),
            password: "supersecreta".into(),
            role_id: None,
        };
        assert!(dto.validate().is_ok());

        let bad_email = CreateUserDto {
            email: "not-an-email".into(),
            ..dto.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_password = CreateUserDto {
            password: "corta".into(),
            ..dto
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_user_filter_parses_role_id() {
        let filter: UserFilterParams = serde_json::from_str(
            r#"{"role_id":"00000000-0000-0000-0000-000000000003","is_active":"1"}"#,
        )
        .unwrap();
        assert_eq!(filter.role_id, Some(RoleId::from_u128(3)));
        assert_eq!(filter.is_active, Some(true));
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_profile_has_no_password_field() {
        let now = chrono::Utc::now();
        let profile = UserProfile {
            id: UserId::new(),
            email: "a@b.co".into(),
            full_name: None,
            role_id: None,
            role_name: None,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password").is_none());
    }
}
