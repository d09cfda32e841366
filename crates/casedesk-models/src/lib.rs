//! # Casedesk Models
//!
//! Domain models and DTOs for the Casedesk API.
//!
//! # Modules
//!
//! - [`auth`]: Login request/response
//! - [`ids`]: Strongly-typed entity IDs
//! - [`permissions`]: Permission catalog, scopes and name helpers
//! - [`roles`]: Roles, deletion safety and role DTOs
//! - [`system_parameters`]: Typed parameters, validation rules and coercion
//! - [`users`]: User profiles and user DTOs
//!
//! # Example
//!
//! ```ignore
//! use casedesk_models::permissions::{Scope, permission_name};
//! use casedesk_models::roles::SYSTEM_ADMIN_ROLE_ID;
//!
//! let name = permission_name("casos", "read", Scope::Team);
//! assert_eq!(name, "casos.read.team");
//! ```

pub mod auth;
pub mod ids;
pub mod permissions;
pub mod roles;
pub mod system_parameters;
pub mod users;
mod validation;

/// Implements sqlx `Type`/`Encode`/`Decode` for a fieldless enum stored as
/// text. The enum must provide `as_str()` and `FromStr`.
#[macro_export]
#[doc(hidden)]
macro_rules! text_enum_sqlx {
    ($name:ident) => {
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> ::sqlx::Encode<'q, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <::sqlx::Postgres as ::sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <&str as ::sqlx::Encode<'q, ::sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: <::sqlx::Postgres as ::sqlx::Database>::ValueRef<'r>,
            ) -> Result<Self, ::sqlx::error::BoxDynError> {
                let raw = <&str as ::sqlx::Decode<'r, ::sqlx::Postgres>>::decode(value)?;
                Ok(raw.parse::<$name>()?)
            }
        }
    };
}

// Re-export commonly used types at crate root for convenience
pub use auth::{LoginRequest, LoginResponse};

pub use ids::{PermissionId, RoleId, SystemParameterId, UserId};

pub use permissions::{
    CreatePermissionDto, HighestScopeQuery, HighestScopeResponse, ModuleGroupingQuery,
    ModulePermissions, PaginatedPermissionsResponse, Permission, PermissionCheckQuery,
    PermissionCheckResponse, PermissionFilterParams, PermissionStatusDto, RenamedPermission,
    RepairReport, Scope, UpdatePermissionDto, group_by_module, parse_permission_name,
    permission_name,
};

pub use roles::{
    AssignPermissionsDto, CloneRoleDto, CreateRoleDto, DeletionAction, PaginatedRolesResponse,
    Role, RoleDeletionOutcome, RoleDeletionSafety, RoleFilterParams, RoleSummary,
    RoleWithPermissions, SYSTEM_ADMIN_ROLE_ID, UpdateRoleDto,
};

pub use system_parameters::{
    CreateParameterDto, MASKED_VALUE, PaginatedParametersResponse, ParameterCategory,
    ParameterFilterParams, ParameterType, ParameterValue, ParameterValueResponse,
    SetParameterValueDto, SetParameterValuesDto, SystemParameter, UpdateParameterDto,
    ValidateParameterDto, ValidationResult, ValidationRules,
};

pub use users::{
    AssignUserRoleDto, CreateUserDto, PaginatedUsersResponse, UserCredentials, UserFilterParams,
    UserProfile, UserStatusDto,
};
