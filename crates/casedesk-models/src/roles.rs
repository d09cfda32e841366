//! Role domain models and DTOs.

use crate::ids::{PermissionId, RoleId};
use crate::permissions::Permission;
use crate::validation::validate_not_blank;
use casedesk_core::serde::{deserialize_optional_bool, deserialize_optional_string};
use casedesk_core::{PaginationMeta, PaginationParams};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// The seeded administrator role. It can never be deleted or deactivated.
pub const SYSTEM_ADMIN_ROLE_ID: RoleId = RoleId::from_u128(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Role {
    pub fn is_system_role(&self) -> bool {
        self.id == SYSTEM_ADMIN_ROLE_ID
    }
}

/// Role row as listed, with aggregate counts.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RoleSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub role: Role,
    pub permission_count: i64,
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub user_count: i64,
}

// DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleDto {
    #[validate(
        length(
            min = 1,
            max = 100,
            message = "El nombre debe tener entre 1 y 100 caracteres"
        ),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 500, message = "La descripción no debe exceder 500 caracteres"))]
    pub description: Option<String>,
    /// Permission IDs to assign to this role
    pub permission_ids: Option<Vec<PermissionId>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleDto {
    #[validate(
        length(
            min = 1,
            max = 100,
            message = "El nombre debe tener entre 1 y 100 caracteres"
        ),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "La descripción no debe exceder 500 caracteres"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermissionsDto {
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CloneRoleDto {
    #[validate(
        length(
            min = 1,
            max = 100,
            message = "El nombre debe tener entre 1 y 100 caracteres"
        ),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    /// Defaults to the source role's description
    #[validate(length(max = 500, message = "La descripción no debe exceder 500 caracteres"))]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RoleFilterParams {
    /// Filter by active flag
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
    /// Case-insensitive substring of the role name
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedRolesResponse {
    pub items: Vec<RoleSummary>,
    pub meta: PaginationMeta,
}

/// What deleting a role would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeletionAction {
    Blocked,
    SoftDelete,
    HardDelete,
}

impl DeletionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionAction::Blocked => "blocked",
            DeletionAction::SoftDelete => "soft_delete",
            DeletionAction::HardDelete => "hard_delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoleDeletionSafety {
    pub role_id: RoleId,
    pub role_name: String,
    pub can_delete: bool,
    pub is_system_role: bool,
    pub user_count: i64,
    pub permission_count: i64,
    pub action: DeletionAction,
    pub reason: String,
}

impl RoleDeletionSafety {
    /// Decides the deletion mode from the role and its usage counts.
    pub fn evaluate(role: &Role, user_count: i64, permission_count: i64) -> Self {
        let is_system_role = role.is_system_role();
        let (action, reason) = if is_system_role {
            (
                DeletionAction::Blocked,
                "El rol de sistema no puede eliminarse".to_string(),
            )
        } else if user_count > 0 {
            (
                DeletionAction::SoftDelete,
                format!(
                    "El rol tiene {user_count} usuario(s) asignado(s); se desactivará en lugar de eliminarse"
                ),
            )
        } else {
            (
                DeletionAction::HardDelete,
                "El rol no tiene usuarios asignados y puede eliminarse".to_string(),
            )
        };

        Self {
            role_id: role.id,
            role_name: role.name.clone(),
            can_delete: action != DeletionAction::Blocked,
            is_system_role,
            user_count,
            permission_count,
            action,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoleDeletionOutcome {
    pub role_id: RoleId,
    pub action: DeletionAction,
    pub message: String,
}
