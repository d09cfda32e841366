use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use casedesk_cache::CacheStats;
use casedesk_core::{PaginationMeta, PaginationParams};
use casedesk_models::{
    AssignPermissionsDto, AssignUserRoleDto, CloneRoleDto, CreateParameterDto,
    CreatePermissionDto, CreateRoleDto, CreateUserDto, DeletionAction, HighestScopeResponse,
    LoginRequest, LoginResponse, ModulePermissions, PaginatedParametersResponse,
    PaginatedPermissionsResponse, PaginatedRolesResponse, PaginatedUsersResponse,
    ParameterCategory, ParameterType, ParameterValueResponse, Permission,
    PermissionCheckResponse, PermissionStatusDto, RenamedPermission, RepairReport, Role,
    RoleDeletionOutcome, RoleDeletionSafety, RoleSummary, RoleWithPermissions, Scope,
    SetParameterValueDto, SetParameterValuesDto, SystemParameter, UpdateParameterDto,
    UpdatePermissionDto, UpdateRoleDto, UserProfile, UserStatusDto, ValidateParameterDto,
    ValidationResult, ValidationRules,
};

use crate::modules::auth::controller::ErrorResponse;
use crate::modules::system_parameters::controller::CacheClearResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::controller::login_user,
        crate::modules::users::controller::get_profile,
        crate::modules::users::controller::list_users,
        crate::modules::users::controller::create_user,
        crate::modules::users::controller::assign_role,
        crate::modules::users::controller::set_user_status,
        crate::modules::roles::controller::list_roles,
        crate::modules::roles::controller::create_role,
        crate::modules::roles::controller::get_role,
        crate::modules::roles::controller::update_role,
        crate::modules::roles::controller::delete_role,
        crate::modules::roles::controller::get_deletion_safety,
        crate::modules::roles::controller::clone_role,
        crate::modules::roles::controller::get_role_users,
        crate::modules::roles::controller::assign_permissions,
        crate::modules::roles::controller::remove_permission,
        crate::modules::roles::controller::get_permissions_by_module,
        crate::modules::roles::controller::get_highest_scope,
        crate::modules::roles::controller::check_permission,
        crate::modules::permissions::controller::list_permissions,
        crate::modules::permissions::controller::create_permission,
        crate::modules::permissions::controller::list_modules,
        crate::modules::permissions::controller::get_permissions_by_module,
        crate::modules::permissions::controller::get_permission,
        crate::modules::permissions::controller::update_permission,
        crate::modules::permissions::controller::set_permission_status,
        crate::modules::permissions::controller::repair_permission_names,
        crate::modules::system_parameters::controller::list_parameters,
        crate::modules::system_parameters::controller::create_parameter,
        crate::modules::system_parameters::controller::list_categories,
        crate::modules::system_parameters::controller::get_by_category,
        crate::modules::system_parameters::controller::get_by_key,
        crate::modules::system_parameters::controller::get_value,
        crate::modules::system_parameters::controller::set_value,
        crate::modules::system_parameters::controller::set_values,
        crate::modules::system_parameters::controller::get_parameter,
        crate::modules::system_parameters::controller::update_parameter,
        crate::modules::system_parameters::controller::delete_parameter,
        crate::modules::system_parameters::controller::validate_value,
        crate::modules::system_parameters::controller::cache_stats,
        crate::modules::system_parameters::controller::clear_cache,
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            ErrorResponse,
            UserProfile,
            CreateUserDto,
            AssignUserRoleDto,
            UserStatusDto,
            PaginatedUsersResponse,
            Role,
            RoleSummary,
            RoleWithPermissions,
            CreateRoleDto,
            UpdateRoleDto,
            CloneRoleDto,
            AssignPermissionsDto,
            PaginatedRolesResponse,
            DeletionAction,
            RoleDeletionSafety,
            RoleDeletionOutcome,
            Scope,
            Permission,
            CreatePermissionDto,
            UpdatePermissionDto,
            PermissionStatusDto,
            PaginatedPermissionsResponse,
            ModulePermissions,
            RenamedPermission,
            RepairReport,
            PermissionCheckResponse,
            HighestScopeResponse,
            ParameterType,
            ValidationRules,
            SystemParameter,
            CreateParameterDto,
            UpdateParameterDto,
            SetParameterValueDto,
            SetParameterValuesDto,
            ValidateParameterDto,
            ValidationResult,
            PaginatedParametersResponse,
            ParameterCategory,
            ParameterValueResponse,
            CacheStats,
            CacheClearResponse,
            PaginationMeta,
            PaginationParams,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login and token issuance"),
        (name = "Users", description = "User profiles and role assignment"),
        (name = "Roles", description = "Roles, permission sets and deletion safety"),
        (name = "Permissions", description = "Permission catalog and name repair"),
        (name = "System Parameters", description = "Typed configuration values with validation and encryption")
    ),
    info(
        title = "Casedesk API",
        version = "0.1.0",
        description = "Access control and system configuration for a case-management platform, built with Rust, Axum and PostgreSQL.",
        contact(
            name = "API Support",
            email = "support@casedesk.local"
        ),
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
