//! Permission catalog models.
//!
//! A permission is identified by the triple `(module, action, scope)` and its
//! canonical name is always `"{module}.{action}.{scope}"`.

use crate::ids::{PermissionId, RoleId};
use casedesk_core::serde::{
    deserialize_optional_bool, deserialize_optional_parsed, deserialize_optional_string,
};
use casedesk_core::{PaginationMeta, PaginationParams};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Breadth of a permission. Ordered `Own < Team < All`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Own,
    Team,
    All,
}

impl Scope {
    /// Scopes from broadest to narrowest.
    pub const BROADEST_FIRST: [Scope; 3] = [Scope::All, Scope::Team, Scope::Own];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Team => "team",
            Scope::All => "all",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidScope(pub String);

impl fmt::Display for InvalidScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alcance inválido: {}", self.0)
    }
}

impl std::error::Error for InvalidScope {}

impl FromStr for Scope {
    type Err = InvalidScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "own" => Ok(Scope::Own),
            "team" => Ok(Scope::Team),
            "all" => Ok(Scope::All),
            other => Err(InvalidScope(other.to_string())),
        }
    }
}

crate::text_enum_sqlx!(Scope);

/// Builds the canonical permission name for a triple.
pub fn permission_name(module: &str, action: &str, scope: Scope) -> String {
    format!("{module}.{action}.{scope}")
}

/// Splits a canonical permission name into its triple.
///
/// Returns `None` unless the name has exactly three non-empty segments and the
/// last one is a valid scope.
pub fn parse_permission_name(name: &str) -> Option<(&str, &str, Scope)> {
    let mut parts = name.split('.');
    let module = parts.next().filter(|s| !s.is_empty())?;
    let action = parts.next().filter(|s| !s.is_empty())?;
    let scope = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((module, action, scope))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub module: String,
    pub action: String,
    pub scope: Scope,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Permission {
    /// The name this row should carry given its triple.
    pub fn expected_name(&self) -> String {
        permission_name(&self.module, &self.action, self.scope)
    }
}

/// Module and action segments may not contain dots or whitespace, otherwise
/// the canonical name would be ambiguous.
fn validate_name_segment(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(|c| c == '.' || c.is_whitespace()) {
        let mut err = ValidationError::new("name_segment");
        err.message = Some("No puede contener puntos ni espacios".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePermissionDto {
    #[validate(
        length(min = 1, max = 60, message = "El módulo debe tener entre 1 y 60 caracteres"),
        custom(function = "validate_name_segment")
    )]
    pub module: String,
    #[validate(
        length(min = 1, max = 60, message = "La acción debe tener entre 1 y 60 caracteres"),
        custom(function = "validate_name_segment")
    )]
    pub action: String,
    #[serde(default)]
    pub scope: Scope,
    #[validate(length(max = 500, message = "La descripción no debe exceder 500 caracteres"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePermissionDto {
    #[validate(
        length(min = 1, max = 60, message = "El módulo debe tener entre 1 y 60 caracteres"),
        custom(function = "validate_name_segment")
    )]
    pub module: Option<String>,
    #[validate(
        length(min = 1, max = 60, message = "La acción debe tener entre 1 y 60 caracteres"),
        custom(function = "validate_name_segment")
    )]
    pub action: Option<String>,
    pub scope: Option<Scope>,
    #[validate(length(max = 500, message = "La descripción no debe exceder 500 caracteres"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionStatusDto {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PermissionFilterParams {
    /// Filter by module
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub module: Option<String>,
    /// Filter by active flag
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
    /// Case-insensitive substring of the name or description
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedPermissionsResponse {
    pub items: Vec<Permission>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ModulePermissions {
    pub module: String,
    pub permissions: Vec<Permission>,
}

/// Groups permissions by module, modules in ascending order. Permissions keep
/// their incoming order inside each group.
pub fn group_by_module(permissions: Vec<Permission>) -> Vec<ModulePermissions> {
    let mut grouped: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
    for permission in permissions {
        grouped
            .entry(permission.module.clone())
            .or_default()
            .push(permission);
    }

    grouped
        .into_iter()
        .map(|(module, permissions)| ModulePermissions {
            module,
            permissions,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RenamedPermission {
    pub id: PermissionId,
    pub old_name: String,
    pub new_name: String,
}

/// Result of rewriting permission names from their triples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RepairReport {
    /// Rows inspected
    pub checked: usize,
    /// Rows whose name was rewritten
    pub repaired: Vec<RenamedPermission>,
    /// Rows left untouched because the recomputed name belongs to another row
    pub conflicts: Vec<RenamedPermission>,
}

/// Query for a single permission check. Either `permission` or the
/// `module`/`action` pair must be given; `scope` defaults to `own`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionCheckQuery {
    pub permission: Option<String>,
    pub module: Option<String>,
    pub action: Option<String>,
    pub scope: Option<Scope>,
}

impl PermissionCheckQuery {
    /// Resolves the permission name to check, if the query is complete.
    pub fn permission_name(&self) -> Option<String> {
        if let Some(name) = self.permission.as_deref().map(str::trim) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        match (self.module.as_deref(), self.action.as_deref()) {
            (Some(module), Some(action)) if !module.is_empty() && !action.is_empty() => Some(
                permission_name(module, action, self.scope.unwrap_or_default()),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub permission: String,
    pub granted: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HighestScopeQuery {
    pub module: String,
    pub action: String,
}

/// Restricts the module grouping to one role's permissions.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ModuleGroupingQuery {
    #[serde(default, deserialize_with = "deserialize_optional_parsed")]
    pub role_id: Option<RoleId>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HighestScopeResponse {
    pub module: String,
    pub action: String,
    /// `null` when the role holds no scope of this permission
    pub scope: Option<Scope>,
}
