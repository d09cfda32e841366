use anyhow::anyhow;
use casedesk_core::errors::is_unique_violation;
use casedesk_core::{AppError, PaginationMeta};
use casedesk_models::{
    CreatePermissionDto, ModulePermissions, PaginatedPermissionsResponse, Permission,
    PermissionFilterParams, PermissionId, RenamedPermission, RepairReport, RoleId, Scope,
    UpdatePermissionDto, UserId, group_by_module, permission_name,
};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::metrics::track_permission_check;

const PERMISSION_COLUMNS: &str =
    "id, name, module, action, scope, description, is_active, created_at, updated_at";

/// `ORDER BY` fragment ranking `column` from the narrowest scope to the broadest.
pub(crate) fn scope_order(column: &str) -> String {
    format!("CASE {column} WHEN 'own' THEN 0 WHEN 'team' THEN 1 ELSE 2 END")
}

fn duplicate_name(name: &str) -> AppError {
    AppError::conflict(anyhow!("Ya existe un permiso con el nombre {}", name))
}

// ============ Checks ============

/// True when the role holds the active permission called `permission_name`.
/// Unknown or inactive permissions are never granted.
#[instrument(skip(db))]
pub async fn has_permission(
    db: &PgPool,
    role_id: RoleId,
    permission_name: &str,
) -> Result<bool, AppError> {
    let granted: bool = sqlx::query_scalar(
        r#"SELECT EXISTS (
            SELECT 1
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1 AND p.name = $2 AND p.is_active = true
        )"#,
    )
    .bind(role_id)
    .bind(permission_name)
    .fetch_one(db)
    .await?;

    track_permission_check(granted);
    Ok(granted)
}

#[instrument(skip(db))]
pub async fn has_permission_with_scope(
    db: &PgPool,
    role_id: RoleId,
    module: &str,
    action: &str,
    scope: Scope,
) -> Result<bool, AppError> {
    has_permission(db, role_id, &permission_name(module, action, scope)).await
}

/// Broadest scope the role holds for `module.action`, trying `all` first.
#[instrument(skip(db))]
pub async fn get_highest_scope(
    db: &PgPool,
    role_id: RoleId,
    module: &str,
    action: &str,
) -> Result<Option<Scope>, AppError> {
    for scope in Scope::BROADEST_FIRST {
        if has_permission_with_scope(db, role_id, module, action, scope).await? {
            return Ok(Some(scope));
        }
    }
    Ok(None)
}

/// Checks a permission through the user's role. Inactive users and inactive
/// roles hold nothing.
#[instrument(skip(db))]
pub async fn user_has_permission(
    db: &PgPool,
    user_id: UserId,
    permission_name: &str,
) -> Result<bool, AppError> {
    let role_id: Option<RoleId> = sqlx::query_scalar(
        r#"SELECT u.role_id
        FROM user_profiles u
        JOIN roles r ON r.id = u.role_id
        WHERE u.id = $1 AND u.is_active = true AND r.is_active = true"#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    match role_id {
        Some(role_id) => has_permission(db, role_id, permission_name).await,
        None => {
            track_permission_check(false);
            Ok(false)
        }
    }
}

// ============ Role permission reads ============

/// Active permissions held by the role, ordered by module, action and scope.
#[instrument(skip(db))]
pub async fn get_role_permissions(
    db: &PgPool,
    role_id: RoleId,
) -> Result<Vec<Permission>, AppError> {
    let sql = format!(
        r#"SELECT p.id, p.name, p.module, p.action, p.scope, p.description, p.is_active,
            p.created_at, p.updated_at
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = $1 AND p.is_active = true
        ORDER BY p.module, p.action, {}"#,
        scope_order("p.scope")
    );

    let permissions = sqlx::query_as::<_, Permission>(&sql)
        .bind(role_id)
        .fetch_all(db)
        .await?;

    Ok(permissions)
}

/// Permissions grouped by module: the role's when `role_id` is given,
/// otherwise the whole active catalog.
#[instrument(skip(db))]
pub async fn get_permissions_by_module(
    db: &PgPool,
    role_id: Option<RoleId>,
) -> Result<Vec<ModulePermissions>, AppError> {
    let permissions = match role_id {
        Some(role_id) => get_role_permissions(db, role_id).await?,
        None => {
            let sql = format!(
                "SELECT {} FROM permissions WHERE is_active = true ORDER BY module, action, {}",
                PERMISSION_COLUMNS,
                scope_order("scope")
            );
            sqlx::query_as::<_, Permission>(&sql).fetch_all(db).await?
        }
    };

    Ok(group_by_module(permissions))
}

// ============ Catalog administration ============

#[instrument(skip(db))]
pub async fn list_permissions(
    db: &PgPool,
    filter: PermissionFilterParams,
) -> Result<PaginatedPermissionsResponse, AppError> {
    let limit = filter.pagination.limit();
    let offset = filter.pagination.offset();

    let where_clause = r#"WHERE ($1::text IS NULL OR module = $1)
        AND ($2::bool IS NULL OR is_active = $2)
        AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' OR description ILIKE '%' || $3 || '%')"#;

    let sql = format!(
        "SELECT {} FROM permissions {} ORDER BY module, action, {} LIMIT $4 OFFSET $5",
        PERMISSION_COLUMNS,
        where_clause,
        scope_order("scope")
    );
    let items = sqlx::query_as::<_, Permission>(&sql)
        .bind(filter.module.as_deref())
        .bind(filter.is_active)
        .bind(filter.search.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

    let count_sql = format!("SELECT COUNT(*) FROM permissions {}", where_clause);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(filter.module.as_deref())
        .bind(filter.is_active)
        .bind(filter.search.as_deref())
        .fetch_one(db)
        .await?;

    let meta = PaginationMeta::from_params(&filter.pagination, total, items.len());
    Ok(PaginatedPermissionsResponse { items, meta })
}

#[instrument(skip(db))]
pub async fn get_permission_by_id(db: &PgPool, id: PermissionId) -> Result<Permission, AppError> {
    let sql = format!("SELECT {} FROM permissions WHERE id = $1", PERMISSION_COLUMNS);
    sqlx::query_as::<_, Permission>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Permiso no encontrado")))
}

#[instrument(skip(db))]
pub async fn create_permission(
    db: &PgPool,
    dto: CreatePermissionDto,
) -> Result<Permission, AppError> {
    let module = dto.module.trim().to_lowercase();
    let action = dto.action.trim().to_lowercase();
    let name = permission_name(&module, &action, dto.scope);

    let sql = format!(
        r#"INSERT INTO permissions (name, module, action, scope, description, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}"#,
        PERMISSION_COLUMNS
    );

    let permission = sqlx::query_as::<_, Permission>(&sql)
        .bind(&name)
        .bind(&module)
        .bind(&action)
        .bind(dto.scope)
        .bind(dto.description.as_deref())
        .bind(dto.is_active.unwrap_or(true))
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_name(&name)
            } else {
                AppError::from(e)
            }
        })?;

    info!(permission.id = %permission.id, permission.name = %permission.name, "Permission created");
    Ok(permission)
}

/// Partial update. The name is always recomputed from module, action and scope.
#[instrument(skip(db))]
pub async fn update_permission(
    db: &PgPool,
    id: PermissionId,
    dto: UpdatePermissionDto,
) -> Result<Permission, AppError> {
    let current = get_permission_by_id(db, id).await?;

    let module = dto
        .module
        .map(|m| m.trim().to_lowercase())
        .unwrap_or(current.module);
    let action = dto
        .action
        .map(|a| a.trim().to_lowercase())
        .unwrap_or(current.action);
    let scope = dto.scope.unwrap_or(current.scope);
    let description = dto.description.or(current.description);
    let name = permission_name(&module, &action, scope);

    let sql = format!(
        r#"UPDATE permissions
        SET name = $2, module = $3, action = $4, scope = $5, description = $6, updated_at = NOW()
        WHERE id = $1
        RETURNING {}"#,
        PERMISSION_COLUMNS
    );

    sqlx::query_as::<_, Permission>(&sql)
        .bind(id)
        .bind(&name)
        .bind(&module)
        .bind(&action)
        .bind(scope)
        .bind(description.as_deref())
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_name(&name)
            } else {
                AppError::from(e)
            }
        })
}

#[instrument(skip(db))]
pub async fn set_permission_active(
    db: &PgPool,
    id: PermissionId,
    is_active: bool,
) -> Result<Permission, AppError> {
    let sql = format!(
        "UPDATE permissions SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        PERMISSION_COLUMNS
    );
    sqlx::query_as::<_, Permission>(&sql)
        .bind(id)
        .bind(is_active)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Permiso no encontrado")))
}

#[instrument(skip(db))]
pub async fn list_modules(db: &PgPool) -> Result<Vec<String>, AppError> {
    let modules: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT module FROM permissions ORDER BY module")
            .fetch_all(db)
            .await?;
    Ok(modules)
}

/// Rewrites every permission whose name drifted from `module.action.scope`.
/// Rows whose corrected name is still taken once every other rename has been
/// applied are left alone and reported as conflicts.
#[instrument(skip(db))]
pub async fn repair_permission_names(db: &PgPool) -> Result<RepairReport, AppError> {
    let mut tx = db.begin().await?;

    let sql = format!(
        "SELECT {} FROM permissions ORDER BY module, action, {} FOR UPDATE",
        PERMISSION_COLUMNS,
        scope_order("scope")
    );
    let permissions = sqlx::query_as::<_, Permission>(&sql)
        .fetch_all(&mut *tx)
        .await?;

    let mut report = RepairReport {
        checked: permissions.len(),
        ..Default::default()
    };

    let mut pending: Vec<RenamedPermission> = permissions
        .into_iter()
        .filter_map(|permission| {
            let expected = permission.expected_name();
            (permission.name != expected).then(|| RenamedPermission {
                id: permission.id,
                old_name: permission.name,
                new_name: expected,
            })
        })
        .collect();

    // A rename can free the target of an earlier one, so keep sweeping
    // until a pass makes no progress.
    loop {
        let mut blocked = Vec::new();
        let before = pending.len();

        for renamed in pending {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM permissions WHERE name = $1 AND id <> $2)",
            )
            .bind(&renamed.new_name)
            .bind(renamed.id)
            .fetch_one(&mut *tx)
            .await?;

            if taken {
                blocked.push(renamed);
                continue;
            }

            sqlx::query("UPDATE permissions SET name = $2, updated_at = NOW() WHERE id = $1")
                .bind(renamed.id)
                .bind(&renamed.new_name)
                .execute(&mut *tx)
                .await?;

            report.repaired.push(renamed);
        }

        pending = blocked;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    for renamed in &pending {
        warn!(
            permission.id = %renamed.id,
            old_name = %renamed.old_name,
            new_name = %renamed.new_name,
            "Cannot repair permission name, target already exists"
        );
    }
    report.conflicts = pending;

    tx.commit().await?;

    info!(
        checked = report.checked,
        repaired = report.repaired.len(),
        conflicts = report.conflicts.len(),
        "Permission names repaired"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_order_qualifies_column() {
        assert_eq!(
            scope_order("p.scope"),
            "CASE p.scope WHEN 'own' THEN 0 WHEN 'team' THEN 1 ELSE 2 END"
        );
        assert!(scope_order("scope").starts_with("CASE scope "));
    }
}
