use std::collections::HashSet;

use anyhow::anyhow;
use casedesk_core::errors::is_unique_violation;
use casedesk_core::{AppError, PaginationMeta};
use casedesk_models::{
    CloneRoleDto, CreateRoleDto, DeletionAction, PaginatedRolesResponse, Permission, PermissionId,
    Role, RoleDeletionOutcome, RoleDeletionSafety, RoleFilterParams, RoleId, RoleSummary,
    RoleWithPermissions, UpdateRoleDto, UserProfile,
};
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{info, instrument};

use crate::metrics::track_role_deleted;
use crate::modules::permissions::service::scope_order;
use crate::modules::users::service::USER_COLUMNS;

const ROLE_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

fn role_not_found() -> AppError {
    AppError::not_found(anyhow!("Rol no encontrado"))
}

fn duplicate_name() -> AppError {
    AppError::conflict(anyhow!("Ya existe un rol con ese nombre"))
}

fn map_name_conflict(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        duplicate_name()
    } else {
        AppError::from(err)
    }
}

async fn find_role<'e, E: PgExecutor<'e>>(executor: E, id: RoleId) -> Result<Role, AppError> {
    let sql = format!("SELECT {} FROM roles WHERE id = $1", ROLE_COLUMNS);
    sqlx::query_as::<_, Role>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(role_not_found)
}

/// Locks the role row for the rest of the transaction.
async fn lock_role(conn: &mut PgConnection, id: RoleId) -> Result<Role, AppError> {
    let sql = format!("SELECT {} FROM roles WHERE id = $1 FOR UPDATE", ROLE_COLUMNS);
    sqlx::query_as::<_, Role>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(role_not_found)
}

async fn count_users<'e, E: PgExecutor<'e>>(executor: E, id: RoleId) -> Result<i64, AppError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM user_profiles WHERE role_id = $1")
        .bind(id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

async fn count_permissions<'e, E: PgExecutor<'e>>(
    executor: E,
    id: RoleId,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions WHERE role_id = $1")
        .bind(id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Every permission assigned to the role, active or not.
async fn assigned_permissions<'e, E: PgExecutor<'e>>(
    executor: E,
    id: RoleId,
) -> Result<Vec<Permission>, AppError> {
    let sql = format!(
        r#"SELECT p.id, p.name, p.module, p.action, p.scope, p.description, p.is_active,
            p.created_at, p.updated_at
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = $1
        ORDER BY p.module, p.action, {}"#,
        scope_order("p.scope")
    );
    let permissions = sqlx::query_as::<_, Permission>(&sql)
        .bind(id)
        .fetch_all(executor)
        .await?;
    Ok(permissions)
}

/// Drops duplicates keeping first-seen order.
fn dedup_ids(ids: &[PermissionId]) -> Vec<PermissionId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Ensures every id names an existing permission, failing with the missing ones.
async fn ensure_permissions_exist(
    conn: &mut PgConnection,
    ids: &[PermissionId],
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: Vec<PermissionId> =
        sqlx::query_scalar("SELECT id FROM permissions WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(conn)
            .await?;
    let found: HashSet<PermissionId> = found.into_iter().collect();

    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !found.contains(id))
        .map(ToString::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::bad_request(anyhow!(
            "Permisos no encontrados: {}",
            missing.join(", ")
        )))
    }
}

/// Replaces the role's permission set with `ids`. Caller owns the transaction.
async fn replace_permissions(
    conn: &mut PgConnection,
    role_id: RoleId,
    ids: &[PermissionId],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    if !ids.is_empty() {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) SELECT $1, unnest($2::uuid[])",
        )
        .bind(role_id)
        .bind(ids)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[instrument(skip(db))]
pub async fn list_roles(
    db: &PgPool,
    filter: RoleFilterParams,
) -> Result<PaginatedRolesResponse, AppError> {
    let limit = filter.pagination.limit();
    let offset = filter.pagination.offset();

    let where_clause = r#"WHERE ($1::bool IS NULL OR r.is_active = $1)
        AND ($2::text IS NULL OR r.name ILIKE '%' || $2 || '%')"#;

    let sql = format!(
        r#"SELECT r.id, r.name, r.description, r.is_active, r.created_at, r.updated_at,
            (SELECT COUNT(*) FROM role_permissions rp WHERE rp.role_id = r.id) AS permission_count,
            (SELECT COUNT(*) FROM user_profiles u WHERE u.role_id = r.id) AS user_count
        FROM roles r
        {}
        ORDER BY r.name
        LIMIT $3 OFFSET $4"#,
        where_clause
    );
    let items = sqlx::query_as::<_, RoleSummary>(&sql)
        .bind(filter.is_active)
        .bind(filter.search.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

    let count_sql = format!("SELECT COUNT(*) FROM roles r {}", where_clause);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(filter.is_active)
        .bind(filter.search.as_deref())
        .fetch_one(db)
        .await?;

    let meta = PaginationMeta::from_params(&filter.pagination, total, items.len());
    Ok(PaginatedRolesResponse { items, meta })
}

/// The role with every permission assigned to it and its user count.
#[instrument(skip(db))]
pub async fn get_role_by_id(db: &PgPool, id: RoleId) -> Result<RoleWithPermissions, AppError> {
    let role = find_role(db, id).await?;
    let permissions = assigned_permissions(db, id).await?;
    let user_count = count_users(db, id).await?;

    Ok(RoleWithPermissions {
        role,
        permissions,
        user_count,
    })
}

#[instrument(skip(db))]
pub async fn create_role(db: &PgPool, dto: CreateRoleDto) -> Result<RoleWithPermissions, AppError> {
    let permission_ids = dedup_ids(dto.permission_ids.as_deref().unwrap_or_default());

    let mut tx = db.begin().await?;

    let sql = format!(
        "INSERT INTO roles (name, description, is_active) VALUES ($1, $2, $3) RETURNING {}",
        ROLE_COLUMNS
    );
    let role = sqlx::query_as::<_, Role>(&sql)
        .bind(dto.name.trim())
        .bind(dto.description.as_deref())
        .bind(dto.is_active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_name_conflict)?;

    ensure_permissions_exist(&mut tx, &permission_ids).await?;
    replace_permissions(&mut tx, role.id, &permission_ids).await?;
    let permissions = assigned_permissions(&mut *tx, role.id).await?;

    tx.commit().await?;

    info!(role.id = %role.id, role.name = %role.name, permissions = permissions.len(), "Role created");
    Ok(RoleWithPermissions {
        role,
        permissions,
        user_count: 0,
    })
}

/// Partial update. Renaming rewrites `role_name` on every holder.
#[instrument(skip(db))]
pub async fn update_role(db: &PgPool, id: RoleId, dto: UpdateRoleDto) -> Result<Role, AppError> {
    let mut tx = db.begin().await?;
    let current = lock_role(&mut tx, id).await?;

    if current.is_system_role() && dto.is_active == Some(false) {
        return Err(AppError::forbidden("El rol de sistema no puede desactivarse"));
    }

    let name = dto
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(current.name.as_str())
        .to_string();
    let description = dto.description.or(current.description.clone());
    let is_active = dto.is_active.unwrap_or(current.is_active);

    let sql = format!(
        r#"UPDATE roles SET name = $2, description = $3, is_active = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {}"#,
        ROLE_COLUMNS
    );
    let role = sqlx::query_as::<_, Role>(&sql)
        .bind(id)
        .bind(&name)
        .bind(description.as_deref())
        .bind(is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_name_conflict)?;

    if role.name != current.name {
        let renamed = sqlx::query(
            "UPDATE user_profiles SET role_name = $2, updated_at = NOW() WHERE role_id = $1",
        )
        .bind(id)
        .bind(&role.name)
        .execute(&mut *tx)
        .await?;
        info!(role.id = %id, users = renamed.rows_affected(), "Role renamed");
    }

    tx.commit().await?;
    Ok(role)
}

/// Replaces the role's permissions with exactly `permission_ids` in one
/// transaction. Duplicate ids collapse; unknown ids reject the whole call.
#[instrument(skip(db))]
pub async fn assign_permissions_to_role(
    db: &PgPool,
    role_id: RoleId,
    permission_ids: &[PermissionId],
) -> Result<RoleWithPermissions, AppError> {
    let ids = dedup_ids(permission_ids);

    let mut tx = db.begin().await?;
    let role = lock_role(&mut tx, role_id).await?;

    ensure_permissions_exist(&mut tx, &ids).await?;
    replace_permissions(&mut tx, role_id, &ids).await?;

    let permissions = assigned_permissions(&mut *tx, role_id).await?;
    let user_count = count_users(&mut *tx, role_id).await?;

    tx.commit().await?;

    info!(role.id = %role_id, permissions = permissions.len(), "Role permissions replaced");
    Ok(RoleWithPermissions {
        role,
        permissions,
        user_count,
    })
}

#[instrument(skip(db))]
pub async fn remove_permission_from_role(
    db: &PgPool,
    role_id: RoleId,
    permission_id: PermissionId,
) -> Result<(), AppError> {
    find_role(db, role_id).await?;

    let result =
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(anyhow!(
            "El rol no tiene asignado ese permiso"
        )));
    }

    Ok(())
}

/// Copies the source role's permission set onto a new role.
#[instrument(skip(db))]
pub async fn clone_role(
    db: &PgPool,
    source_id: RoleId,
    dto: CloneRoleDto,
) -> Result<RoleWithPermissions, AppError> {
    let mut tx = db.begin().await?;
    let source = find_role(&mut *tx, source_id).await?;

    let sql = format!(
        "INSERT INTO roles (name, description, is_active) VALUES ($1, $2, true) RETURNING {}",
        ROLE_COLUMNS
    );
    let role = sqlx::query_as::<_, Role>(&sql)
        .bind(dto.name.trim())
        .bind(dto.description.or(source.description).as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_name_conflict)?;

    sqlx::query(
        r#"INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, permission_id FROM role_permissions WHERE role_id = $2"#,
    )
    .bind(role.id)
    .bind(source_id)
    .execute(&mut *tx)
    .await?;

    let permissions = assigned_permissions(&mut *tx, role.id).await?;
    tx.commit().await?;

    info!(source.id = %source_id, role.id = %role.id, "Role cloned");
    Ok(RoleWithPermissions {
        role,
        permissions,
        user_count: 0,
    })
}

#[instrument(skip(db))]
pub async fn get_deletion_safety(db: &PgPool, id: RoleId) -> Result<RoleDeletionSafety, AppError> {
    let role = find_role(db, id).await?;
    let user_count = count_users(db, id).await?;
    let permission_count = count_permissions(db, id).await?;
    Ok(RoleDeletionSafety::evaluate(
        &role,
        user_count,
        permission_count,
    ))
}

/// Deletes an unused role, deactivates a role still held by users, and
/// refuses the system role.
#[instrument(skip(db))]
pub async fn delete_role(db: &PgPool, id: RoleId) -> Result<RoleDeletionOutcome, AppError> {
    let mut tx = db.begin().await?;
    let role = lock_role(&mut tx, id).await?;
    let user_count = count_users(&mut *tx, id).await?;
    let permission_count = count_permissions(&mut *tx, id).await?;

    let safety = RoleDeletionSafety::evaluate(&role, user_count, permission_count);

    let message = match safety.action {
        DeletionAction::Blocked => return Err(AppError::forbidden(safety.reason)),
        DeletionAction::SoftDelete => {
            sqlx::query("UPDATE roles SET is_active = false, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            format!(
                "El rol tiene {} usuario(s) asignado(s) y fue desactivado",
                user_count
            )
        }
        DeletionAction::HardDelete => {
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM roles WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            "Rol eliminado".to_string()
        }
    };

    tx.commit().await?;

    let mode = match safety.action {
        DeletionAction::SoftDelete => "soft",
        _ => "hard",
    };
    track_role_deleted(mode);
    info!(role.id = %id, mode, user_count, "Role deleted");

    Ok(RoleDeletionOutcome {
        role_id: id,
        action: safety.action,
        message,
    })
}

#[instrument(skip(db))]
pub async fn get_role_users(db: &PgPool, role_id: RoleId) -> Result<Vec<UserProfile>, AppError> {
    find_role(db, role_id).await?;

    let sql = format!(
        "SELECT {} FROM user_profiles WHERE role_id = $1 ORDER BY email",
        USER_COLUMNS
    );
    let users = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(role_id)
        .fetch_all(db)
        .await?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_ids_keeps_first_occurrence() {
        let a = PermissionId::from_u128(1);
        let b = PermissionId::from_u128(2);
        assert_eq!(dedup_ids(&[a, b, a, b, a]), vec![a, b]);
        assert!(dedup_ids(&[]).is_empty());
    }
}
