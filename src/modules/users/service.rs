use anyhow::anyhow;
use casedesk_core::errors::is_unique_violation;
use casedesk_core::{AppError, PaginationMeta, hash_password};
use casedesk_models::{
    CreateUserDto, PaginatedUsersResponse, RoleId, UserFilterParams, UserId, UserProfile,
};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use crate::metrics::track_user_created;

pub(crate) const USER_COLUMNS: &str =
    "id, email, full_name, role_id, role_name, is_active, last_login_at, created_at, updated_at";

fn user_not_found() -> AppError {
    AppError::not_found(anyhow!("Usuario no encontrado"))
}

/// Name of an active role, for the denormalized `role_name` column.
async fn active_role_name(conn: &mut PgConnection, role_id: RoleId) -> Result<String, AppError> {
    let role: Option<(String, bool)> =
        sqlx::query_as("SELECT name, is_active FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(conn)
            .await?;

    match role {
        Some((name, true)) => Ok(name),
        Some((_, false)) => Err(AppError::bad_request(anyhow!(
            "No se puede asignar un rol inactivo"
        ))),
        None => Err(AppError::not_found(anyhow!("Rol no encontrado"))),
    }
}

pub struct UserService;

impl UserService {
    #[instrument(skip(db, dto), fields(user.email = %dto.email))]
    pub async fn create_user(db: &PgPool, dto: CreateUserDto) -> Result<UserProfile, AppError> {
        let password = hash_password(&dto.password)?;

        let mut tx = db.begin().await?;
        let role_name = match dto.role_id {
            Some(role_id) => Some(active_role_name(&mut tx, role_id).await?),
            None => None,
        };

        let sql = format!(
            r#"INSERT INTO user_profiles (email, full_name, password, role_id, role_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}"#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(dto.email.trim().to_lowercase())
            .bind(dto.full_name.as_deref())
            .bind(&password)
            .bind(dto.role_id)
            .bind(role_name.as_deref())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::conflict(anyhow!("Ya existe un usuario con ese email"))
                } else {
                    AppError::from(e)
                }
            })?;

        tx.commit().await?;

        track_user_created(user.role_name.as_deref().unwrap_or("none"));
        info!(user.id = %user.id, "User created");
        Ok(user)
    }

    #[instrument(skip(db))]
    pub async fn get_user(db: &PgPool, id: UserId) -> Result<UserProfile, AppError> {
        let sql = format!("SELECT {} FROM user_profiles WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(user_not_found)
    }

    #[instrument(skip(db))]
    pub async fn list_users(
        db: &PgPool,
        filter: UserFilterParams,
    ) -> Result<PaginatedUsersResponse, AppError> {
        let limit = filter.pagination.limit();
        let offset = filter.pagination.offset();

        let where_clause = r#"WHERE ($1::uuid IS NULL OR role_id = $1)
            AND ($2::bool IS NULL OR is_active = $2)
            AND ($3::text IS NULL OR email ILIKE '%' || $3 || '%' OR full_name ILIKE '%' || $3 || '%')"#;

        let sql = format!(
            "SELECT {} FROM user_profiles {} ORDER BY email LIMIT $4 OFFSET $5",
            USER_COLUMNS, where_clause
        );
        let items = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(filter.role_id)
            .bind(filter.is_active)
            .bind(filter.search.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM user_profiles {}", where_clause);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.role_id)
            .bind(filter.is_active)
            .bind(filter.search.as_deref())
            .fetch_one(db)
            .await?;

        let meta = PaginationMeta::from_params(&filter.pagination, total, items.len());
        Ok(PaginatedUsersResponse { items, meta })
    }

    /// Sets or clears the user's role, keeping `role_name` in step.
    #[instrument(skip(db))]
    pub async fn assign_role(
        db: &PgPool,
        id: UserId,
        role_id: Option<RoleId>,
    ) -> Result<UserProfile, AppError> {
        let mut tx = db.begin().await?;
        let role_name = match role_id {
            Some(role_id) => Some(active_role_name(&mut tx, role_id).await?),
            None => None,
        };

        let sql = format!(
            r#"UPDATE user_profiles SET role_id = $2, role_name = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}"#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .bind(role_id)
            .bind(role_name.as_deref())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(user_not_found)?;

        tx.commit().await?;

        info!(user.id = %id, role = ?user.role_name, "User role changed");
        Ok(user)
    }

    #[instrument(skip(db))]
    pub async fn set_active(db: &PgPool, id: UserId, is_active: bool) -> Result<UserProfile, AppError> {
        let sql = format!(
            "UPDATE user_profiles SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .bind(is_active)
            .fetch_optional(db)
            .await?
            .ok_or_else(user_not_found)
    }
}
