//! Typed system parameters.
//!
//! Values are stored as text, encrypted when `is_encrypted`, and coerced to
//! [`ParameterValue`] on read. Reads by key go through the [`ParameterStore`]
//! cache, which holds decrypted parameters and is invalidated on every write.
//! List and detail responses mask encrypted values.

use std::collections::BTreeMap;

use anyhow::anyhow;
use casedesk_cache::CacheStats;
use casedesk_core::errors::is_unique_violation;
use casedesk_core::{AppError, PaginationMeta};
use casedesk_models::system_parameters::{raw_from_json, validate_value};
use casedesk_models::{
    CreateParameterDto, PaginatedParametersResponse, ParameterCategory, ParameterFilterParams,
    ParameterType, ParameterValue, ParameterValueResponse, SystemParameter, SystemParameterId,
    UpdateParameterDto, ValidateParameterDto, ValidationResult, ValidationRules,
};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use tracing::{info, instrument, warn};

use super::store::ParameterStore;

const PARAMETER_COLUMNS: &str = "id, parameter_key, parameter_category, parameter_value, \
    parameter_type, is_encrypted, is_required, default_value, validation_rules, description, \
    is_active, created_at, updated_at";

fn parameter_not_found() -> AppError {
    AppError::not_found(anyhow!("Parámetro no encontrado"))
}

fn invalid_value(parameter_key: &str, errors: &[String]) -> AppError {
    AppError::bad_request(anyhow!(
        "Valor inválido para {}: {}",
        parameter_key,
        errors.join("; ")
    ))
}

fn check_rules(rules: &ValidationRules) -> Result<(), AppError> {
    rules.check().map_err(|errors| {
        AppError::bad_request(anyhow!(
            "Reglas de validación inválidas: {}",
            errors.join("; ")
        ))
    })
}

/// Validates the value and the default of a parameter about to be stored.
fn check_values(
    parameter_key: &str,
    parameter_type: ParameterType,
    rules: &ValidationRules,
    is_required: bool,
    value: Option<&str>,
    default_value: Option<&str>,
) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if let Err(value_errors) = validate_value(parameter_type, rules, is_required, value) {
        errors.extend(value_errors);
    }
    if let Err(default_errors) = validate_value(parameter_type, rules, false, default_value) {
        errors.extend(
            default_errors
                .into_iter()
                .map(|e| format!("default_value: {}", e)),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(invalid_value(parameter_key, &errors))
    }
}

/// Coerces the effective value of a decrypted parameter. An unparsable
/// stored value is logged and read as absent.
fn typed_value(parameter: &SystemParameter) -> Option<ParameterValue> {
    match parameter.typed_value() {
        Ok(value) => value,
        Err(e) => {
            warn!(
                parameter.key = %parameter.parameter_key,
                parameter.kind = %parameter.parameter_type,
                error = %e,
                "Stored parameter value does not match its type"
            );
            None
        }
    }
}

async fn find_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: SystemParameterId,
) -> Result<SystemParameter, AppError> {
    let sql = format!(
        "SELECT {} FROM system_parameters WHERE id = $1",
        PARAMETER_COLUMNS
    );
    sqlx::query_as::<_, SystemParameter>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(parameter_not_found)
}

// ============ Reads by key ============

/// Active parameter by key, decrypted. Served from the cache when fresh.
#[instrument(skip(db, store))]
pub async fn get_parameter(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
) -> Result<Option<SystemParameter>, AppError> {
    if let Some(parameter) = store.cached(parameter_key) {
        return Ok(Some(parameter));
    }

    let sql = format!(
        "SELECT {} FROM system_parameters WHERE parameter_key = $1 AND is_active = true",
        PARAMETER_COLUMNS
    );
    let Some(parameter) = sqlx::query_as::<_, SystemParameter>(&sql)
        .bind(parameter_key)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };

    let parameter = store.open(parameter)?;
    store.remember(&parameter);
    Ok(Some(parameter))
}

/// Parsed value of an active parameter, falling back to its default.
#[instrument(skip(db, store))]
pub async fn get_value(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
) -> Result<Option<ParameterValue>, AppError> {
    Ok(get_parameter(db, store, parameter_key)
        .await?
        .as_ref()
        .and_then(typed_value))
}

/// Parsed value with its type, for the value endpoint. 404 for unknown or
/// inactive keys.
#[instrument(skip(db, store))]
pub async fn get_value_response(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
) -> Result<ParameterValueResponse, AppError> {
    let parameter = get_parameter(db, store, parameter_key)
        .await?
        .ok_or_else(parameter_not_found)?;

    Ok(ParameterValueResponse {
        value: typed_value(&parameter),
        parameter_key: parameter.parameter_key,
        parameter_type: parameter.parameter_type,
    })
}

pub async fn get_string(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
    default: &str,
) -> Result<String, AppError> {
    let value = get_value(db, store, parameter_key).await?;
    Ok(match value {
        Some(ParameterValue::String(s)) => s,
        Some(other) => match other.to_json() {
            serde_json::Value::String(s) => s,
            json => json.to_string(),
        },
        None => default.to_string(),
    })
}

pub async fn get_number(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
    default: f64,
) -> Result<f64, AppError> {
    let value = get_value(db, store, parameter_key).await?;
    Ok(value.as_ref().and_then(ParameterValue::as_f64).unwrap_or(default))
}

pub async fn get_bool(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
    default: bool,
) -> Result<bool, AppError> {
    let value = get_value(db, store, parameter_key).await?;
    Ok(value.as_ref().and_then(ParameterValue::as_bool).unwrap_or(default))
}

pub async fn get_json(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
    default: serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let value = get_value(db, store, parameter_key).await?;
    Ok(value.map(|v| v.to_json()).unwrap_or(default))
}

// ============ Writes by key ============

/// Validates, encrypts when needed and stores a new value for `parameter_key`.
/// `None` clears the value.
#[instrument(skip(db, store, value))]
pub async fn set_value(
    db: &PgPool,
    store: &ParameterStore,
    parameter_key: &str,
    value: Option<String>,
) -> Result<SystemParameter, AppError> {
    let mut tx = db.begin().await?;
    let updated = write_value(&mut tx, store, parameter_key, value).await?;
    tx.commit().await?;

    store.invalidate(parameter_key);
    info!(parameter.key = %parameter_key, "Parameter value updated");
    Ok(updated.masked())
}

/// Sets several values in one transaction. Nothing is written unless every
/// value is valid.
#[instrument(skip(db, store, values), fields(count = values.len()))]
pub async fn set_values(
    db: &PgPool,
    store: &ParameterStore,
    values: BTreeMap<String, serde_json::Value>,
) -> Result<Vec<SystemParameter>, AppError> {
    if values.is_empty() {
        return Err(AppError::bad_request(anyhow!(
            "Debe indicar al menos un parámetro"
        )));
    }

    let mut tx = db.begin().await?;
    let mut updated = Vec::with_capacity(values.len());
    for (parameter_key, value) in &values {
        updated.push(write_value(&mut tx, store, parameter_key, raw_from_json(value)).await?);
    }
    tx.commit().await?;

    for parameter_key in values.keys() {
        store.invalidate(parameter_key);
    }
    info!(count = updated.len(), "Parameter values updated");
    Ok(updated.into_iter().map(SystemParameter::masked).collect())
}

async fn write_value(
    conn: &mut sqlx::PgConnection,
    store: &ParameterStore,
    parameter_key: &str,
    value: Option<String>,
) -> Result<SystemParameter, AppError> {
    let sql = format!(
        "SELECT {} FROM system_parameters WHERE parameter_key = $1 FOR UPDATE",
        PARAMETER_COLUMNS
    );
    let current = sqlx::query_as::<_, SystemParameter>(&sql)
        .bind(parameter_key)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Parámetro no encontrado: {}", parameter_key)))?;

    validate_value(
        current.parameter_type,
        &current.validation_rules,
        current.is_required,
        value.as_deref(),
    )
    .map_err(|errors| invalid_value(parameter_key, &errors))?;

    let stored = store.seal(current.is_encrypted, value)?;

    let update_sql = format!(
        r#"UPDATE system_parameters SET parameter_value = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {}"#,
        PARAMETER_COLUMNS
    );
    let updated = sqlx::query_as::<_, SystemParameter>(&update_sql)
        .bind(current.id)
        .bind(stored.as_deref())
        .fetch_one(&mut *conn)
        .await?;
    Ok(updated)
}

// ============ Administration ============

#[instrument(skip(db, store, dto), fields(parameter.key = %dto.parameter_key))]
pub async fn create_parameter(
    db: &PgPool,
    store: &ParameterStore,
    dto: CreateParameterDto,
) -> Result<SystemParameter, AppError> {
    let rules = dto.validation_rules.unwrap_or_default();
    check_rules(&rules)?;

    let is_encrypted =
        dto.is_encrypted.unwrap_or(false) || dto.parameter_type.forces_encryption();
    let is_required = dto.is_required.unwrap_or(false);
    let value = dto.parameter_value.as_ref().and_then(raw_from_json);
    let default_value = dto.default_value.as_ref().and_then(raw_from_json);

    check_values(
        &dto.parameter_key,
        dto.parameter_type,
        &rules,
        is_required,
        value.as_deref(),
        default_value.as_deref(),
    )?;

    let stored = store.seal(is_encrypted, value)?;

    let sql = format!(
        r#"INSERT INTO system_parameters
            (parameter_key, parameter_category, parameter_value, parameter_type, is_encrypted,
             is_required, default_value, validation_rules, description, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}"#,
        PARAMETER_COLUMNS
    );
    let parameter = sqlx::query_as::<_, SystemParameter>(&sql)
        .bind(&dto.parameter_key)
        .bind(dto.parameter_category.trim())
        .bind(stored.as_deref())
        .bind(dto.parameter_type)
        .bind(is_encrypted)
        .bind(is_required)
        .bind(default_value.as_deref())
        .bind(Json(&rules))
        .bind(dto.description.as_deref())
        .bind(dto.is_active.unwrap_or(true))
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(anyhow!("Ya existe un parámetro con esa clave"))
            } else {
                AppError::from(e)
            }
        })?;

    store.invalidate(&parameter.parameter_key);
    info!(parameter.id = %parameter.id, parameter.key = %parameter.parameter_key, "Parameter created");
    Ok(parameter.masked())
}

/// Partial update. The effective value is re-validated against the effective
/// type and rules and re-encrypted when needed.
#[instrument(skip(db, store, dto))]
pub async fn update_parameter(
    db: &PgPool,
    store: &ParameterStore,
    id: SystemParameterId,
    dto: UpdateParameterDto,
) -> Result<SystemParameter, AppError> {
    let mut tx = db.begin().await?;

    let sql = format!(
        "SELECT {} FROM system_parameters WHERE id = $1 FOR UPDATE",
        PARAMETER_COLUMNS
    );
    let current = sqlx::query_as::<_, SystemParameter>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(parameter_not_found)?;
    let current = store.open(current)?;

    let parameter_type = dto.parameter_type.unwrap_or(current.parameter_type);
    let rules = dto.validation_rules.unwrap_or(current.validation_rules);
    check_rules(&rules)?;

    let is_required = dto.is_required.unwrap_or(current.is_required);
    let is_encrypted = dto.is_encrypted.unwrap_or(current.is_encrypted)
        || parameter_type.forces_encryption();
    let value = match &dto.parameter_value {
        Some(json) => raw_from_json(json),
        None => current.parameter_value,
    };
    let default_value = match &dto.default_value {
        Some(json) => raw_from_json(json),
        None => current.default_value,
    };

    check_values(
        &current.parameter_key,
        parameter_type,
        &rules,
        is_required,
        value.as_deref(),
        default_value.as_deref(),
    )?;

    let stored = store.seal(is_encrypted, value)?;

    let update_sql = format!(
        r#"UPDATE system_parameters
        SET parameter_category = $2, parameter_value = $3, parameter_type = $4,
            is_encrypted = $5, is_required = $6, default_value = $7, validation_rules = $8,
            description = $9, is_active = $10, updated_at = NOW()
        WHERE id = $1
        RETURNING {}"#,
        PARAMETER_COLUMNS
    );
    let parameter = sqlx::query_as::<_, SystemParameter>(&update_sql)
        .bind(id)
        .bind(
            dto.parameter_category
                .as_deref()
                .map(str::trim)
                .unwrap_or(current.parameter_category.as_str()),
        )
        .bind(stored.as_deref())
        .bind(parameter_type)
        .bind(is_encrypted)
        .bind(is_required)
        .bind(default_value.as_deref())
        .bind(Json(&rules))
        .bind(dto.description.as_deref().or(current.description.as_deref()))
        .bind(dto.is_active.unwrap_or(current.is_active))
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    store.invalidate(&parameter.parameter_key);
    info!(parameter.id = %id, parameter.key = %parameter.parameter_key, "Parameter updated");
    Ok(parameter.masked())
}

#[instrument(skip(db, store))]
pub async fn delete_parameter(
    db: &PgPool,
    store: &ParameterStore,
    id: SystemParameterId,
) -> Result<(), AppError> {
    let parameter = find_by_id(db, id).await?;
    if parameter.is_required {
        return Err(AppError::bad_request(anyhow!(
            "No se puede eliminar un parámetro obligatorio"
        )));
    }

    sqlx::query("DELETE FROM system_parameters WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;

    store.invalidate(&parameter.parameter_key);
    info!(parameter.id = %id, parameter.key = %parameter.parameter_key, "Parameter deleted");
    Ok(())
}

#[instrument(skip(db))]
pub async fn get_parameter_by_id(
    db: &PgPool,
    id: SystemParameterId,
) -> Result<SystemParameter, AppError> {
    Ok(find_by_id(db, id).await?.masked())
}

#[instrument(skip(db))]
pub async fn list_parameters(
    db: &PgPool,
    filter: ParameterFilterParams,
) -> Result<PaginatedParametersResponse, AppError> {
    let limit = filter.pagination.limit();
    let offset = filter.pagination.offset();

    let where_clause = r#"WHERE ($1::text IS NULL OR parameter_category = $1)
        AND ($2::bool IS NULL OR is_active = $2)
        AND ($3::text IS NULL
            OR parameter_key ILIKE '%' || $3 || '%'
            OR description ILIKE '%' || $3 || '%')"#;

    let sql = format!(
        "SELECT {} FROM system_parameters {} ORDER BY parameter_category, parameter_key LIMIT $4 OFFSET $5",
        PARAMETER_COLUMNS, where_clause
    );
    let items = sqlx::query_as::<_, SystemParameter>(&sql)
        .bind(filter.category.as_deref())
        .bind(filter.is_active)
        .bind(filter.search.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

    let count_sql = format!("SELECT COUNT(*) FROM system_parameters {}", where_clause);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(filter.category.as_deref())
        .bind(filter.is_active)
        .bind(filter.search.as_deref())
        .fetch_one(db)
        .await?;

    let meta = PaginationMeta::from_params(&filter.pagination, total, items.len());
    Ok(PaginatedParametersResponse {
        items: items.into_iter().map(SystemParameter::masked).collect(),
        meta,
    })
}

#[instrument(skip(db))]
pub async fn list_categories(db: &PgPool) -> Result<Vec<ParameterCategory>, AppError> {
    let categories = sqlx::query_as::<_, ParameterCategory>(
        r#"SELECT parameter_category AS category, COUNT(*) AS parameter_count
        FROM system_parameters
        GROUP BY parameter_category
        ORDER BY parameter_category"#,
    )
    .fetch_all(db)
    .await?;
    Ok(categories)
}

#[instrument(skip(db))]
pub async fn get_by_category(
    db: &PgPool,
    category: &str,
) -> Result<Vec<SystemParameter>, AppError> {
    let sql = format!(
        "SELECT {} FROM system_parameters WHERE parameter_category = $1 ORDER BY parameter_key",
        PARAMETER_COLUMNS
    );
    let parameters = sqlx::query_as::<_, SystemParameter>(&sql)
        .bind(category)
        .fetch_all(db)
        .await?;
    Ok(parameters.into_iter().map(SystemParameter::masked).collect())
}

/// Dry-run validation against a stored parameter's rules or ad-hoc ones.
#[instrument(skip(db, dto))]
pub async fn validate(db: &PgPool, dto: ValidateParameterDto) -> Result<ValidationResult, AppError> {
    let value = raw_from_json(&dto.value);

    let (parameter_type, rules, is_required) = match dto.parameter_key.as_deref() {
        Some(parameter_key) => {
            let sql = format!(
                "SELECT {} FROM system_parameters WHERE parameter_key = $1",
                PARAMETER_COLUMNS
            );
            let parameter = sqlx::query_as::<_, SystemParameter>(&sql)
                .bind(parameter_key)
                .fetch_optional(db)
                .await?
                .ok_or_else(parameter_not_found)?;
            (
                parameter.parameter_type,
                parameter.validation_rules,
                parameter.is_required,
            )
        }
        None => {
            let parameter_type = dto.parameter_type.ok_or_else(|| {
                AppError::bad_request(anyhow!("Indique parameter_key o parameter_type"))
            })?;
            (
                parameter_type,
                dto.validation_rules.unwrap_or_default(),
                dto.is_required.unwrap_or(false),
            )
        }
    };

    if let Err(errors) = rules.check() {
        return Ok(ValidationResult::from(Err(errors)));
    }
    Ok(ValidationResult::from(validate_value(
        parameter_type,
        &rules,
        is_required,
        value.as_deref(),
    )))
}

pub fn clear_cache(store: &ParameterStore) -> usize {
    let removed = store.clear();
    info!(removed, "Parameter cache cleared");
    removed
}

pub fn cache_stats(store: &ParameterStore) -> CacheStats {
    store.stats()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(json: &str) -> ValidationRules {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_check_values_accepts_valid_value_and_default() {
        let rules = rules(r#"{"min": 1, "max": 365}"#);
        let result = check_values(
            "cases.auto_close_days",
            ParameterType::Number,
            &rules,
            false,
            Some("30"),
            Some("7"),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_check_values_reports_bad_default() {
        let err = check_values(
            "cases.auto_close_days",
            ParameterType::Number,
            &rules(r#"{"max": 10}"#),
            false,
            Some("5"),
            Some("50"),
        )
        .unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert!(err.error.to_string().contains("default_value"));
    }

    #[test]
    fn test_check_values_requires_value() {
        let err = check_values(
            "app.name",
            ParameterType::String,
            &ValidationRules::default(),
            true,
            None,
            Some("Casedesk"),
        )
        .unwrap_err();
        assert!(err.error.to_string().contains("app.name"));
    }

    #[test]
    fn test_check_rules_rejects_inverted_bounds() {
        assert!(check_rules(&rules(r#"{"min": 10, "max": 1}"#)).is_err());
        assert!(check_rules(&ValidationRules::default()).is_ok());
    }
}
