//! System parameter models, validation rules and value coercion.
//!
//! Parameter values are stored as text. `parameter_type` decides how the text
//! is validated and how it is coerced into a [`ParameterValue`] when read.
//! Encrypted parameters hold ciphertext in `parameter_value`; everything in
//! this module operates on plaintext.

use crate::ids::SystemParameterId;
use crate::validation::validate_not_blank;
use casedesk_core::serde::{deserialize_optional_bool, deserialize_optional_string};
use casedesk_core::{PaginationMeta, PaginationParams};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Shown instead of the value of encrypted parameters.
pub const MASKED_VALUE: &str = "********";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Json,
    Email,
    Url,
    Password,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Json => "json",
            ParameterType::Email => "email",
            ParameterType::Url => "url",
            ParameterType::Password => "password",
        }
    }

    /// Password parameters are always stored encrypted.
    pub fn forces_encryption(&self) -> bool {
        matches!(self, ParameterType::Password)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParameterType(pub String);

impl fmt::Display for InvalidParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tipo de parámetro inválido: {}", self.0)
    }
}

impl std::error::Error for InvalidParameterType {}

impl FromStr for ParameterType {
    type Err = InvalidParameterType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(ParameterType::String),
            "number" => Ok(ParameterType::Number),
            "boolean" => Ok(ParameterType::Boolean),
            "json" => Ok(ParameterType::Json),
            "email" => Ok(ParameterType::Email),
            "url" => Ok(ParameterType::Url),
            "password" => Ok(ParameterType::Password),
            other => Err(InvalidParameterType(other.to_string())),
        }
    }
}

crate::text_enum_sqlx!(ParameterType);

/// Optional constraints stored in `validation_rules`. camelCase keys written
/// by older clients are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationRules {
    #[serde(default, alias = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, alias = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Compared as strings against the trimmed value
    #[serde(
        default,
        alias = "allowedValues",
        deserialize_with = "deserialize_string_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ValidationRules {
    /// Checks that the rules themselves are usable.
    pub fn check(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                errors.push("min_length no puede ser mayor que max_length".to_string());
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                errors.push("min no puede ser mayor que max".to_string());
            }
        }
        if let Some(pattern) = &self.pattern {
            if Regex::new(pattern).is_err() {
                errors.push(format!("Patrón de validación inválido: {pattern}"));
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Accepts a list of scalars and keeps their textual form.
fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(values.map(|values| {
        values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()
    }))
}

/// Parses the boolean spellings accepted for boolean parameters.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "si" | "sí" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Validates a plaintext value against its type and rules.
///
/// Empty or whitespace-only values count as absent. All violations are
/// collected.
pub fn validate_value(
    parameter_type: ParameterType,
    rules: &ValidationRules,
    is_required: bool,
    value: Option<&str>,
) -> Result<(), Vec<String>> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return if is_required {
            Err(vec!["El valor es obligatorio".to_string()])
        } else {
            Ok(())
        };
    };

    let mut errors = Vec::new();

    match parameter_type {
        ParameterType::Number => match parse_number(value) {
            Some(n) => {
                if let Some(min) = rules.min {
                    if n < min {
                        errors.push(format!("Debe ser mayor o igual a {min}"));
                    }
                }
                if let Some(max) = rules.max {
                    if n > max {
                        errors.push(format!("Debe ser menor o igual a {max}"));
                    }
                }
            }
            None => errors.push("Debe ser un número válido".to_string()),
        },
        ParameterType::Boolean => {
            if parse_bool(value).is_none() {
                errors.push("Debe ser un valor booleano (true/false)".to_string());
            }
        }
        ParameterType::Json => {
            if serde_json::from_str::<serde_json::Value>(value).is_err() {
                errors.push("Debe ser un JSON válido".to_string());
            }
        }
        ParameterType::Email => {
            if !EMAIL_RE.is_match(value.trim()) {
                errors.push("Debe ser un email válido".to_string());
            }
        }
        ParameterType::Url => {
            if !URL_RE.is_match(value.trim()) {
                errors.push("Debe ser una URL válida".to_string());
            }
        }
        ParameterType::String | ParameterType::Password => {}
    }

    let length = value.chars().count();
    if let Some(min_length) = rules.min_length {
        if length < min_length {
            errors.push(format!("Debe tener al menos {min_length} caracteres"));
        }
    }
    if let Some(max_length) = rules.max_length {
        if length > max_length {
            errors.push(format!("No debe exceder {max_length} caracteres"));
        }
    }

    if let Some(allowed) = &rules.allowed_values {
        if !allowed.iter().any(|a| a == value.trim()) {
            errors.push(format!("Debe ser uno de: {}", allowed.join(", ")));
        }
    }

    if let Some(pattern) = &rules.pattern {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(value) => {}
            Ok(_) => errors.push("No cumple el formato requerido".to_string()),
            Err(_) => errors.push(format!("Patrón de validación inválido: {pattern}")),
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// A parameter value coerced according to its type. Serializes as the bare
/// JSON value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Coerces plaintext into the variant for `parameter_type`. Email, url
    /// and password parameters are strings.
    pub fn parse(parameter_type: ParameterType, raw: &str) -> Result<Self, String> {
        match parameter_type {
            ParameterType::Number => parse_number(raw)
                .map(ParameterValue::Number)
                .ok_or_else(|| format!("Valor numérico inválido: {raw}")),
            ParameterType::Boolean => parse_bool(raw)
                .map(ParameterValue::Boolean)
                .ok_or_else(|| format!("Valor booleano inválido: {raw}")),
            ParameterType::Json => serde_json::from_str(raw)
                .map(ParameterValue::Json)
                .map_err(|e| format!("JSON inválido: {e}")),
            ParameterType::String
            | ParameterType::Email
            | ParameterType::Url
            | ParameterType::Password => Ok(ParameterValue::String(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParameterValue::String(s) => serde_json::Value::String(s.clone()),
            ParameterValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ParameterValue::Boolean(b) => serde_json::Value::Bool(*b),
            ParameterValue::Json(v) => v.clone(),
        }
    }
}

/// Turns a JSON request value into the stored text form. `null` clears.
pub fn raw_from_json(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SystemParameter {
    pub id: SystemParameterId,
    pub parameter_key: String,
    pub parameter_category: String,
    /// Ciphertext in storage when `is_encrypted`; masked in API responses
    pub parameter_value: Option<String>,
    pub parameter_type: ParameterType,
    pub is_encrypted: bool,
    pub is_required: bool,
    pub default_value: Option<String>,
    #[sqlx(json)]
    pub validation_rules: ValidationRules,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl SystemParameter {
    /// Hides the value of encrypted parameters.
    pub fn masked(mut self) -> Self {
        if self.is_encrypted {
            if self.parameter_value.is_some() {
                self.parameter_value = Some(MASKED_VALUE.to_string());
            }
            if self.default_value.is_some() {
                self.default_value = Some(MASKED_VALUE.to_string());
            }
        }
        self
    }

    /// Stored value when present and non-empty, otherwise the default.
    pub fn effective_raw(&self) -> Option<&str> {
        self.parameter_value
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.default_value.as_deref().filter(|v| !v.is_empty()))
    }

    /// Coerces the effective value. Expects plaintext.
    pub fn typed_value(&self) -> Result<Option<ParameterValue>, String> {
        self.effective_raw()
            .map(|raw| ParameterValue::parse(self.parameter_type, raw))
            .transpose()
    }
}

/// Key format: lowercase ASCII letters, digits, `.`, `_` and `-`, starting
/// with a letter.
fn validate_parameter_key(key: &str) -> Result<(), ValidationError> {
    let starts_with_letter = key.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if starts_with_letter && valid_chars {
        Ok(())
    } else {
        let mut err = ValidationError::new("parameter_key");
        err.message = Some(
            "La clave solo admite minúsculas, dígitos, '.', '_' y '-', y debe empezar por una letra"
                .into(),
        );
        Err(err)
    }
}

/// Wraps any present JSON value, including `null`, in `Some`. Absent fields
/// stay `None` through `#[serde(default)]`.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateParameterDto {
    #[validate(
        length(min = 1, max = 150, message = "La clave debe tener entre 1 y 150 caracteres"),
        custom(function = "validate_parameter_key")
    )]
    pub parameter_key: String,
    #[validate(
        length(
            min = 1,
            max = 100,
            message = "La categoría debe tener entre 1 y 100 caracteres"
        ),
        custom(function = "validate_not_blank")
    )]
    pub parameter_category: String,
    #[schema(value_type = Option<Object>)]
    pub parameter_value: Option<serde_json::Value>,
    pub parameter_type: ParameterType,
    pub is_encrypted: Option<bool>,
    pub is_required: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub default_value: Option<serde_json::Value>,
    pub validation_rules: Option<ValidationRules>,
    #[validate(length(max = 500, message = "La descripción no debe exceder 500 caracteres"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Partial update. For `parameter_value` and `default_value`, an explicit
/// `null` clears the field while an absent field leaves it unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateParameterDto {
    #[validate(
        length(
            min = 1,
            max = 100,
            message = "La categoría debe tener entre 1 y 100 caracteres"
        ),
        custom(function = "validate_not_blank")
    )]
    pub parameter_category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    #[schema(value_type = Option<Object>)]
    pub parameter_value: Option<serde_json::Value>,
    pub parameter_type: Option<ParameterType>,
    pub is_encrypted: Option<bool>,
    pub is_required: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_present")]
    #[schema(value_type = Option<Object>)]
    pub default_value: Option<serde_json::Value>,
    pub validation_rules: Option<ValidationRules>,
    #[validate(length(max = 500, message = "La descripción no debe exceder 500 caracteres"))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetParameterValueDto {
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetParameterValuesDto {
    /// Parameter key to new value
    #[schema(value_type = Object)]
    pub values: BTreeMap<String, serde_json::Value>,
}

/// Dry-run validation. With `parameter_key`, the stored type and rules are
/// used; otherwise `parameter_type` is required.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateParameterDto {
    pub parameter_key: Option<String>,
    pub parameter_type: Option<ParameterType>,
    pub validation_rules: Option<ValidationRules>,
    pub is_required: Option<bool>,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl From<Result<(), Vec<String>>> for ValidationResult {
    fn from(result: Result<(), Vec<String>>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                errors: Vec::new(),
            },
            Err(errors) => Self {
                valid: false,
                errors,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ParameterFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
    /// Case-insensitive substring of the key or description
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedParametersResponse {
    pub items: Vec<SystemParameter>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct ParameterCategory {
    pub category: String,
    pub parameter_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParameterValueResponse {
    pub parameter_key: String,
    pub parameter_type: ParameterType,
    /// Parsed value, `null` when neither a value nor a default is set
    #[schema(value_type = Option<Object>)]
    pub value: Option<ParameterValue>,
}
