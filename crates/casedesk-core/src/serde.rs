//! Deserializers for query-string filters.
//!
//! Query structs that `#[serde(flatten)]` pagination receive every value as a
//! string, so typed filters parse them by hand. Empty strings mean "absent".

use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::str::FromStr;

pub fn deserialize_optional_parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s.trim().parse::<T>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

pub fn deserialize_optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("true") || s == "1" => Ok(Some(true)),
        Some(s) if s.eq_ignore_ascii_case("false") || s == "0" => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid boolean: {}",
            other
        ))),
    }
}

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Deserialize)]
    struct Filter {
        #[serde(default, deserialize_with = "deserialize_optional_bool")]
        active: Option<bool>,
        #[serde(default, deserialize_with = "deserialize_optional_parsed")]
        id: Option<Uuid>,
        #[serde(default, deserialize_with = "deserialize_optional_string")]
        search: Option<String>,
    }

    #[test]
    fn test_parses_string_values() {
        let f: Filter = serde_json::from_str(
            r#"{"active":"true","id":"12345678-1234-1234-1234-123456789abc","search":" adm "}"#,
        )
        .unwrap();
        assert_eq!(f.active, Some(true));
        assert!(f.id.is_some());
        assert_eq!(f.search.as_deref(), Some("adm"));
    }

    #[test]
    fn test_empty_strings_are_none() {
        let f: Filter = serde_json::from_str(r#"{"active":"","id":"","search":"  "}"#).unwrap();
        assert!(f.active.is_none());
        assert!(f.id.is_none());
        assert!(f.search.is_none());
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        assert!(serde_json::from_str::<Filter>(r#"{"active":"maybe"}"#).is_err());
    }
}
