//! Cache key generation.
//!
//! Keys are namespaced so one cache can hold several kinds of entries and
//! be invalidated per kind by prefix.

/// Prefix for all cache keys.
const CACHE_PREFIX: &str = "casedesk";

/// Builds a cache key with the standard prefix.
fn build_key(parts: &[&str]) -> String {
    format!("{}:{}", CACHE_PREFIX, parts.join(":"))
}

/// Cache keys for system parameters.
pub mod parameters {
    use super::*;

    /// Key for a parameter by its `parameter_key`.
    pub fn by_key(parameter_key: &str) -> String {
        build_key(&["parameter", parameter_key])
    }

    /// Prefix shared by every parameter key.
    pub fn prefix() -> String {
        build_key(&["parameter", ""])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_key_format() {
        assert_eq!(
            parameters::by_key("app.name"),
            "casedesk:parameter:app.name"
        );
    }

    #[test]
    fn test_parameter_keys_share_prefix() {
        assert!(parameters::by_key("cases.auto_close_days").starts_with(&parameters::prefix()));
    }
}
