//! System parameter store configuration.
//!
//! # Environment Variables
//!
//! - `PARAMETER_ENCRYPTION_KEY`: passphrase the AES-256 key is derived from.
//!   A development default is used when unset; deployments must set it.
//! - `PARAMETER_CACHE_TTL_SECONDS`: lifetime of cached parameters (default: 300)

use std::env;
use std::time::Duration;

use crate::env_or;

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
const DEV_ENCRYPTION_KEY: &str = "casedesk-dev-parameter-key-change-in-production";

#[derive(Clone)]
pub struct ParameterConfig {
    pub encryption_key: String,
    pub cache_ttl_seconds: u64,
}

impl std::fmt::Debug for ParameterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterConfig")
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            encryption_key: DEV_ENCRYPTION_KEY.to_string(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

impl ParameterConfig {
    pub fn from_env() -> Self {
        Self {
            encryption_key: env::var("PARAMETER_ENCRYPTION_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| DEV_ENCRYPTION_KEY.to_string()),
            cache_ttl_seconds: env_or("PARAMETER_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn uses_dev_key(&self) -> bool {
        self.encryption_key == DEV_ENCRYPTION_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_is_five_minutes() {
        assert_eq!(ParameterConfig::default().cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_debug_does_not_print_key() {
        let config = ParameterConfig {
            encryption_key: "super-secret".to_string(),
            cache_ttl_seconds: 60,
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("cache_ttl_seconds"));
    }
}
