//! Process-local parameter state: the cipher for encrypted values and the
//! TTL cache of decrypted parameters.

use anyhow::anyhow;
use casedesk_cache::{CacheStats, TtlCache, keys};
use casedesk_config::ParameterConfig;
use casedesk_core::{AppError, SecretCipher};
use casedesk_models::SystemParameter;
use tracing::error;

use crate::metrics::track_parameter_cache;

#[derive(Clone, Debug)]
pub struct ParameterStore {
    cipher: SecretCipher,
    cache: TtlCache<SystemParameter>,
}

impl ParameterStore {
    pub fn new(config: &ParameterConfig) -> Self {
        Self {
            cipher: SecretCipher::from_passphrase(&config.encryption_key),
            cache: TtlCache::new(config.cache_ttl()),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        self.cipher
            .encrypt(plaintext)
            .map_err(|e| AppError::internal(anyhow!("Failed to encrypt parameter value: {}", e)))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, AppError> {
        self.cipher.decrypt(ciphertext).map_err(|e| {
            error!(error = %e, "Failed to decrypt parameter value");
            AppError::internal(anyhow!("Failed to decrypt parameter value: {}", e))
        })
    }

    /// Encrypts `value` when the parameter is encrypted, otherwise passes it through.
    pub fn seal(&self, is_encrypted: bool, value: Option<String>) -> Result<Option<String>, AppError> {
        match value {
            Some(v) if is_encrypted => self.encrypt(&v).map(Some),
            other => Ok(other),
        }
    }

    /// Returns the parameter with its stored value in plaintext.
    pub fn open(&self, mut parameter: SystemParameter) -> Result<SystemParameter, AppError> {
        if parameter.is_encrypted {
            if let Some(ciphertext) = parameter.parameter_value.as_deref() {
                parameter.parameter_value = Some(self.decrypt(ciphertext)?);
            }
        }
        Ok(parameter)
    }

    pub fn cached(&self, parameter_key: &str) -> Option<SystemParameter> {
        let (parameter, outcome) = self.cache.lookup(&keys::parameters::by_key(parameter_key));
        track_parameter_cache(outcome.as_str());
        parameter
    }

    /// Caches a decrypted parameter.
    pub fn remember(&self, parameter: &SystemParameter) {
        self.cache.insert(
            keys::parameters::by_key(&parameter.parameter_key),
            parameter.clone(),
        );
    }

    pub fn invalidate(&self, parameter_key: &str) -> bool {
        self.cache.invalidate(&keys::parameters::by_key(parameter_key))
    }

    pub fn clear(&self) -> usize {
        self.cache.invalidate_prefix(&keys::parameters::prefix())
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casedesk_models::{ParameterType, SystemParameterId, ValidationRules};

    fn store() -> ParameterStore {
        ParameterStore::new(&ParameterConfig {
            encryption_key: "unit-test-key".to_string(),
            cache_ttl_seconds: 60,
        })
    }

    fn parameter(key: &str, value: Option<&str>, is_encrypted: bool) -> SystemParameter {
        let now = chrono::Utc::now();
        SystemParameter {
            id: SystemParameterId::new(),
            parameter_key: key.to_string(),
            parameter_category: "notifications".to_string(),
            parameter_value: value.map(String::from),
            parameter_type: ParameterType::Password,
            is_encrypted,
            is_required: false,
            default_value: None,
            validation_rules: ValidationRules::default(),
            description: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_seal_then_open() {
        let store = store();
        let sealed = store.seal(true, Some("hunter2".to_string())).unwrap();
        assert_ne!(sealed.as_deref(), Some("hunter2"));

        let opened = store
            .open(parameter("smtp.password", sealed.as_deref(), true))
            .unwrap();
        assert_eq!(opened.parameter_value.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_seal_plain_passes_through() {
        let store = store();
        assert_eq!(
            store.seal(false, Some("30".to_string())).unwrap().as_deref(),
            Some("30")
        );
        assert_eq!(store.seal(true, None).unwrap(), None);
    }

    #[test]
    fn test_open_with_other_key_fails() {
        let sealed = store().seal(true, Some("secret".to_string())).unwrap();
        let other = ParameterStore::new(&ParameterConfig {
            encryption_key: "another-key".to_string(),
            cache_ttl_seconds: 60,
        });
        let err = other
            .open(parameter("smtp.password", sealed.as_deref(), true))
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 500);
    }

    #[test]
    fn test_cache_remember_and_invalidate() {
        let store = store();
        let p = parameter("app.name", Some("Casedesk"), false);
        assert!(store.cached("app.name").is_none());

        store.remember(&p);
        assert_eq!(store.cached("app.name"), Some(p));
        assert_eq!(store.stats().hits, 1);

        assert!(store.invalidate("app.name"));
        assert!(store.cached("app.name").is_none());
    }

    #[test]
    fn test_clear_drops_every_parameter() {
        let store = store();
        store.remember(&parameter("a.one", None, false));
        store.remember(&parameter("a.two", None, false));
        assert_eq!(store.clear(), 2);
        assert_eq!(store.stats().entries, 0);
    }

    #[test]
    fn test_cache_accepts_unbounded_ttl() {
        let store = ParameterStore::new(&ParameterConfig {
            encryption_key: "unit-test-key".to_string(),
            cache_ttl_seconds: u64::MAX,
        });
        let p = parameter("app.name", Some("Casedesk"), false);
        store.remember(&p);
        assert_eq!(store.cached("app.name"), Some(p));
    }
}
