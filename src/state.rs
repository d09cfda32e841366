use casedesk_config::{CorsConfig, JwtConfig, ParameterConfig};
use casedesk_db::{PgPool, init_db_pool};
use tracing::warn;

use crate::modules::system_parameters::store::ParameterStore;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_config: JwtConfig,
    pub cors_config: CorsConfig,
    pub parameters: ParameterStore,
}

impl AppState {
    pub fn new(db: PgPool, parameter_config: &ParameterConfig) -> Self {
        if parameter_config.uses_dev_key() {
            warn!("PARAMETER_ENCRYPTION_KEY is not set, using the development key");
        }

        Self {
            db,
            jwt_config: JwtConfig::from_env(),
            cors_config: CorsConfig::from_env(),
            parameters: ParameterStore::new(parameter_config),
        }
    }

    /// State over an existing pool with fixed secrets, for integration tests.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_tests(db: PgPool) -> Self {
        Self {
            db,
            jwt_config: JwtConfig {
                secret: "test-jwt-secret".to_string(),
                access_token_expiry: 3600,
            },
            cors_config: CorsConfig {
                allowed_origins: vec!["http://localhost:5173".to_string()],
            },
            parameters: ParameterStore::new(&ParameterConfig {
                encryption_key: "test-parameter-key".to_string(),
                cache_ttl_seconds: 300,
            }),
        }
    }
}

pub async fn init_app_state() -> AppState {
    AppState::new(init_db_pool().await, &ParameterConfig::from_env())
}
