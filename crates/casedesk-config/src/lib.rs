//! # Casedesk Config
//!
//! Configuration types for the Casedesk API, each loaded from environment
//! variables with defaults for local development:
//!
//! - [`jwt`]: JWT authentication configuration
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`database`]: Connection pool settings
//! - [`parameters`]: System parameter encryption key and cache TTL
//! - [`server`]: Listen address
//!
//! # Example
//!
//! ```ignore
//! use casedesk_config::{JwtConfig, ParameterConfig};
//!
//! let jwt_config = JwtConfig::from_env();
//! let parameter_config = ParameterConfig::from_env();
//! ```

pub mod cors;
pub mod database;
pub mod jwt;
pub mod parameters;
pub mod server;

// Re-export commonly used types at crate root
pub use cors::CorsConfig;
pub use database::DatabaseConfig;
pub use jwt::JwtConfig;
pub use parameters::ParameterConfig;
pub use server::ServerConfig;

/// Reads an environment variable and parses it, falling back to `default`
/// when it is unset or unparsable.
pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
