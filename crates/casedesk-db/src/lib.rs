//! # Casedesk DB
//!
//! PostgreSQL connection pool initialization and embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use casedesk_db::{init_db_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = init_db_pool().await;
//!     run_migrations(&pool).await.expect("migrations failed");
//! }
//! ```

use casedesk_config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

// Re-export PgPool for convenience
pub use sqlx::PgPool;

/// Migrations embedded from the workspace `migrations/` directory.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Initializes a PostgreSQL connection pool from [`DatabaseConfig`].
///
/// # Panics
///
/// Panics if `DATABASE_URL` is not set or the connection cannot be
/// established. Call once during startup.
pub async fn init_db_pool() -> PgPool {
    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .expect("Failed to connect to database");

    info!(max_connections = config.max_connections, "Database pool initialized");
    pool
}

/// Applies pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
