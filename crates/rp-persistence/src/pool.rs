//! Connection pool construction and migration bootstrap.
//!
//! Constructed once at startup and shared through an `Arc`; the pool
//! itself is the one shared resource the whole core talks through.

use rp_domain::config::PersistenceConfig;
use rp_domain::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect and run pending migrations. Call once at process startup.
pub async fn connect(config: &PersistenceConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    Ok(pool)
}
