//! Persistence layer: pool bootstrap and one repository per aggregate.

pub mod invoice_repository;
pub mod payment_repository;
pub mod refund_repository;

use crate::config::DatabaseConfig;
use crate::error::{CoreError, CoreResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Initialize the database connection pool.
pub async fn init_pool(config: &DatabaseConfig) -> CoreResult<PgPool> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "initializing database pool"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs));

    if let Some(idle) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle));
    }

    options
        .connect(&config.url)
        .await
        .map_err(CoreError::persistence)
}

/// Connection pool health check.
pub async fn health_check(pool: &PgPool) -> CoreResult<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(CoreError::persistence)?;
    Ok(())
}
