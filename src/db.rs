use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DbConfig;

/// Connect, verify liveness on every acquire, and make sure the destination
/// tables exist before any step runs.
pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .test_before_acquire(true)
        .connect(&config.url())
        .await?;

    let schema = include_str!("../sql/schema.sql");
    sqlx::raw_sql(schema).execute(&pool).await?;

    info!("connected to {} on {}:{}", config.name, config.host, config.port);
    Ok(pool)
}
