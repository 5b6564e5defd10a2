//! Postgres connection pool.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tracing::info;

use synergy_core::config::DatabaseConfig;
use synergy_core::{SynergyError, SynergyResult};

/// Pooled Postgres connections, safe to share between tasks.
pub type DbPool = PgPool;

fn ssl_mode(mode: &str) -> SynergyResult<PgSslMode> {
    mode.parse()
        .map_err(|_| SynergyError::config(format!("unsupported ssl mode '{}'", mode)))
}

/// Connect to Postgres and verify the connection with a round trip.
pub async fn init_pool(config: &DatabaseConfig) -> SynergyResult<DbPool> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
        .ssl_mode(ssl_mode(&config.ssl_mode)?);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            SynergyError::Connection(format!("postgres at {}:{}: {}", config.host, config.port, e))
        })?;

    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        "Connected to Postgres"
    );
    Ok(pool)
}
