mod condition;
mod driver;
mod entity;
mod handle;
mod mapper;
mod page;
mod statement;

use std::time::Duration;

pub use condition::*;
pub use driver::*;
pub use entity::*;
pub use handle::*;
pub use mapper::*;
pub use page::*;
pub use statement::*;

use crate::config::DatabaseConfig;

pub type PostgresHandle<'c> = Handle<'c, sqlx::Postgres>;
pub type SqliteHandle<'c> = Handle<'c, sqlx::Sqlite>;

// Application default db driver
// if required change this
pub type AppDbDriver = sqlx::Postgres;
pub type AppDbHandle<'c> = Handle<'c, AppDbDriver>;

pub fn map_err(e: sqlx::Error) -> crate::Error {
    crate::Error::Database(anyhow::Error::new(e))
}

/// Opens the application pool described by `config`.
pub async fn connect(
    config: &DatabaseConfig,
) -> crate::Result<sqlx::Pool<AppDbDriver>> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting database"
    );
    sqlx::pool::PoolOptions::<AppDbDriver>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(map_err)
}
