//! SQLite persistence layer for story trees.
//!
//! Exposes a connection-pool constructor, embedded migrations, and the
//! repository layer. Repositories are zero-sized structs whose async methods
//! take `&DbPool` as the first argument.

pub mod models;
pub mod repositories;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use storyreel_core::error::CoreError;

pub type DbPool = sqlx::SqlitePool;

/// Migrations embedded from `crates/db/migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool size. SQLite serializes writes, so this mostly bounds readers.
const MAX_CONNECTIONS: u32 = 20;

/// Error type for repository operations.
///
/// Domain rule violations (illegal status transitions, duplicate roots,
/// missing parents) surface as [`CoreError`]; everything else is the
/// underlying driver error.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Create a connection pool from a database URL.
///
/// The database file is created if missing; WAL mode keeps reads cheap
/// while a write is in flight.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
}

/// Apply any pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Cheap connectivity probe used by the health endpoint.
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
