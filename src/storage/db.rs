use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::storage::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool and bring the schema up to date.
///
/// Every pooled connection enables foreign keys (the node tree relies on
/// `ON DELETE SET NULL`, owned files on `ON DELETE CASCADE`). A migration
/// failure here is fatal: the process must not start on a half-migrated
/// store.
pub fn create_pool(database_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .context("build connection pool")?;

    let mut conn = pool.get().context("get initial connection")?;
    migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool. The connection returns to the pool when
/// dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}
