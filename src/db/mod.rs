pub mod models;
pub mod queries;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::{path::Path, str::FromStr, time::Duration};

/// FreeRADIUS writes accounting rows into the same file, so writers wait
/// for the lock instead of failing with SQLITE_BUSY straight away.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid DATABASE_URL '{}'", database_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    ensure_parent_dir(&connect_opts.clone().get_filename()).await?;

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(connect_opts)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database initialized at {}", database_url);
    Ok(pool)
}

async fn ensure_parent_dir(db_file: &Path) -> Result<()> {
    if db_file.as_os_str() == ":memory:" {
        return Ok(());
    }
    match db_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("cannot create database directory {}", dir.display()))?;
        }
        _ => {}
    }
    Ok(())
}

/// Single-connection in-memory database with the real schema.
/// One connection because every `:memory:` connection is its own database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
