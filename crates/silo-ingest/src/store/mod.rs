//! Embedded analytical store
//!
//! SQLite database addressed by a file path, holding two tables:
//! `processed_file_periods` (reconciliation state, see [`periods`]) and
//! `sensor_data` (the append-only long-format record table, see [`loader`]).
//!
//! The pool is acquired once per run and passed explicitly into the core;
//! each file-set's load and mark steps share one transaction.

pub mod loader;
pub mod periods;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open (creating if missing) the store at `db_path`.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open store at {}", db_path.display()))?;

    Ok(pool)
}

/// Idempotently ensure the persisted structure exists.
pub async fn init_store(pool: &SqlitePool) -> Result<()> {
    periods::init(pool).await?;
    loader::init(pool).await?;
    Ok(())
}
