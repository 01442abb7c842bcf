//! Incremental record loading
//!
//! `sensor_data` is the append-only union of every long-format record ever
//! loaded. There is no declared key: uniqueness is enforced by staging each
//! batch and inserting only its set-difference against the rows already
//! stored (full-row equality across all columns). Reloading an identical
//! batch is therefore a no-op.

use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::transform::SensorRecord;

/// SQLite's bind-variable budget makes us stage in chunks.
const STAGE_CHUNK_ROWS: usize = 100;

/// Idempotently create the `sensor_data` table.
pub async fn init(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            timestamp TIMESTAMP,
            parameter_id TEXT,
            parameter_name TEXT,
            unit TEXT,
            value TEXT,
            source_file TEXT,
            sensor_type TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create sensor_data table")?;

    Ok(())
}

/// Load a batch, suppressing rows that already exist byte-for-byte.
///
/// Returns the number of rows actually inserted.
pub async fn load(tx: &mut Transaction<'_, Sqlite>, records: &[SensorRecord]) -> Result<u64> {
    sqlx::query(
        r#"
        CREATE TEMP TABLE _silo_staged (
            timestamp TIMESTAMP,
            parameter_id TEXT,
            parameter_name TEXT,
            unit TEXT,
            value TEXT,
            source_file TEXT,
            sensor_type TEXT
        )
        "#,
    )
    .execute(&mut **tx)
    .await
    .context("Failed to create staging table")?;

    for chunk in records.chunks(STAGE_CHUNK_ROWS) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO _silo_staged \
             (timestamp, parameter_id, parameter_name, unit, value, source_file, sensor_type) ",
        );
        builder.push_values(chunk, |mut b, record| {
            b.push_bind(record.timestamp)
                .push_bind(&record.parameter_id)
                .push_bind(&record.parameter_name)
                .push_bind(&record.unit)
                .push_bind(&record.value)
                .push_bind(&record.source_file)
                .push_bind(&record.sensor_type);
        });
        builder
            .build()
            .execute(&mut **tx)
            .await
            .context("Failed to stage record batch")?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO sensor_data
        SELECT timestamp, parameter_id, parameter_name, unit, value, source_file, sensor_type
        FROM _silo_staged
        EXCEPT
        SELECT timestamp, parameter_id, parameter_name, unit, value, source_file, sensor_type
        FROM sensor_data
        "#,
    )
    .execute(&mut **tx)
    .await
    .context("Failed to insert record batch")?;

    sqlx::query("DROP TABLE _silo_staged")
        .execute(&mut **tx)
        .await
        .context("Failed to drop staging table")?;

    let inserted = result.rows_affected();
    debug!(staged = records.len(), inserted, "Loaded record batch");
    Ok(inserted)
}

/// Total row count of the record table. Used by tests and run reporting.
pub async fn row_count(pool: &SqlitePool) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensor_data")
        .fetch_one(pool)
        .await
        .context("Failed to count sensor_data rows")?;
    Ok(count.0)
}
