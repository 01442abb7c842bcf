//! Processed-period state
//!
//! For each `(source_file, event)` pair, the widest `[start_time, end_time]`
//! span known to have been successfully ingested. Updates follow the
//! monotonic-widening rule: an update is applied only when the incoming
//! `end_time` strictly exceeds the stored one; `start_time` is refreshed to
//! the incoming value on any accepted update. Rows are never deleted here.

use anyhow::{Context, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use silo_common::TimeRange;

/// Idempotently create the `processed_file_periods` table.
pub async fn init(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_file_periods (
            source_file TEXT NOT NULL,
            source_zip TEXT,
            event TEXT NOT NULL,
            start_time TIMESTAMP NOT NULL,
            end_time TIMESTAMP NOT NULL,
            PRIMARY KEY (source_file, event)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create processed_file_periods table")?;

    Ok(())
}

/// True iff a stored period for `(source_file, event)` fully covers
/// `window`. Partial overlap counts as not processed; the pipeline re-ingests
/// rather than risk gaps.
pub async fn is_processed(
    pool: &SqlitePool,
    source_file: &str,
    event: &str,
    window: &TimeRange,
) -> Result<bool> {
    let row = sqlx::query(
        r#"
        SELECT 1 FROM processed_file_periods
        WHERE source_file = ? AND event = ?
          AND start_time <= ? AND end_time >= ?
        "#,
    )
    .bind(source_file)
    .bind(event)
    .bind(window.start)
    .bind(window.end)
    .fetch_optional(pool)
    .await
    .context("Failed to query processed_file_periods")?;

    Ok(row.is_some())
}

/// Record `window` as processed for `(source_file, event)`.
///
/// Single atomic upsert: inserts if absent, otherwise widens under the
/// strict-greater guard on `end_time`. Repeating a call with identical
/// arguments is a no-op.
pub async fn mark_processed(
    tx: &mut Transaction<'_, Sqlite>,
    source_file: &str,
    source_zip: Option<&str>,
    event: &str,
    window: &TimeRange,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO processed_file_periods
            (source_file, source_zip, event, start_time, end_time)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (source_file, event) DO UPDATE
        SET start_time = excluded.start_time,
            end_time = excluded.end_time
        WHERE excluded.end_time > processed_file_periods.end_time
        "#,
    )
    .bind(source_file)
    .bind(source_zip)
    .bind(event)
    .bind(window.start)
    .bind(window.end)
    .execute(&mut **tx)
    .await
    .context("Failed to mark file/event as processed")?;

    Ok(())
}

/// Fetch the stored period for a key, if any. Used by tests and the
/// read-side event filter.
pub async fn get_period(
    pool: &SqlitePool,
    source_file: &str,
    event: &str,
) -> Result<Option<TimeRange>> {
    let row: Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)> = sqlx::query_as(
        r#"
        SELECT start_time, end_time FROM processed_file_periods
        WHERE source_file = ? AND event = ?
        "#,
    )
    .bind(source_file)
    .bind(event)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch processed period")?;

    Ok(row.map(|(start, end)| TimeRange::new(start, end)))
}
