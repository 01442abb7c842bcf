//! Overlap filtering
//!
//! Intersects file-set members against the configured event windows and the
//! processed-period state, producing the minimal set of files still needing
//! ingestion. The group-level decision is "does this set need any work": a
//! file unprocessed for any matching event is retained, with file-granular
//! accounting deferred to the mark step.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::EventInfo;
use crate::grouping::GroupedSensorFileSet;
use crate::store::periods;

/// Filter groups down to those with at least one file that overlaps a
/// configured event window and is not yet fully processed for it.
///
/// Surviving groups keep only their retained files but preserve the original
/// aggregate span (see [`GroupedSensorFileSet::with_files`]).
pub async fn filter_unprocessed_file_sets(
    pool: &SqlitePool,
    groups: Vec<GroupedSensorFileSet>,
    events: &[EventInfo],
) -> Result<Vec<GroupedSensorFileSet>> {
    let mut filtered = Vec::new();

    for group in groups {
        let mut retained = Vec::new();

        for file in &group.files {
            for event in events {
                if !file.span().overlaps(&event.window()) {
                    continue;
                }
                if !periods::is_processed(pool, &file.source_file, &event.event, &event.window())
                    .await?
                {
                    // First unprocessed match wins.
                    retained.push(file.clone());
                    break;
                }
            }
        }

        if retained.is_empty() {
            debug!(prefix = %group.prefix, "File-set up to date, dropping");
            continue;
        }

        debug!(
            prefix = %group.prefix,
            retained = retained.len(),
            total = group.files.len(),
            "File-set needs ingestion"
        );
        filtered.push(group.with_files(retained));
    }

    Ok(filtered)
}
