//! Ingestion orchestrator
//!
//! Sequences discovery, grouping, filtering, transform, load, and mark per
//! file-set. States per set: discovered → grouped → {needs-ingestion |
//! up-to-date} → loaded → marked. A set's load and mark steps share one
//! transaction, so a crash between them only costs a re-run of that set.

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::discovery;
use crate::filtering;
use crate::grouping::{self, GroupedSensorFileSet};
use crate::store::{self, loader, periods};
use crate::transform;

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// File-sets discovered before filtering
    pub groups_discovered: usize,
    /// File-sets that still needed work
    pub groups_selected: usize,
    /// File-sets fully loaded and marked
    pub groups_processed: usize,
    /// File-sets skipped because their transform produced no records
    pub groups_empty: usize,
    /// Rows actually inserted into the record table
    pub rows_inserted: u64,
}

/// The idempotent ingestion pipeline.
///
/// Holds the explicit store handle and validated configuration for one run.
pub struct IngestPipeline {
    pool: SqlitePool,
    config: IngestConfig,
    encoding: &'static Encoding,
}

impl IngestPipeline {
    /// Open the store, ensure its schema, and build a pipeline.
    ///
    /// The configuration is assumed validated (see
    /// [`IngestConfig::validate`]).
    pub async fn new(config: IngestConfig) -> Result<Self> {
        let encoding = config.resolved_encoding()?;
        let pool = store::connect(&config.db_path).await?;
        store::init_store(&pool).await?;

        Ok(Self {
            pool,
            config,
            encoding,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Discover, group, and filter: the file-sets still needing ingestion.
    pub async fn prepare(&self, stats: &mut RunStats) -> Result<Vec<GroupedSensorFileSet>> {
        let files =
            discovery::collect_sensor_files(&self.config.target_folder, &self.config.name_patterns)
                .context("File discovery failed")?;
        info!(files = files.len(), "Discovered sensor files");

        let groups = grouping::group_sensor_files(files);
        stats.groups_discovered = groups.len();

        let selected =
            filtering::filter_unprocessed_file_sets(&self.pool, groups, &self.config.events)
                .await?;
        stats.groups_selected = selected.len();
        info!(
            discovered = stats.groups_discovered,
            selected = stats.groups_selected,
            "Filtered file-sets against processed periods"
        );

        Ok(selected)
    }

    /// Transform, load, and mark one file-set.
    pub async fn process_group(
        &self,
        group: &GroupedSensorFileSet,
        stats: &mut RunStats,
    ) -> Result<()> {
        info!(prefix = %group.prefix, files = group.files.len(), "Processing file-set");

        let records = transform::transform_group(group, self.encoding);
        if records.is_empty() {
            // Marking an empty batch would falsely widen the processed
            // window.
            warn!(prefix = %group.prefix, "Empty transformed batch, skipping load and mark");
            stats.groups_empty += 1;
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin file-set transaction")?;

        let inserted = loader::load(&mut tx, &records).await?;

        for event in &self.config.events {
            if !group.span().overlaps(&event.window()) {
                continue;
            }
            for file in &group.files {
                periods::mark_processed(
                    &mut tx,
                    &file.source_file,
                    file.source_zip.as_deref(),
                    &event.event,
                    &event.window(),
                )
                .await?;
            }
        }

        tx.commit()
            .await
            .context("Failed to commit file-set transaction")?;

        info!(
            prefix = %group.prefix,
            staged = records.len(),
            inserted,
            "File-set loaded and marked"
        );
        stats.rows_inserted += inserted;
        stats.groups_processed += 1;
        Ok(())
    }

    /// Run the full pipeline over every file-set needing work.
    pub async fn run(&self) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let selected = self.prepare(&mut stats).await?;

        for group in &selected {
            self.process_group(group, &mut stats).await?;
        }

        info!(
            groups_processed = stats.groups_processed,
            groups_empty = stats.groups_empty,
            rows_inserted = stats.rows_inserted,
            "Ingestion run complete"
        );
        Ok(stats)
    }
}
