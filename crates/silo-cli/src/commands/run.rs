//! `silo run` - execute one ingestion pass

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use silo_ingest::pipeline::RunStats;
use silo_ingest::{IngestConfig, IngestPipeline};
use std::path::Path;
use tracing::{error, info};

/// Load and validate the configuration, then drive the pipeline with a
/// progress bar over file-sets.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = IngestConfig::from_file(config_path)?;

    let violations = config.validate();
    if !violations.is_empty() {
        for violation in &violations {
            error!(field = %violation.field, message = %violation.message, "Invalid configuration");
        }
        bail!(
            "Configuration {} has {} invalid field(s)",
            config_path.display(),
            violations.len()
        );
    }

    let pipeline = IngestPipeline::new(config).await?;

    let mut stats = RunStats::default();
    let selected = pipeline.prepare(&mut stats).await?;

    let bar = ProgressBar::new(selected.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    for group in &selected {
        bar.set_message(group.prefix.clone());
        pipeline.process_group(group, &mut stats).await?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!(
        groups_discovered = stats.groups_discovered,
        groups_selected = stats.groups_selected,
        groups_processed = stats.groups_processed,
        groups_empty = stats.groups_empty,
        rows_inserted = stats.rows_inserted,
        "Run complete"
    );
    Ok(())
}
