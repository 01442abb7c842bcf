//! File discovery
//!
//! Recursively enumerates the target directory, matching plain `.csv` files
//! and entries inside `.zip` containers against the configured name
//! patterns. Matches flow through the metadata extractor; names that do not
//! fit the grammar are dropped silently. A corrupted archive is logged and
//! skipped, never fatal to the run.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::metadata::{self, FileMetadata};

/// Recognized tabular-log extension
const LOG_EXTENSION: &str = "csv";

/// Recognized archive-container extension
const ARCHIVE_EXTENSION: &str = "zip";

fn matches_any(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| name.contains(p.as_str()))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Walk `root` and collect metadata for every matching sensor log file.
///
/// Output order is not significant.
pub fn collect_sensor_files(root: &Path, name_patterns: &[String]) -> Result<Vec<FileMetadata>> {
    let mut collected = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        if has_extension(path, LOG_EXTENSION) {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if matches_any(name, name_patterns) {
                debug!(file = %path.display(), "Matched sensor log file");
                if let Some(meta) = metadata::extract_metadata_from_path(path) {
                    collected.push(meta);
                }
            }
        } else if has_extension(path, ARCHIVE_EXTENSION) {
            match scan_archive(path, name_patterns) {
                Ok(mut entries) => collected.append(&mut entries),
                Err(e) => {
                    warn!(archive = %path.display(), error = %e, "Skipping corrupted archive");
                },
            }
        }
    }

    debug!(count = collected.len(), "File discovery complete");
    Ok(collected)
}

/// Scan one zip container for matching entries.
///
/// Archive entries carry no reliable modification time, so their session end
/// is the unclamped nominal bound.
fn scan_archive(archive_path: &Path, name_patterns: &[String]) -> Result<Vec<FileMetadata>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {}", archive_path.display()))?;

    let mut collected = Vec::new();
    // Visit entries in archive order. Cross-file parameter dedup downstream
    // is first-seen, so discovery order must be stable run-to-run.
    for index in 0..archive.len() {
        let entry_name = archive
            .by_index(index)
            .with_context(|| format!("Failed to read entry {} of {}", index, archive_path.display()))?
            .name()
            .to_string();
        if !matches_any(&entry_name, name_patterns) {
            continue;
        }
        let base_name = Path::new(&entry_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&entry_name);

        debug!(archive = %archive_path.display(), entry = %entry_name, "Matched archive entry");
        if let Some(mut meta) = metadata::extract_metadata(base_name, &entry_name, None) {
            meta.source_zip = Some(archive_path.to_string_lossy().into_owned());
            meta.internal_path = Some(entry_name.clone());
            collected.push(meta);
        }
    }

    Ok(collected)
}
