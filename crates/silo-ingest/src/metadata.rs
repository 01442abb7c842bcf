//! Filename metadata extraction
//!
//! Sensor log files follow a fixed naming grammar:
//! `<PLANT>#<MACHINE><ddmmyy><HHMMSS>_<SENSOR_TYPE>.<ext>`, e.g.
//! `AB#12210625144500_Vib.csv`. The name encodes the logging-session start;
//! the session end is bounded by a nominal two-hour span, clamped by the
//! file's modification time when one is available (a session truncated by an
//! early file close must not overstate its span).

use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use silo_common::TimeRange;
use std::path::Path;
use std::sync::OnceLock;

/// Nominal upper bound on a single logging session
const SESSION_SPAN_HOURS: i64 = 2;

static FILENAME_GRAMMAR: OnceLock<Regex> = OnceLock::new();

fn filename_grammar() -> &'static Regex {
    FILENAME_GRAMMAR.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(
            r"^(?P<plant>[A-Z]+)#(?P<machine>\d+)(?P<date>\d{6})(?P<time>\d{6})_(?P<sensor_type>[^.]+)",
        )
        .unwrap()
    })
}

/// Metadata for one physical or archived sensor log file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub plant_code: String,
    pub machine_code: String,
    pub sensor_type: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,

    /// Path on disk, or the internal path for archived files
    pub source_file: String,

    /// Containing archive, when the file lives inside one
    pub source_zip: Option<String>,

    /// Path of the entry inside the archive
    pub internal_path: Option<String>,
}

impl FileMetadata {
    pub fn span(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Derive the session end time from the parsed start and an optional file
/// modification time.
pub fn derive_end_time(start: NaiveDateTime, mtime: Option<NaiveDateTime>) -> NaiveDateTime {
    let nominal_end = start + Duration::hours(SESSION_SPAN_HOURS);
    match mtime {
        Some(mtime) => nominal_end.min(mtime),
        None => nominal_end,
    }
}

/// Parse a file name against the grammar.
///
/// Returns `None` for names that do not fit; many files in a scanned tree
/// are expected to be irrelevant, so this is not an error.
pub fn extract_metadata(
    file_name: &str,
    source_file: &str,
    mtime: Option<NaiveDateTime>,
) -> Option<FileMetadata> {
    let caps = filename_grammar().captures(file_name)?;

    let date_str = &caps["date"];
    let time_str = &caps["time"];
    let start_time =
        NaiveDateTime::parse_from_str(&format!("{}{}", date_str, time_str), "%d%m%y%H%M%S").ok()?;

    Some(FileMetadata {
        plant_code: caps["plant"].to_string(),
        machine_code: caps["machine"].to_string(),
        sensor_type: caps["sensor_type"].to_string(),
        start_time,
        end_time: derive_end_time(start_time, mtime),
        source_file: source_file.to_string(),
        source_zip: None,
        internal_path: None,
    })
}

/// Extract metadata for a file on disk, reading its modification time.
pub fn extract_metadata_from_path(path: &Path) -> Option<FileMetadata> {
    let file_name = path.file_name()?.to_str()?;
    let mtime = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(system_time_to_naive);
    extract_metadata(file_name, &path.to_string_lossy(), mtime)
}

fn system_time_to_naive(t: std::time::SystemTime) -> NaiveDateTime {
    chrono::DateTime::<chrono::Local>::from(t).naive_local()
}
