//! Wide-to-long record transformation
//!
//! Raw logs are wide-format tables: a leading timestamp column, then one
//! column per parameter, under a three-row header (parameter id / parameter
//! name / unit). The transformer decodes the configured text encoding,
//! strips trailing-comma artifacts, prunes placeholder columns, and melts
//! the table into one long-format record per (timestamp, parameter) pair.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::grouping::GroupedSensorFileSet;
use crate::metadata::FileMetadata;

/// Placeholder token marking a channel with no mapped signal
const NO_SIGNAL: &str = "-";

/// One long-format observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// `None` when the raw timestamp failed to parse
    pub timestamp: Option<NaiveDateTime>,
    pub parameter_id: String,
    pub parameter_name: String,
    pub unit: String,
    /// Raw value text; numeric coercion is a read-time concern
    pub value: String,
    pub source_file: String,
    pub sensor_type: String,
}

/// Read a file's raw bytes, from disk or from inside its archive.
fn read_raw_bytes(file: &FileMetadata) -> Result<Vec<u8>> {
    match (&file.source_zip, &file.internal_path) {
        (Some(zip_path), Some(internal)) => {
            let f = File::open(zip_path)
                .with_context(|| format!("Failed to open archive {}", zip_path))?;
            let mut archive = ZipArchive::new(f)
                .with_context(|| format!("Failed to read archive {}", zip_path))?;
            let mut entry = archive
                .by_name(internal)
                .with_context(|| format!("Missing archive entry {}", internal))?;
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .with_context(|| format!("Failed to read archive entry {}", internal))?;
            Ok(buf)
        },
        _ => {
            let mut buf = Vec::new();
            File::open(&file.source_file)
                .with_context(|| format!("Failed to open {}", file.source_file))?
                .read_to_end(&mut buf)
                .with_context(|| format!("Failed to read {}", file.source_file))?;
            Ok(buf)
        },
    }
}

/// Decode raw bytes and strip the trailing-comma artifacts some loggers
/// append to every line.
fn decode_and_clean(raw: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(raw);
    if had_errors {
        bail!("Input is not valid {}", encoding.name());
    }

    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        cleaned.push_str(line.trim_end_matches(','));
        cleaned.push('\n');
    }
    Ok(cleaned)
}

/// Timestamp formats observed in the field; parse failures become `None`.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// A retained wide-table column
struct Column {
    index: usize,
    parameter_id: String,
    parameter_name: String,
    unit: String,
}

/// Transform one wide-format file into long-format records.
pub fn transform_file(file: &FileMetadata, encoding: &'static Encoding) -> Result<Vec<SensorRecord>> {
    debug!(file = %file.source_file, sensor_type = %file.sensor_type, "Transforming file");

    let raw = read_raw_bytes(file)?;
    let cleaned = decode_and_clean(&raw, encoding)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(cleaned.as_bytes());

    let mut rows = reader.records();
    let ids = rows
        .next()
        .transpose()
        .context("Failed to read parameter-id header row")?
        .context("Missing parameter-id header row")?;
    let names = rows
        .next()
        .transpose()
        .context("Failed to read parameter-name header row")?
        .context("Missing parameter-name header row")?;
    let units = rows
        .next()
        .transpose()
        .context("Failed to read unit header row")?
        .context("Missing unit header row")?;

    if ids.len() < 2 {
        bail!("Header has no parameter columns");
    }

    // Build the retained column list: drop placeholder channels (name and
    // unit both "-") and duplicated header triples (first occurrence wins).
    let mut columns = Vec::new();
    let mut seen_headers: HashSet<(String, String, String)> = HashSet::new();
    for index in 1..ids.len() {
        let parameter_id = ids.get(index).unwrap_or("").trim().to_string();
        let parameter_name = names.get(index).unwrap_or("").trim().to_string();
        let unit = units.get(index).unwrap_or("").trim().to_string();

        if parameter_name == NO_SIGNAL && unit == NO_SIGNAL {
            continue;
        }
        let key = (parameter_id.clone(), parameter_name.clone(), unit.clone());
        if !seen_headers.insert(key) {
            continue;
        }
        columns.push(Column {
            index,
            parameter_id,
            parameter_name,
            unit,
        });
    }

    // Melt: collect data rows once, then emit column-major like the wide
    // table's unpivot.
    let mut data_rows: Vec<(Option<NaiveDateTime>, csv::StringRecord)> = Vec::new();
    for row in rows {
        let row = row.context("Failed to read data row")?;
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let timestamp = row.get(0).and_then(parse_timestamp);
        data_rows.push((timestamp, row));
    }

    let mut records = Vec::with_capacity(columns.len() * data_rows.len());
    for col in &columns {
        for (timestamp, row) in &data_rows {
            records.push(SensorRecord {
                timestamp: *timestamp,
                parameter_id: col.parameter_id.clone(),
                parameter_name: col.parameter_name.clone(),
                unit: col.unit.clone(),
                value: row.get(col.index).unwrap_or("").trim().to_string(),
                source_file: file.source_file.clone(),
                sensor_type: file.sensor_type.clone(),
            });
        }
    }

    Ok(records)
}

/// Transform every file in a set, deduplicating parameters across files:
/// once a parameter id has appeared in an earlier file's output, later
/// files' rows for it are discarded (sibling files may legitimately carry
/// overlapping channel sets).
///
/// A per-file failure is logged and that file skipped; the result is the
/// concatenation of the survivors, possibly empty.
pub fn transform_group(
    group: &GroupedSensorFileSet,
    encoding: &'static Encoding,
) -> Vec<SensorRecord> {
    debug!(prefix = %group.prefix, files = group.files.len(), "Transforming file-set");

    let mut seen_params: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for file in &group.files {
        match transform_file(file, encoding) {
            Ok(file_records) => {
                let mut new_params: HashSet<String> = HashSet::new();
                for record in file_records {
                    if seen_params.contains(&record.parameter_id) {
                        continue;
                    }
                    new_params.insert(record.parameter_id.clone());
                    records.push(record);
                }
                seen_params.extend(new_params);
            },
            Err(e) => {
                warn!(
                    file = %file.source_file,
                    archive = ?file.source_zip,
                    error = %e,
                    "Failed to transform file, skipping"
                );
            },
        }
    }

    records
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use encoding_rs::UTF_8;

    fn write_file(dir: &std::path::Path, name: &str, content: &str) -> FileMetadata {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        crate::metadata::extract_metadata_from_path(&path).unwrap()
    }

    const WIDE_CSV: &str = "\
time,P1,P2,P3,
,Temp,-,Pressure,
,degC,-,kPa,
2025/06/21 14:45:00,20.5,99,101.3,
2025/06/21 14:45:10,20.6,98,101.4,
";

    #[test]
    fn test_placeholder_columns_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write_file(dir.path(), "AB#12210625144500_Vib.csv", WIDE_CSV);

        let records = transform_file(&meta, UTF_8).unwrap();
        // Two retained parameters over two data rows.
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.parameter_id != "P2"));
        assert!(records.iter().any(|r| r.parameter_id == "P1"));
        assert!(records.iter().any(|r| r.parameter_id == "P3"));
    }

    #[test]
    fn test_records_carry_header_levels_and_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write_file(dir.path(), "AB#12210625144500_Vib.csv", WIDE_CSV);

        let records = transform_file(&meta, UTF_8).unwrap();
        let p1: Vec<_> = records.iter().filter(|r| r.parameter_id == "P1").collect();
        assert_eq!(p1.len(), 2);
        assert_eq!(p1[0].parameter_name, "Temp");
        assert_eq!(p1[0].unit, "degC");
        assert_eq!(p1[0].value, "20.5");
        assert_eq!(p1[0].sensor_type, "Vib");
        assert_eq!(
            p1[0].timestamp,
            Some(
                NaiveDate::from_ymd_opt(2025, 6, 21)
                    .unwrap()
                    .and_hms_opt(14, 45, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_unparseable_timestamp_becomes_none() {
        let csv = "\
time,P1,
,Temp,
,degC,
not-a-time,20.5,
";
        let dir = tempfile::tempdir().unwrap();
        let meta = write_file(dir.path(), "AB#12210625144500_Vib.csv", csv);

        let records = transform_file(&meta, UTF_8).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].timestamp.is_none());
        assert_eq!(records[0].value, "20.5");
    }

    #[test]
    fn test_duplicate_header_triples_keep_first() {
        let csv = "\
time,P1,P1,
,Temp,Temp,
,degC,degC,
2025/06/21 14:45:00,20.5,21.0,
";
        let dir = tempfile::tempdir().unwrap();
        let meta = write_file(dir.path(), "AB#12210625144500_Vib.csv", csv);

        let records = transform_file(&meta, UTF_8).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "20.5");
    }

    #[test]
    fn test_cross_file_parameter_dedup_first_seen_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(
            dir.path(),
            "AB#12210625144500_Vib.csv",
            "time,P1,\n,Temp,\n,degC,\n2025/06/21 14:45:00,1.0,\n",
        );
        let second = write_file(
            dir.path(),
            "AB#12210625144500_Tmp.csv",
            "time,P1,P9,\n,Temp,Other,\n,degC,V,\n2025/06/21 14:45:00,2.0,3.0,\n",
        );

        let group = crate::grouping::group_sensor_files(vec![first, second]).remove(0);
        let records = transform_group(&group, UTF_8);

        let p1: Vec<_> = records.iter().filter(|r| r.parameter_id == "P1").collect();
        assert_eq!(p1.len(), 1);
        assert_eq!(p1[0].value, "1.0");
        assert!(records.iter().any(|r| r.parameter_id == "P9"));
    }

    #[test]
    fn test_failed_file_is_skipped_siblings_survive() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_file(
            dir.path(),
            "AB#12210625144500_Vib.csv",
            "time,P1,\n,Temp,\n,degC,\n2025/06/21 14:45:00,1.0,\n",
        );
        // Header only has the timestamp column: no parameter columns.
        let bad = write_file(dir.path(), "AB#12210625144500_Tmp.csv", "time\n");

        let group = crate::grouping::group_sensor_files(vec![bad, good]).remove(0);
        let records = transform_group(&group, UTF_8);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parameter_id, "P1");
    }

    #[test]
    fn test_invalid_encoding_fails_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AB#12210625144500_Vib.csv");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xc3, 0x28]).unwrap();
        let meta = crate::metadata::extract_metadata_from_path(&path).unwrap();

        assert!(transform_file(&meta, UTF_8).is_err());
    }

    #[test]
    fn test_reads_from_inside_archive() {
        use std::io::Write;
        use zip::write::FileOptions;

        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("logs.zip");
        let f = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(f);
        writer
            .start_file("AB#12210625144500_Vib.csv", FileOptions::default())
            .unwrap();
        writer
            .write_all(b"time,P1,\n,Temp,\n,degC,\n2025/06/21 14:45:00,1.0,\n")
            .unwrap();
        writer.finish().unwrap();

        let mut meta = crate::metadata::extract_metadata(
            "AB#12210625144500_Vib.csv",
            "AB#12210625144500_Vib.csv",
            None,
        )
        .unwrap();
        meta.source_zip = Some(zip_path.to_string_lossy().into_owned());
        meta.internal_path = Some("AB#12210625144500_Vib.csv".to_string());

        let records = transform_file(&meta, UTF_8).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "1.0");
    }
}
