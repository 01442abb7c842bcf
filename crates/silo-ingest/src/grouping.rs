//! File-set grouping
//!
//! Discovered files are clustered into file-sets sharing a name prefix (the
//! base-name substring before the first underscore). Each set carries the
//! aggregate span of its members. Pure function of the input sequence.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use silo_common::TimeRange;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::metadata::FileMetadata;

/// A named cluster of sensor files treated as one ingestion unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedSensorFileSet {
    pub prefix: String,
    pub plant_code: String,
    pub machine_code: String,

    /// `min` of member start times
    pub start: NaiveDateTime,

    /// `max` of member end times
    pub end: NaiveDateTime,

    pub files: Vec<FileMetadata>,
}

impl GroupedSensorFileSet {
    pub fn span(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Rebuild this group with a member subset, keeping the original
    /// aggregate span. The persisted span recorded at mark time must reflect
    /// the true file-set span, not a narrowed view.
    pub fn with_files(&self, files: Vec<FileMetadata>) -> Self {
        Self {
            prefix: self.prefix.clone(),
            plant_code: self.plant_code.clone(),
            machine_code: self.machine_code.clone(),
            start: self.start,
            end: self.end,
            files,
        }
    }
}

fn group_prefix(meta: &FileMetadata) -> String {
    let stem = Path::new(&meta.source_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&meta.source_file);
    stem.split('_').next().unwrap_or(stem).to_string()
}

/// Cluster files by prefix, deriving each set's aggregate span.
///
/// Plant/machine identity is taken from the first member; a member that
/// disagrees is logged but still grouped (first member wins).
pub fn group_sensor_files(files: Vec<FileMetadata>) -> Vec<GroupedSensorFileSet> {
    let mut by_prefix: BTreeMap<String, Vec<FileMetadata>> = BTreeMap::new();
    for meta in files {
        by_prefix.entry(group_prefix(&meta)).or_default().push(meta);
    }

    let mut groups = Vec::with_capacity(by_prefix.len());
    for (prefix, members) in by_prefix {
        let first = &members[0];
        for member in &members[1..] {
            if member.plant_code != first.plant_code || member.machine_code != first.machine_code {
                warn!(
                    prefix = %prefix,
                    expected = %format!("{}#{}", first.plant_code, first.machine_code),
                    found = %format!("{}#{}", member.plant_code, member.machine_code),
                    file = %member.source_file,
                    "File-set member disagrees on plant/machine identity"
                );
            }
        }

        // Groups are non-empty by construction.
        let start = members.iter().map(|f| f.start_time).min().unwrap_or(first.start_time);
        let end = members.iter().map(|f| f.end_time).max().unwrap_or(first.end_time);

        groups.push(GroupedSensorFileSet {
            prefix,
            plant_code: first.plant_code.clone(),
            machine_code: first.machine_code.clone(),
            start,
            end,
            files: members,
        });
    }

    groups
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn meta(source_file: &str, start_h: u32, end_h: u32) -> FileMetadata {
        let day = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        FileMetadata {
            plant_code: "AB".to_string(),
            machine_code: "12".to_string(),
            sensor_type: "Vib".to_string(),
            start_time: day.and_hms_opt(start_h, 0, 0).unwrap(),
            end_time: day.and_hms_opt(end_h, 0, 0).unwrap(),
            source_file: source_file.to_string(),
            source_zip: None,
            internal_path: None,
        }
    }

    #[test]
    fn test_groups_by_prefix_before_first_underscore() {
        let files = vec![
            meta("data/AB#12210625140000_Vib.csv", 14, 16),
            meta("data/AB#12210625140000_Tmp.csv", 14, 16),
            meta("data/AB#12210625180000_Vib.csv", 18, 20),
        ];
        let groups = group_sensor_files(files);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].prefix, "AB#12210625140000");
        assert_eq!(groups[0].files.len(), 2);
        assert_eq!(groups[1].prefix, "AB#12210625180000");
    }

    #[test]
    fn test_aggregate_span_is_min_max_over_members() {
        let files = vec![
            meta("AB#12210625140000_Vib.csv", 14, 15),
            meta("AB#12210625140000_Tmp.csv", 13, 16),
        ];
        let groups = group_sensor_files(files);
        assert_eq!(groups.len(), 1);
        let day = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        assert_eq!(groups[0].start, day.and_hms_opt(13, 0, 0).unwrap());
        assert_eq!(groups[0].end, day.and_hms_opt(16, 0, 0).unwrap());
    }

    #[test]
    fn test_identity_from_first_member_on_mismatch() {
        let mut other = meta("AB#12210625140000_Tmp.csv", 14, 16);
        other.plant_code = "CD".to_string();
        let files = vec![meta("AB#12210625140000_Vib.csv", 14, 16), other];
        let groups = group_sensor_files(files);
        assert_eq!(groups[0].plant_code, "AB");
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn test_rebuild_preserves_original_span() {
        let files = vec![
            meta("AB#12210625140000_Vib.csv", 13, 16),
            meta("AB#12210625140000_Tmp.csv", 14, 15),
        ];
        let group = group_sensor_files(files).remove(0);
        let narrowed = group.with_files(vec![group.files[1].clone()]);
        assert_eq!(narrowed.start, group.start);
        assert_eq!(narrowed.end, group.end);
        assert_eq!(narrowed.files.len(), 1);
    }
}
