//! Read-side query and pivot
//!
//! Reshapes stored long-format data back into a wide table for analysis:
//! one row per timestamp, one column per parameter name, with values
//! coerced to numbers at read time (unparseable values become null). A side
//! table carries parameter-id/unit metadata. Read-only; never mutates the
//! store.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::metadata;

/// Filters for a read-side query
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub plant_code: String,
    pub machine_code: String,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    /// Restrict to files processed for this event
    pub event: Option<String>,
    /// Restrict to these parameter names; `None` means all
    pub parameter_names: Option<Vec<String>>,
    pub limit: i64,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            plant_code: String::new(),
            machine_code: String::new(),
            start_time: None,
            end_time: None,
            event: None,
            parameter_names: None,
            limit: 1000,
        }
    }
}

/// Parameter-id/unit side table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMeta {
    pub parameter_name: String,
    pub parameter_id: String,
    pub unit: String,
}

/// One pivoted row: a timestamp plus one value slot per column
#[derive(Debug, Clone)]
pub struct PivotRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

/// A wide table indexed by timestamp
#[derive(Debug, Clone, Default)]
pub struct PivotedData {
    /// Parameter names, sorted; `rows[i].values` aligns with this
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
    pub metadata: Vec<ParameterMeta>,
}

impl PivotedData {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// True iff `source_file` names exactly the requested plant and machine.
///
/// The filename grammar is authoritative: `AB#12...` and `AB#123...` share
/// a prefix but name different machines, so substring matching is not
/// enough.
fn identity_matches(source_file: &str, plant_code: &str, machine_code: &str) -> bool {
    let base = Path::new(source_file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source_file);
    metadata::extract_metadata(base, source_file, None)
        .is_some_and(|m| m.plant_code == plant_code && m.machine_code == machine_code)
}

/// Query the record table and pivot to wide format.
///
/// Plant/machine identity is not a `sensor_data` column; files embed it in
/// their names. A `LIKE` prefilter narrows the scan, then each row's base
/// name is re-parsed against the filename grammar for an exact match.
pub async fn extract_sensor_data(pool: &SqlitePool, params: &QueryParams) -> Result<PivotedData> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT s.timestamp, s.parameter_id, s.parameter_name, s.unit, s.value, s.source_file \
         FROM sensor_data s \
         WHERE s.timestamp IS NOT NULL AND s.source_file LIKE ",
    );
    builder.push_bind(format!(
        "%{}#{}%",
        params.plant_code, params.machine_code
    ));

    if let Some(ref event) = params.event {
        builder
            .push(
                " AND s.source_file IN \
                 (SELECT source_file FROM processed_file_periods WHERE event = ",
            )
            .push_bind(event.clone())
            .push(")");
    }
    if let Some(start) = params.start_time {
        builder.push(" AND s.timestamp >= ").push_bind(start);
    }
    if let Some(end) = params.end_time {
        builder.push(" AND s.timestamp <= ").push_bind(end);
    }
    // An empty name list would render as `IN ()`, which SQLite rejects;
    // treat it as no filter.
    if let Some(ref names) = params.parameter_names {
        if !names.is_empty() {
            builder.push(" AND s.parameter_name IN (");
            let mut separated = builder.separated(", ");
            for name in names {
                separated.push_bind(name.clone());
            }
            builder.push(")");
        }
    }
    builder.push(" ORDER BY s.timestamp LIMIT ").push_bind(params.limit);

    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to query sensor_data")?;

    let mut columns: BTreeSet<String> = BTreeSet::new();
    let mut metadata: BTreeSet<(String, String, String)> = BTreeSet::new();
    let mut by_timestamp: BTreeMap<NaiveDateTime, BTreeMap<String, Option<f64>>> = BTreeMap::new();

    for row in rows {
        let source_file: String = row.try_get("source_file")?;
        if !identity_matches(&source_file, &params.plant_code, &params.machine_code) {
            continue;
        }

        let timestamp: NaiveDateTime = row.try_get("timestamp")?;
        let parameter_id: String = row.try_get("parameter_id")?;
        let parameter_name: String = row.try_get("parameter_name")?;
        let unit: String = row.try_get("unit")?;
        let value: String = row.try_get("value")?;

        columns.insert(parameter_name.clone());
        metadata.insert((parameter_name.clone(), parameter_id, unit));
        by_timestamp
            .entry(timestamp)
            .or_default()
            .insert(parameter_name, value.trim().parse::<f64>().ok());
    }

    let columns: Vec<String> = columns.into_iter().collect();
    let rows = by_timestamp
        .into_iter()
        .map(|(timestamp, values)| PivotRow {
            values: columns
                .iter()
                .map(|c| values.get(c).copied().flatten())
                .collect(),
            timestamp,
        })
        .collect();
    let metadata = metadata
        .into_iter()
        .map(|(parameter_name, parameter_id, unit)| ParameterMeta {
            parameter_name,
            parameter_id,
            unit,
        })
        .collect();

    Ok(PivotedData {
        columns,
        rows,
        metadata,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{self, loader};
    use crate::transform::SensorRecord;
    use chrono::NaiveDate;

    fn ts(m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 21)
            .unwrap()
            .and_hms_opt(14, m, s)
            .unwrap()
    }

    fn record(timestamp: NaiveDateTime, id: &str, name: &str, value: &str) -> SensorRecord {
        SensorRecord {
            timestamp: Some(timestamp),
            parameter_id: id.to_string(),
            parameter_name: name.to_string(),
            unit: "degC".to_string(),
            value: value.to_string(),
            source_file: "data/AB#12210625144500_Vib.csv".to_string(),
            sensor_type: "Vib".to_string(),
        }
    }

    async fn seeded_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let pool = store::connect(&dir.path().join("q.db")).await.unwrap();
        store::init_store(&pool).await.unwrap();

        let records = vec![
            record(ts(45, 0), "P1", "Temp", "20.5"),
            record(ts(45, 0), "P2", "Pressure", "101.3"),
            record(ts(45, 10), "P1", "Temp", "20.6"),
            record(ts(45, 10), "P2", "Pressure", "bad-value"),
        ];
        let mut tx = pool.begin().await.unwrap();
        loader::load(&mut tx, &records).await.unwrap();
        tx.commit().await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_pivot_one_column_per_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let pool = seeded_pool(&dir).await;

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "12".to_string(),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();

        assert_eq!(pivoted.columns, vec!["Pressure".to_string(), "Temp".to_string()]);
        assert_eq!(pivoted.rows.len(), 2);
        assert_eq!(pivoted.rows[0].timestamp, ts(45, 0));
        assert_eq!(pivoted.rows[0].values, vec![Some(101.3), Some(20.5)]);
        // Unparseable value coerces to null, not an error.
        assert_eq!(pivoted.rows[1].values, vec![None, Some(20.6)]);
    }

    #[tokio::test]
    async fn test_metadata_side_table() {
        let dir = tempfile::tempdir().unwrap();
        let pool = seeded_pool(&dir).await;

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "12".to_string(),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();

        assert_eq!(pivoted.metadata.len(), 2);
        assert_eq!(pivoted.metadata[1].parameter_name, "Temp");
        assert_eq!(pivoted.metadata[1].parameter_id, "P1");
        assert_eq!(pivoted.metadata[1].unit, "degC");
    }

    #[tokio::test]
    async fn test_parameter_name_filter() {
        let dir = tempfile::tempdir().unwrap();
        let pool = seeded_pool(&dir).await;

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "12".to_string(),
            parameter_names: Some(vec!["Temp".to_string()]),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();
        assert_eq!(pivoted.columns, vec!["Temp".to_string()]);
    }

    #[tokio::test]
    async fn test_machine_code_matches_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let pool = seeded_pool(&dir).await;

        // Machine 123 shares the "AB#12" name prefix with machine 12.
        let mut other = record(ts(45, 0), "P7", "Flow", "3.3");
        other.source_file = "data/AB#123210625144500_Vib.csv".to_string();
        let mut tx = pool.begin().await.unwrap();
        loader::load(&mut tx, &[other]).await.unwrap();
        tx.commit().await.unwrap();

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "12".to_string(),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();
        assert_eq!(pivoted.columns, vec!["Pressure".to_string(), "Temp".to_string()]);

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "123".to_string(),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();
        assert_eq!(pivoted.columns, vec!["Flow".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_parameter_list_means_no_filter() {
        let dir = tempfile::tempdir().unwrap();
        let pool = seeded_pool(&dir).await;

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "12".to_string(),
            parameter_names: Some(vec![]),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();
        assert_eq!(pivoted.columns, vec!["Pressure".to_string(), "Temp".to_string()]);
    }

    #[tokio::test]
    async fn test_wrong_machine_matches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pool = seeded_pool(&dir).await;

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "99".to_string(),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();
        assert!(pivoted.is_empty());
    }

    #[tokio::test]
    async fn test_time_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let pool = seeded_pool(&dir).await;

        let params = QueryParams {
            plant_code: "AB".to_string(),
            machine_code: "12".to_string(),
            start_time: Some(ts(45, 5)),
            ..Default::default()
        };
        let pivoted = extract_sensor_data(&pool, &params).await.unwrap();
        assert_eq!(pivoted.rows.len(), 1);
        assert_eq!(pivoted.rows[0].timestamp, ts(45, 10));
    }
}
