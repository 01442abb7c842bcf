//! `silo query` - read-side pivot to CSV

use anyhow::{Context, Result};
use silo_ingest::query::{extract_sensor_data, PivotedData, QueryParams};
use silo_ingest::store;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub async fn execute(db_path: &Path, params: &QueryParams, output: Option<&Path>) -> Result<()> {
    let pool = store::connect(db_path).await?;
    let pivoted = extract_sensor_data(&pool, params).await?;

    info!(
        rows = pivoted.rows.len(),
        parameters = pivoted.columns.len(),
        "Query complete"
    );

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&pivoted, file)?;
            info!(output = %path.display(), "Wrote pivoted table");
        },
        None => {
            write_csv(&pivoted, std::io::stdout().lock())?;
        },
    }
    Ok(())
}

/// Write the pivoted table, then a blank line and the parameter metadata
/// side table.
fn write_csv<W: Write>(pivoted: &PivotedData, writer: W) -> Result<()> {
    // The metadata side table has its own width.
    let mut w = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    let mut header = vec!["timestamp".to_string()];
    header.extend(pivoted.columns.iter().cloned());
    w.write_record(&header)?;

    for row in &pivoted.rows {
        let mut record = vec![row.timestamp.to_string()];
        for value in &row.values {
            record.push(value.map(|v| v.to_string()).unwrap_or_default());
        }
        w.write_record(&record)?;
    }

    w.write_record([""])?;
    w.write_record(["parameter_name", "parameter_id", "unit"])?;
    for meta in &pivoted.metadata {
        w.write_record([&meta.parameter_name, &meta.parameter_id, &meta.unit])?;
    }

    w.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use silo_ingest::query::{ParameterMeta, PivotRow};

    #[test]
    fn test_csv_layout() {
        let pivoted = PivotedData {
            columns: vec!["Pressure".to_string(), "Temp".to_string()],
            rows: vec![PivotRow {
                timestamp: NaiveDate::from_ymd_opt(2025, 6, 21)
                    .unwrap()
                    .and_hms_opt(14, 45, 0)
                    .unwrap(),
                values: vec![Some(101.3), None],
            }],
            metadata: vec![ParameterMeta {
                parameter_name: "Pressure".to_string(),
                parameter_id: "P3".to_string(),
                unit: "kPa".to_string(),
            }],
        };

        let mut buf = Vec::new();
        write_csv(&pivoted, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "timestamp,Pressure,Temp");
        assert_eq!(lines.next().unwrap(), "2025-06-21 14:45:00,101.3,");
        lines.next(); // separator
        assert_eq!(lines.next().unwrap(), "parameter_name,parameter_id,unit");
        assert_eq!(lines.next().unwrap(), "Pressure,P3,kPa");
    }
}
