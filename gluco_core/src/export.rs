//! CSV export of alerts and readings.
//!
//! Rows are appended to the target file; headers are written only when the
//! file is new or empty, so repeated exports accumulate into one sheet.

use crate::{Alert, GlucoseReading, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the alert export
#[derive(Debug, serde::Serialize)]
struct AlertRow {
    id: String,
    created_at: String,
    patient_id: String,
    physician_id: String,
    kind: String,
    severity: String,
    resolved: bool,
    description: String,
}

impl From<&Alert> for AlertRow {
    fn from(alert: &Alert) -> Self {
        AlertRow {
            id: alert.id.to_string(),
            created_at: alert.created_at.to_rfc3339(),
            patient_id: alert.patient_id.to_string(),
            physician_id: alert.physician_id.to_string(),
            kind: alert.kind.to_string(),
            severity: alert.severity.to_string(),
            resolved: alert.resolved,
            description: alert.description.clone(),
        }
    }
}

/// A row in the reading export
#[derive(Debug, serde::Serialize)]
struct ReadingRow {
    id: String,
    taken_at: String,
    patient_id: String,
    value: f64,
    moment: &'static str,
    meal: &'static str,
    normal: bool,
}

impl From<&GlucoseReading> for ReadingRow {
    fn from(reading: &GlucoseReading) -> Self {
        ReadingRow {
            id: reading.id.to_string(),
            taken_at: reading.taken_at.to_rfc3339(),
            patient_id: reading.patient_id.to_string(),
            value: reading.value,
            moment: reading.moment.label(),
            meal: reading.meal.label(),
            normal: reading.is_normal(),
        }
    }
}

/// Append alerts to a CSV file, returning how many rows were written
pub fn export_alerts(alerts: &[Alert], csv_path: &Path) -> Result<usize> {
    append_rows(csv_path, alerts.iter().map(AlertRow::from))
}

/// Append readings to a CSV file, returning how many rows were written
pub fn export_readings(readings: &[GlucoseReading], csv_path: &Path) -> Result<usize> {
    append_rows(csv_path, readings.iter().map(ReadingRow::from))
}

fn append_rows<R, I>(csv_path: &Path, rows: I) -> Result<usize>
where
    R: serde::Serialize,
    I: Iterator<Item = R>,
{
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} rows to {:?}", count, csv_path);
    Ok(count)
}
