//! Glucose reports over a recent window.
//!
//! Summarizes a patient's readings from the last N days for both the
//! patient and the physician views: count, mean, extremes, how many fell
//! outside the normal range, and a per-moment breakdown.

use crate::{Error, GlucoseReading, MealMoment, Result};
use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

/// Aggregate over a set of readings
#[derive(Clone, Debug, PartialEq)]
pub struct ReadingStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub abnormal: usize,
}

impl ReadingStats {
    fn from_readings<'a>(readings: impl Iterator<Item = &'a GlucoseReading>) -> Self {
        let mut count = 0;
        let mut sum = 0.0;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        let mut abnormal = 0;

        for reading in readings {
            count += 1;
            sum += reading.value;
            min = Some(min.map_or(reading.value, |m| m.min(reading.value)));
            max = Some(max.map_or(reading.value, |m| m.max(reading.value)));
            if !reading.is_normal() {
                abnormal += 1;
            }
        }

        Self {
            count,
            mean: (count > 0).then(|| sum / count as f64),
            min,
            max,
            abnormal,
        }
    }
}

/// Report for one patient over `[from, to]`
#[derive(Clone, Debug)]
pub struct GlucoseReport {
    pub patient_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub overall: ReadingStats,
    pub pre_meal: ReadingStats,
    pub post_meal: ReadingStats,
    /// Readings in the window, newest first
    pub readings: Vec<GlucoseReading>,
}

/// Build a report from the last `days` days of readings ending at `now`
///
/// Readings for other patients or outside the window are ignored. A window
/// that is not positive or reaches past the representable calendar is a
/// validation error.
pub fn build_report(
    readings: &[GlucoseReading],
    patient_id: Uuid,
    days: i64,
    now: DateTime<Utc>,
) -> Result<GlucoseReport> {
    if days <= 0 {
        return Err(Error::Validation(format!(
            "report window must be positive, got {} days",
            days
        )));
    }
    let from = TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            Error::Validation(format!("report window of {} days is too large", days))
        })?;

    let mut selected: Vec<GlucoseReading> = readings
        .iter()
        .filter(|r| r.patient_id == patient_id && r.taken_at >= from && r.taken_at <= now)
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));

    let overall = ReadingStats::from_readings(selected.iter());
    let pre_meal = ReadingStats::from_readings(selected.iter().filter(|r| r.moment == MealMoment::Pre));
    let post_meal =
        ReadingStats::from_readings(selected.iter().filter(|r| r.moment == MealMoment::Post));

    tracing::info!(
        "Built {}-day glucose report for patient {}: {} readings, {} abnormal",
        days,
        patient_id,
        overall.count,
        overall.abnormal
    );

    Ok(GlucoseReport {
        patient_id,
        from,
        to: now,
        overall,
        pre_meal,
        post_meal,
        readings: selected,
    })
}
