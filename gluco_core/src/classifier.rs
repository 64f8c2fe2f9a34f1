//! Glucose anomaly classifier.
//!
//! Two independent computations over a reading:
//! - **Normal range**: pre-meal 80–130 mg/dL, post-meal up to 180 mg/dL
//! - **Severity** of an abnormal value, evaluated top-down, first band wins
//!
//! The severity bands do not nest inside the normal range (a pre-meal 65 is
//! abnormal and `medium`; a pre-meal 140 is abnormal and `low`), so the two
//! are kept as separate functions rather than one table.

use crate::alert::AlertDraft;
use crate::{AlertKind, GlucoseReading, MealMoment, Severity};

/// Whether a value is within the normal range for its meal moment
pub fn is_normal(moment: MealMoment, value: f64) -> bool {
    match moment {
        MealMoment::Pre => (80.0..=130.0).contains(&value),
        MealMoment::Post => value <= 180.0,
    }
}

/// Grade an abnormal value
///
/// ## Pre-meal
/// 1. `high` if below 60 or above 200
/// 2. `medium` if below 70 or above 160
/// 3. `low` otherwise
///
/// ## Post-meal
/// 1. `high` above 250
/// 2. `medium` above 220
/// 3. `low` otherwise
pub fn classify_severity(moment: MealMoment, value: f64) -> Severity {
    match moment {
        MealMoment::Pre => {
            if value < 60.0 || value > 200.0 {
                Severity::High
            } else if value < 70.0 || value > 160.0 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
        MealMoment::Post => {
            if value > 250.0 {
                Severity::High
            } else if value > 220.0 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
    }
}

impl GlucoseReading {
    pub fn is_normal(&self) -> bool {
        is_normal(self.moment, self.value)
    }
}

/// Alert text embedding value, meal context and severity
pub fn describe(reading: &GlucoseReading, severity: Severity) -> String {
    format!(
        "Abnormal glucose value: {} mg/dL ({} {}). Severity: {}",
        reading.value,
        reading.moment.label(),
        reading.meal.label(),
        severity
    )
}

/// Evaluate one reading; `None` when the value is normal
pub fn evaluate_reading(reading: &GlucoseReading) -> Option<AlertDraft> {
    if reading.is_normal() {
        tracing::debug!(
            "Reading {} ({} mg/dL {:?}) within normal range",
            reading.id,
            reading.value,
            reading.moment
        );
        return None;
    }

    let severity = classify_severity(reading.moment, reading.value);
    tracing::debug!(
        "Reading {} ({} mg/dL {:?}) abnormal, severity {}",
        reading.id,
        reading.value,
        reading.moment,
        severity
    );

    Some(AlertDraft {
        patient_id: reading.patient_id,
        kind: AlertKind::Glucose,
        severity,
        description: describe(reading, severity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Meal;
    use chrono::Utc;
    use uuid::Uuid;

    fn reading(value: f64, moment: MealMoment, meal: Meal) -> GlucoseReading {
        GlucoseReading {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            taken_at: Utc::now(),
            value,
            moment,
            meal,
        }
    }

    #[test]
    fn test_pre_meal_normal_range_is_inclusive() {
        assert!(!is_normal(MealMoment::Pre, 79.9));
        assert!(is_normal(MealMoment::Pre, 80.0));
        assert!(is_normal(MealMoment::Pre, 130.0));
        assert!(!is_normal(MealMoment::Pre, 130.1));
    }

    #[test]
    fn test_post_meal_has_only_upper_bound() {
        assert!(is_normal(MealMoment::Post, 10.0));
        assert!(is_normal(MealMoment::Post, 180.0));
        assert!(!is_normal(MealMoment::Post, 180.1));
    }

    #[test]
    fn test_pre_meal_severity_bands() {
        let cases = [
            (10.0, Severity::High),
            (59.9, Severity::High),
            (60.0, Severity::Medium),
            (65.0, Severity::Medium),
            (69.9, Severity::Medium),
            (70.0, Severity::Low),
            (79.0, Severity::Low),
            (131.0, Severity::Low),
            (160.0, Severity::Low),
            (160.5, Severity::Medium),
            (200.0, Severity::Medium),
            (200.5, Severity::High),
            (600.0, Severity::High),
        ];
        for (value, expected) in cases {
            assert_eq!(
                classify_severity(MealMoment::Pre, value),
                expected,
                "pre-meal {}",
                value
            );
        }
    }

    #[test]
    fn test_post_meal_severity_bands() {
        assert_eq!(classify_severity(MealMoment::Post, 181.0), Severity::Low);
        assert_eq!(classify_severity(MealMoment::Post, 220.0), Severity::Low);
        assert_eq!(classify_severity(MealMoment::Post, 220.1), Severity::Medium);
        assert_eq!(classify_severity(MealMoment::Post, 250.0), Severity::Medium);
        assert_eq!(classify_severity(MealMoment::Post, 250.1), Severity::High);
    }

    #[test]
    fn test_pre_meal_partition_has_no_gaps() {
        // Every abnormal pre-meal value lands in exactly the band its
        // thresholds describe
        let mut value = 10.0;
        while value <= 600.0 {
            if !is_normal(MealMoment::Pre, value) {
                let expected = if value < 60.0 || value > 200.0 {
                    Severity::High
                } else if (60.0..70.0).contains(&value) || (value > 160.0 && value <= 200.0) {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                assert_eq!(classify_severity(MealMoment::Pre, value), expected);
            }
            value += 0.5;
        }
    }

    #[test]
    fn test_high_post_dinner_reading_raises_high_alert() {
        let r = reading(300.0, MealMoment::Post, Meal::Dinner);

        let draft = evaluate_reading(&r).unwrap();

        assert_eq!(draft.kind, AlertKind::Glucose);
        assert_eq!(draft.severity, Severity::High);
        assert_eq!(draft.patient_id, r.patient_id);
        assert_eq!(
            draft.description,
            "Abnormal glucose value: 300 mg/dL (Post-meal Dinner). Severity: high"
        );
    }

    #[test]
    fn test_normal_reading_raises_nothing() {
        assert!(evaluate_reading(&reading(100.0, MealMoment::Pre, Meal::Breakfast)).is_none());
    }

    #[test]
    fn test_description_keeps_fractional_value() {
        let r = reading(65.5, MealMoment::Pre, Meal::Lunch);
        let draft = evaluate_reading(&r).unwrap();
        assert!(draft.description.contains("65.5 mg/dL (Pre-meal Lunch)"));
        assert_eq!(draft.severity, Severity::Medium);
    }
}
