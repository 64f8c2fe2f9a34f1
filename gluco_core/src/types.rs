//! Core domain types for the Gluco system.
//!
//! This module defines the records the evaluators read and write:
//! - Actors (patients, physicians) and the medication formulary
//! - Therapies and medication intakes
//! - Glucose readings with meal-timing context
//! - Alerts with ordinal severity

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Actors
// ============================================================================

/// A diabetologist who prescribes therapies and receives alerts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Physician {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl Physician {
    pub fn display_name(&self) -> String {
        format!("Dr. {} {}", self.first_name, self.last_name)
    }
}

/// Lifestyle risk factors recorded on the patient profile
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RiskFactors {
    pub smoker: bool,
    pub former_smoker: bool,
    pub alcohol_problems: bool,
    pub substance_problems: bool,
    pub obesity: bool,
}

/// A patient under diabetes care
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    /// At most one physician at a time; alerts are routed here
    pub assigned_physician: Option<Uuid>,
    #[serde(default)]
    pub risk_factors: RiskFactors,
    #[serde(default)]
    pub past_conditions: String,
    #[serde(default)]
    pub comorbidities: String,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ============================================================================
// Medications and Therapies
// ============================================================================

/// Class of antidiabetic medication
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MedicationKind {
    Insulin,
    Oral,
}

impl FromStr for MedicationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "insulin" => Ok(MedicationKind::Insulin),
            "oral" => Ok(MedicationKind::Oral),
            other => Err(Error::Validation(format!(
                "unknown medication kind '{}' (expected insulin or oral)",
                other
            ))),
        }
    }
}

/// A medication in the formulary
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    pub kind: MedicationKind,
    #[serde(default)]
    pub description: String,
}

/// A prescription binding patient, physician and medication over a date range
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Therapy {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Prescribing physician
    pub physician_id: Uuid,
    pub medication_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_intakes: u32,
    pub quantity_per_intake: f64,
    #[serde(default)]
    pub instructions: String,
    pub active: bool,
}

impl Therapy {
    /// `active` and `start_date <= day <= end_date`
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.active && self.start_date <= day && day <= self.end_date
    }
}

/// A single recorded act of taking medication under a therapy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicationIntake {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub therapy_id: Uuid,
    pub medication_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub quantity: f64,
}

// ============================================================================
// Glucose Readings
// ============================================================================

/// Timing of a reading relative to the meal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MealMoment {
    Pre,
    Post,
}

impl MealMoment {
    pub fn label(&self) -> &'static str {
        match self {
            MealMoment::Pre => "Pre-meal",
            MealMoment::Post => "Post-meal",
        }
    }
}

impl FromStr for MealMoment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pre" => Ok(MealMoment::Pre),
            "post" => Ok(MealMoment::Post),
            other => Err(Error::Validation(format!(
                "unknown meal moment '{}' (expected pre or post)",
                other
            ))),
        }
    }
}

/// Meal slot a reading refers to
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
}

impl Meal {
    pub fn label(&self) -> &'static str {
        match self {
            Meal::Breakfast => "Breakfast",
            Meal::Lunch => "Lunch",
            Meal::Dinner => "Dinner",
        }
    }
}

impl FromStr for Meal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "breakfast" => Ok(Meal::Breakfast),
            "lunch" => Ok(Meal::Lunch),
            "dinner" => Ok(Meal::Dinner),
            other => Err(Error::Validation(format!(
                "unknown meal '{}' (expected breakfast, lunch or dinner)",
                other
            ))),
        }
    }
}

/// A single glucose measurement in mg/dL
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GlucoseReading {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub value: f64,
    pub moment: MealMoment,
    pub meal: Meal,
}

// ============================================================================
// Alerts
// ============================================================================

/// What triggered an alert
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Glucose,
    Medication,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Glucose => f.write_str("glucose"),
            AlertKind::Medication => f.write_str("medication"),
        }
    }
}

/// Alert severity, totally ordered `Low < Medium < High`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => f.write_str("low"),
            Severity::Medium => f.write_str("medium"),
            Severity::High => f.write_str("high"),
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(Error::Validation(format!(
                "unknown severity '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

/// A system-generated notification about a patient, addressed to a physician
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub physician_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub kind: AlertKind,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub resolved: bool,
}

/// A physician marking an alert as handled
///
/// Stored as its own event so the alert log itself stays insert-only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AlertResolution {
    pub alert_id: Uuid,
    pub physician_id: Uuid,
    pub resolved_at: DateTime<Utc>,
}

// ============================================================================
// Operation Log
// ============================================================================

/// Audit entry for a physician operation on a patient
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OperationLogEntry {
    pub id: Uuid,
    pub physician_id: Uuid,
    pub patient_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub operation: String,
    pub details: String,
}
