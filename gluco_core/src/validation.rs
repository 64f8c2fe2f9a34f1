//! Field-level validation applied at the data-entry boundary.
//!
//! The evaluators assume every persisted record already passed these checks.

use crate::{Error, GlucoseReading, Medication, MedicationIntake, Patient, Physician, Result, Therapy};

/// Physiological range accepted for a glucose value, mg/dL
pub const GLUCOSE_MIN: f64 = 10.0;
pub const GLUCOSE_MAX: f64 = 600.0;

/// Smallest quantity a therapy may prescribe per intake
pub const MIN_QUANTITY_PER_INTAKE: f64 = 0.1;

/// Records that can be checked before they are persisted
pub trait Validate {
    /// Collect every problem with the record
    fn validation_errors(&self) -> Vec<String>;

    /// Fail with all problems joined into one message
    fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors.join("; ")))
        }
    }
}

fn check_name(errors: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(format!("{} must not be empty", field));
    }
}

impl Validate for Physician {
    fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_name(&mut errors, "first name", &self.first_name);
        check_name(&mut errors, "last name", &self.last_name);
        errors
    }
}

impl Validate for Patient {
    fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_name(&mut errors, "first name", &self.first_name);
        check_name(&mut errors, "last name", &self.last_name);
        errors
    }
}

impl Validate for Medication {
    fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_name(&mut errors, "medication name", &self.name);
        errors
    }
}

impl Validate for GlucoseReading {
    fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.value.is_finite() || self.value < GLUCOSE_MIN || self.value > GLUCOSE_MAX {
            errors.push(format!(
                "glucose value must be between {} and {} mg/dL, got {}",
                GLUCOSE_MIN, GLUCOSE_MAX, self.value
            ));
        }
        errors
    }
}

impl Validate for MedicationIntake {
    fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            errors.push(format!(
                "intake quantity must be greater than zero, got {}",
                self.quantity
            ));
        }
        errors
    }
}

impl Validate for Therapy {
    fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.start_date > self.end_date {
            errors.push(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            ));
        }
        if self.daily_intakes < 1 {
            errors.push("daily intake count must be at least 1".to_string());
        }
        if !self.quantity_per_intake.is_finite()
            || self.quantity_per_intake < MIN_QUANTITY_PER_INTAKE
        {
            errors.push(format!(
                "quantity per intake must be at least {}, got {}",
                MIN_QUANTITY_PER_INTAKE, self.quantity_per_intake
            ));
        }
        errors
    }
}
