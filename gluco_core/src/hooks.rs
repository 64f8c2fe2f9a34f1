//! Write paths and the post-write hooks they invoke.
//!
//! Persisting a record never creates alerts as a hidden side effect of
//! serialization. Instead each write path stores the record durably and
//! then calls the matching `on_*_created` hook explicitly, which evaluates
//! the record and emits any alerts before the write reports success.

use crate::alert::{emit, AlertDraft, AlertOutcome};
use crate::classifier::evaluate_reading;
use crate::store::{calendar_date, AlertSink, RecordStore, RecordWriter};
use crate::validation::Validate;
use crate::{
    AlertKind, Error, GlucoseReading, MedicationIntake, OperationLogEntry, Result, Severity,
    Therapy,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Hook for a reading that has just been stored
///
/// Must be invoked exactly once per stored reading; a second call raises a
/// second alert.
pub fn on_reading_created<S>(
    store: &mut S,
    reading: &GlucoseReading,
    now: DateTime<Utc>,
) -> Result<Option<AlertOutcome>>
where
    S: RecordStore + AlertSink,
{
    evaluate_reading(reading)
        .map(|draft| emit(store, draft, now))
        .transpose()
}

/// Validate, store and classify a new glucose reading
///
/// The reading is durable before classification runs. If emitting the alert
/// fails the error is returned, but the reading stays stored.
pub fn record_reading<S>(store: &mut S, reading: GlucoseReading) -> Result<Option<AlertOutcome>>
where
    S: RecordStore + RecordWriter + AlertSink,
{
    reading.validate()?;
    store.patient(reading.patient_id)?;

    store.append_reading(&reading)?;
    tracing::info!(
        "Recorded reading {} for patient {}: {} mg/dL",
        reading.id,
        reading.patient_id,
        reading.value
    );

    on_reading_created(store, &reading, Utc::now())
}

/// Draft for an intake whose quantity differs from the prescription
pub fn evaluate_intake(intake: &MedicationIntake, therapy: &Therapy) -> Option<AlertDraft> {
    if intake.quantity == therapy.quantity_per_intake {
        return None;
    }

    tracing::debug!(
        "Intake {} quantity {} differs from prescribed {}",
        intake.id,
        intake.quantity,
        therapy.quantity_per_intake
    );
    Some(AlertDraft {
        patient_id: intake.patient_id,
        kind: AlertKind::Medication,
        severity: Severity::Medium,
        description: format!(
            "Quantity taken ({}) differs from prescribed ({})",
            intake.quantity, therapy.quantity_per_intake
        ),
    })
}

/// Hook for an intake that has just been stored
pub fn on_intake_created<S>(
    store: &mut S,
    intake: &MedicationIntake,
    now: DateTime<Utc>,
) -> Result<Option<AlertOutcome>>
where
    S: RecordStore + AlertSink,
{
    let therapy = store.therapy(intake.therapy_id)?;
    evaluate_intake(intake, &therapy)
        .map(|draft| emit(store, draft, now))
        .transpose()
}

/// Validate, store and check a new medication intake
///
/// The intake must belong to the therapy's patient, and the therapy must be
/// active on the intake's calendar date. The medication is taken from the
/// therapy.
pub fn record_intake<S>(
    store: &mut S,
    mut intake: MedicationIntake,
) -> Result<Option<AlertOutcome>>
where
    S: RecordStore + RecordWriter + AlertSink,
{
    intake.validate()?;
    let therapy = store.therapy(intake.therapy_id)?;

    if therapy.patient_id != intake.patient_id {
        return Err(Error::Validation(format!(
            "therapy {} is not prescribed to patient {}",
            therapy.id, intake.patient_id
        )));
    }
    let day = calendar_date(intake.taken_at, store.calendar_offset());
    if !therapy.is_active_on(day) {
        return Err(Error::Validation(format!(
            "therapy {} is not active on {}",
            therapy.id, day
        )));
    }
    intake.medication_id = therapy.medication_id;

    store.append_intake(&intake)?;
    tracing::info!(
        "Recorded intake {} for therapy {} ({})",
        intake.id,
        intake.therapy_id,
        intake.quantity
    );

    on_intake_created(store, &intake, Utc::now())
}

/// Store a new therapy and log the prescription
pub fn prescribe_therapy<S>(store: &mut S, therapy: Therapy) -> Result<OperationLogEntry>
where
    S: RecordStore + RecordWriter,
{
    therapy.validate()?;
    let medication = store.medication(therapy.medication_id)?;

    let entry = OperationLogEntry {
        id: Uuid::new_v4(),
        physician_id: therapy.physician_id,
        patient_id: therapy.patient_id,
        recorded_at: Utc::now(),
        operation: "Therapy prescription".into(),
        details: format!(
            "Prescribed {}, {} time(s) a day",
            medication.name, therapy.daily_intakes
        ),
    };

    store.insert_therapy(therapy)?;
    store.append_operation(&entry)?;

    tracing::info!(
        "Physician {} prescribed {} to patient {}",
        entry.physician_id,
        medication.name,
        entry.patient_id
    );
    Ok(entry)
}
