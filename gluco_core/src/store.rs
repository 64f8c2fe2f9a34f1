//! Record store contracts and their implementations.
//!
//! The evaluators only see the [`RecordStore`], [`RecordWriter`] and
//! [`AlertSink`] traits. [`FileStore`] backs them with the on-disk registry
//! and journals; [`MemoryStore`] keeps everything in memory for embedding
//! and tests.

use crate::journal::Journal;
use crate::registry::Registry;
use crate::{
    Alert, AlertResolution, Error, GlucoseReading, Medication, MedicationIntake,
    OperationLogEntry, Patient, Physician, Result, Therapy,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Map a UTC instant to the clinic's calendar date
pub fn calendar_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Read-side queries the evaluators depend on
pub trait RecordStore {
    /// Therapies with `active` set and `start_date <= day <= end_date`
    fn active_therapies(&self, day: NaiveDate) -> Result<Vec<Therapy>>;

    /// Intakes recorded for (patient, therapy) on a calendar date
    fn intake_count(&self, patient_id: Uuid, therapy_id: Uuid, day: NaiveDate) -> Result<usize>;

    fn patient(&self, id: Uuid) -> Result<Patient>;

    fn physician(&self, id: Uuid) -> Result<Physician>;

    fn medication(&self, id: Uuid) -> Result<Medication>;

    fn therapy(&self, id: Uuid) -> Result<Therapy>;

    /// Offset used to turn timestamps into calendar dates
    fn calendar_offset(&self) -> FixedOffset;

    /// The patient's currently assigned physician, if any
    fn assigned_physician(&self, patient_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.patient(patient_id)?.assigned_physician)
    }
}

/// Write path for patient- and physician-entered records
pub trait RecordWriter {
    fn append_reading(&mut self, reading: &GlucoseReading) -> Result<()>;

    fn append_intake(&mut self, intake: &MedicationIntake) -> Result<()>;

    fn insert_therapy(&mut self, therapy: Therapy) -> Result<()>;

    fn append_operation(&mut self, entry: &OperationLogEntry) -> Result<()>;
}

/// Append-only alert sink
///
/// There is no update or merge: every call inserts one new alert.
pub trait AlertSink {
    fn append_alert(&mut self, alert: &Alert) -> Result<()>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// Store backed by `registry.json` plus JSONL journals under `journal/`
pub struct FileStore {
    data_dir: PathBuf,
    registry: Registry,
    offset: FixedOffset,
    readings: Journal<GlucoseReading>,
    intakes: Journal<MedicationIntake>,
    alerts: Journal<Alert>,
    resolutions: Journal<AlertResolution>,
    operations: Journal<OperationLogEntry>,
}

impl FileStore {
    /// Open the store rooted at `data_dir`, loading the registry
    pub fn open(data_dir: impl Into<PathBuf>, offset: FixedOffset) -> Result<Self> {
        let data_dir = data_dir.into();
        let journal_dir = data_dir.join("journal");
        let registry = Registry::load(&data_dir.join("registry.json"))?;

        Ok(Self {
            readings: Journal::new(journal_dir.join("readings.jsonl")),
            intakes: Journal::new(journal_dir.join("intakes.jsonl")),
            alerts: Journal::new(journal_dir.join("alerts.jsonl")),
            resolutions: Journal::new(journal_dir.join("resolutions.jsonl")),
            operations: Journal::new(journal_dir.join("operations.jsonl")),
            data_dir,
            registry,
            offset,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry.json")
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Apply a change to the registry and persist it atomically
    ///
    /// The on-disk registry is reloaded first so concurrent CLI invocations
    /// don't overwrite each other's additions.
    pub fn update_registry<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let (registry, value) = Registry::update(&self.registry_path(), f)?;
        self.registry = registry;
        Ok(value)
    }

    pub fn readings(&self) -> Result<Vec<GlucoseReading>> {
        self.readings.read_all()
    }

    pub fn intakes(&self) -> Result<Vec<MedicationIntake>> {
        self.intakes.read_all()
    }

    pub fn operations(&self) -> Result<Vec<OperationLogEntry>> {
        self.operations.read_all()
    }

    /// All alerts with their resolution state applied
    pub fn alerts(&self) -> Result<Vec<Alert>> {
        let mut alerts = self.alerts.read_all()?;
        let resolved: HashSet<Uuid> = self
            .resolutions
            .read_all()?
            .into_iter()
            .map(|r| r.alert_id)
            .collect();

        for alert in &mut alerts {
            if resolved.contains(&alert.id) {
                alert.resolved = true;
            }
        }
        Ok(alerts)
    }

    /// Mark an alert resolved on behalf of its physician
    pub fn resolve_alert(
        &mut self,
        alert_id: Uuid,
        physician_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Alert> {
        let mut alert = self
            .alerts()?
            .into_iter()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| Error::not_found("alert", alert_id))?;

        if alert.physician_id != physician_id {
            return Err(Error::Validation(format!(
                "alert {} is addressed to physician {}, not {}",
                alert_id, alert.physician_id, physician_id
            )));
        }
        if alert.resolved {
            return Err(Error::Validation(format!(
                "alert {} is already resolved",
                alert_id
            )));
        }

        self.resolutions.append(&AlertResolution {
            alert_id,
            physician_id,
            resolved_at: now,
        })?;
        alert.resolved = true;

        tracing::info!("Alert {} resolved by physician {}", alert_id, physician_id);
        Ok(alert)
    }
}

impl RecordStore for FileStore {
    fn active_therapies(&self, day: NaiveDate) -> Result<Vec<Therapy>> {
        Ok(self.registry.active_therapies(day))
    }

    fn intake_count(&self, patient_id: Uuid, therapy_id: Uuid, day: NaiveDate) -> Result<usize> {
        let count = self
            .intakes
            .read_all()?
            .iter()
            .filter(|i| {
                i.patient_id == patient_id
                    && i.therapy_id == therapy_id
                    && calendar_date(i.taken_at, self.offset) == day
            })
            .count();
        Ok(count)
    }

    fn patient(&self, id: Uuid) -> Result<Patient> {
        self.registry.patient(id).cloned()
    }

    fn physician(&self, id: Uuid) -> Result<Physician> {
        self.registry.physician(id).cloned()
    }

    fn medication(&self, id: Uuid) -> Result<Medication> {
        self.registry.medication(id).cloned()
    }

    fn therapy(&self, id: Uuid) -> Result<Therapy> {
        self.registry.therapy(id).cloned()
    }

    fn calendar_offset(&self) -> FixedOffset {
        self.offset
    }
}

impl RecordWriter for FileStore {
    fn append_reading(&mut self, reading: &GlucoseReading) -> Result<()> {
        self.readings.append(reading)
    }

    fn append_intake(&mut self, intake: &MedicationIntake) -> Result<()> {
        self.intakes.append(intake)
    }

    fn insert_therapy(&mut self, therapy: Therapy) -> Result<()> {
        self.update_registry(|registry| registry.add_therapy(therapy))
    }

    fn append_operation(&mut self, entry: &OperationLogEntry) -> Result<()> {
        self.operations.append(entry)
    }
}

impl AlertSink for FileStore {
    fn append_alert(&mut self, alert: &Alert) -> Result<()> {
        self.alerts.append(alert)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store holding every record in memory
#[derive(Clone, Debug)]
pub struct MemoryStore {
    pub registry: Registry,
    pub readings: Vec<GlucoseReading>,
    pub intakes: Vec<MedicationIntake>,
    pub alerts: Vec<Alert>,
    pub operations: Vec<OperationLogEntry>,
    pub offset: FixedOffset,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            registry: Registry::default(),
            readings: Vec::new(),
            intakes: Vec::new(),
            alerts: Vec::new(),
            operations: Vec::new(),
            offset: Utc.fix(),
        }
    }
}

impl MemoryStore {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }
}

impl RecordStore for MemoryStore {
    fn active_therapies(&self, day: NaiveDate) -> Result<Vec<Therapy>> {
        Ok(self.registry.active_therapies(day))
    }

    fn intake_count(&self, patient_id: Uuid, therapy_id: Uuid, day: NaiveDate) -> Result<usize> {
        Ok(self
            .intakes
            .iter()
            .filter(|i| {
                i.patient_id == patient_id
                    && i.therapy_id == therapy_id
                    && calendar_date(i.taken_at, self.offset) == day
            })
            .count())
    }

    fn patient(&self, id: Uuid) -> Result<Patient> {
        self.registry.patient(id).cloned()
    }

    fn physician(&self, id: Uuid) -> Result<Physician> {
        self.registry.physician(id).cloned()
    }

    fn medication(&self, id: Uuid) -> Result<Medication> {
        self.registry.medication(id).cloned()
    }

    fn therapy(&self, id: Uuid) -> Result<Therapy> {
        self.registry.therapy(id).cloned()
    }

    fn calendar_offset(&self) -> FixedOffset {
        self.offset
    }
}

impl RecordWriter for MemoryStore {
    fn append_reading(&mut self, reading: &GlucoseReading) -> Result<()> {
        self.readings.push(reading.clone());
        Ok(())
    }

    fn append_intake(&mut self, intake: &MedicationIntake) -> Result<()> {
        self.intakes.push(intake.clone());
        Ok(())
    }

    fn insert_therapy(&mut self, therapy: Therapy) -> Result<()> {
        self.registry.add_therapy(therapy)
    }

    fn append_operation(&mut self, entry: &OperationLogEntry) -> Result<()> {
        self.operations.push(entry.clone());
        Ok(())
    }
}

impl AlertSink for MemoryStore {
    fn append_alert(&mut self, alert: &Alert) -> Result<()> {
        self.alerts.push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlertKind, Severity};
    use chrono::TimeZone;

    fn intake_at(patient_id: Uuid, therapy_id: Uuid, at: DateTime<Utc>) -> MedicationIntake {
        MedicationIntake {
            id: Uuid::new_v4(),
            patient_id,
            therapy_id,
            medication_id: Uuid::new_v4(),
            taken_at: at,
            quantity: 1.0,
        }
    }

    fn alert_for(physician_id: Uuid) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            physician_id,
            created_at: Utc::now(),
            kind: AlertKind::Glucose,
            description: "test".into(),
            severity: Severity::High,
            resolved: false,
        }
    }

    #[test]
    fn test_calendar_date_respects_offset() {
        let late_evening = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let rome = FixedOffset::east_opt(3600).unwrap();

        assert_eq!(
            calendar_date(late_evening, utc),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
        assert_eq!(
            calendar_date(late_evening, rome),
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
        );
    }

    #[test]
    fn test_file_store_counts_intakes_per_calendar_day() {
        let temp_dir = tempfile::tempdir().unwrap();
        let rome = FixedOffset::east_opt(3600).unwrap();
        let mut store = FileStore::open(temp_dir.path(), rome).unwrap();

        let patient = Uuid::new_v4();
        let therapy = Uuid::new_v4();
        // 23:30 UTC on the 10th is already the 11th in the clinic
        store
            .append_intake(&intake_at(patient, therapy, Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap()))
            .unwrap();
        store
            .append_intake(&intake_at(patient, therapy, Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap()))
            .unwrap();
        store
            .append_intake(&intake_at(patient, Uuid::new_v4(), Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap()))
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        assert_eq!(store.intake_count(patient, therapy, day).unwrap(), 2);
        assert_eq!(
            store
                .intake_count(patient, therapy, day.pred_opt().unwrap())
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_resolve_alert_marks_resolved_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(temp_dir.path(), Utc.fix()).unwrap();

        let physician = Uuid::new_v4();
        let alert = alert_for(physician);
        store.append_alert(&alert).unwrap();

        assert!(store.resolve_alert(alert.id, Uuid::new_v4(), Utc::now()).is_err());

        let resolved = store.resolve_alert(alert.id, physician, Utc::now()).unwrap();
        assert!(resolved.resolved);
        assert!(store.alerts().unwrap()[0].resolved);

        assert!(matches!(
            store.resolve_alert(alert.id, physician, Utc::now()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            store.resolve_alert(Uuid::new_v4(), physician, Utc::now()),
            Err(Error::NotFound { kind: "alert", .. })
        ));
    }

    #[test]
    fn test_alert_journal_is_append_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(temp_dir.path(), Utc.fix()).unwrap();

        let alert = alert_for(Uuid::new_v4());
        store.append_alert(&alert).unwrap();
        store.append_alert(&alert).unwrap();

        assert_eq!(store.alerts().unwrap().len(), 2);
    }

    #[test]
    fn test_update_registry_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(temp_dir.path(), Utc.fix()).unwrap();

        let physician = Physician {
            id: Uuid::new_v4(),
            first_name: "Lisa".into(),
            last_name: "Cuddy".into(),
        };
        store
            .update_registry(|registry| registry.add_physician(physician.clone()))
            .unwrap();

        let reopened = FileStore::open(temp_dir.path(), Utc.fix()).unwrap();
        assert_eq!(reopened.physician(physician.id).unwrap(), physician);
    }
}
