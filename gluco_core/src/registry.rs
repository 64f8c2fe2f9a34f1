//! Registry of mutable reference records with atomic persistence.
//!
//! Physicians, patients, medications and therapies change over time
//! (assignments are updated, therapies deactivated), so they live in one
//! JSON document that is rewritten atomically rather than in a journal.

use crate::validation::Validate;
use crate::{Error, Medication, Patient, Physician, Result, Therapy};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Reference records keyed by id
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Registry {
    #[serde(default)]
    pub physicians: HashMap<Uuid, Physician>,
    #[serde(default)]
    pub patients: HashMap<Uuid, Patient>,
    #[serde(default)]
    pub medications: HashMap<Uuid, Medication>,
    #[serde(default)]
    pub therapies: HashMap<Uuid, Therapy>,
}

impl Registry {
    /// Load the registry from a file with shared locking
    ///
    /// Returns an empty registry if the file doesn't exist. Unlike a cache,
    /// a corrupted registry is an error: falling back to empty would let the
    /// next save wipe every patient.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No registry file found at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read_result = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read_result?;

        let registry: Registry = serde_json::from_str(&contents)
            .map_err(|e| Error::Registry(format!("failed to parse {:?}: {}", path, e)))?;

        tracing::debug!(
            "Loaded registry from {:?}: {} patients, {} therapies",
            path,
            registry.patients.len(),
            registry.therapies.len()
        );
        Ok(registry)
    }

    /// Save the registry with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Registry(format!("registry path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved registry to {:?}", path);
        Ok(())
    }

    /// Load the registry, modify it, and save it back atomically
    ///
    /// Nothing is written if `f` fails.
    pub fn update<F, T>(path: &Path, f: F) -> Result<(Self, T)>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let mut registry = Self::load(path)?;
        let value = f(&mut registry)?;
        registry.save(path)?;
        Ok((registry, value))
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn physician(&self, id: Uuid) -> Result<&Physician> {
        self.physicians
            .get(&id)
            .ok_or_else(|| Error::not_found("physician", id))
    }

    pub fn patient(&self, id: Uuid) -> Result<&Patient> {
        self.patients
            .get(&id)
            .ok_or_else(|| Error::not_found("patient", id))
    }

    pub fn medication(&self, id: Uuid) -> Result<&Medication> {
        self.medications
            .get(&id)
            .ok_or_else(|| Error::not_found("medication", id))
    }

    pub fn therapy(&self, id: Uuid) -> Result<&Therapy> {
        self.therapies
            .get(&id)
            .ok_or_else(|| Error::not_found("therapy", id))
    }

    /// Therapies active on `day`, ordered by start date then id
    pub fn active_therapies(&self, day: NaiveDate) -> Vec<Therapy> {
        let mut therapies: Vec<Therapy> = self
            .therapies
            .values()
            .filter(|t| t.is_active_on(day))
            .cloned()
            .collect();
        therapies.sort_by(|a, b| (a.start_date, a.id).cmp(&(b.start_date, b.id)));
        therapies
    }

    /// Therapies prescribed to a patient, newest start first
    pub fn therapies_for(&self, patient_id: Uuid) -> Vec<&Therapy> {
        let mut therapies: Vec<&Therapy> = self
            .therapies
            .values()
            .filter(|t| t.patient_id == patient_id)
            .collect();
        therapies.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        therapies
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn add_physician(&mut self, physician: Physician) -> Result<()> {
        physician.validate()?;
        self.ensure_new("physician", self.physicians.contains_key(&physician.id), physician.id)?;
        self.physicians.insert(physician.id, physician);
        Ok(())
    }

    pub fn add_patient(&mut self, patient: Patient) -> Result<()> {
        patient.validate()?;
        self.ensure_new("patient", self.patients.contains_key(&patient.id), patient.id)?;
        if let Some(physician_id) = patient.assigned_physician {
            self.physician(physician_id)?;
        }
        self.patients.insert(patient.id, patient);
        Ok(())
    }

    pub fn add_medication(&mut self, medication: Medication) -> Result<()> {
        medication.validate()?;
        self.ensure_new(
            "medication",
            self.medications.contains_key(&medication.id),
            medication.id,
        )?;
        self.medications.insert(medication.id, medication);
        Ok(())
    }

    /// Add a validated therapy whose references all exist
    pub fn add_therapy(&mut self, therapy: Therapy) -> Result<()> {
        therapy.validate()?;
        self.ensure_new("therapy", self.therapies.contains_key(&therapy.id), therapy.id)?;
        self.patient(therapy.patient_id)?;
        self.physician(therapy.physician_id)?;
        self.medication(therapy.medication_id)?;
        self.therapies.insert(therapy.id, therapy);
        Ok(())
    }

    /// Change (or clear) a patient's assigned physician
    pub fn assign_physician(&mut self, patient_id: Uuid, physician_id: Option<Uuid>) -> Result<()> {
        if let Some(id) = physician_id {
            self.physician(id)?;
        }
        let patient = self
            .patients
            .get_mut(&patient_id)
            .ok_or_else(|| Error::not_found("patient", patient_id))?;
        patient.assigned_physician = physician_id;
        Ok(())
    }

    pub fn set_therapy_active(&mut self, therapy_id: Uuid, active: bool) -> Result<()> {
        let therapy = self
            .therapies
            .get_mut(&therapy_id)
            .ok_or_else(|| Error::not_found("therapy", therapy_id))?;
        therapy.active = active;
        Ok(())
    }

    fn ensure_new(&self, kind: &str, exists: bool, id: Uuid) -> Result<()> {
        if exists {
            return Err(Error::Registry(format!("{} {} already exists", kind, id)));
        }
        Ok(())
    }
}
