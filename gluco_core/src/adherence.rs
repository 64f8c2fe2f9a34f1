//! Medication adherence monitor.
//!
//! A stateless batch entry point, meant to be invoked once a day by an
//! external scheduler (cron, systemd timer, `gluco monitor run`). For every
//! therapy active on the run date it compares the prescribed daily intake
//! count with the intakes recorded today, yesterday and two days ago:
//!
//! - **Reminder** (`low`): fewer intakes than prescribed today
//! - **Escalation** (`high`): fewer intakes than prescribed on each of the
//!   three days
//!
//! Runs are not deduplicated. Invoking the monitor twice for the same day
//! raises every reminder and escalation twice, and overlapping runs are not
//! locked against each other. Callers that need once-per-day semantics must
//! serialize runs themselves.

use crate::alert::{emit, AlertDraft, AlertOutcome};
use crate::store::{AlertSink, RecordStore};
use crate::{AlertKind, Medication, Patient, Result, Severity, Therapy};
use chrono::{DateTime, Days, NaiveDate, Utc};
use uuid::Uuid;

/// Consecutive days of non-adherence that escalate to the physician
pub const ESCALATION_DAYS: u64 = 3;

/// Intakes recorded on each day of the window, today first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyIntakes {
    counts: [usize; ESCALATION_DAYS as usize],
}

impl DailyIntakes {
    pub fn new(today: usize, yesterday: usize, two_days_ago: usize) -> Self {
        Self {
            counts: [today, yesterday, two_days_ago],
        }
    }

    /// Count for `today - offset`, `None` outside the window
    pub fn on(&self, offset: usize) -> Option<usize> {
        self.counts.get(offset).copied()
    }
}

/// Everything the pure evaluation needs about one therapy
#[derive(Clone, Copy, Debug)]
pub struct TherapyContext<'a> {
    pub therapy: &'a Therapy,
    pub patient: &'a Patient,
    pub medication: &'a Medication,
}

/// Decide which alerts a therapy's intake history calls for
///
/// Walks offsets 0, 1, 2: a shortfall at offset 0 raises the reminder; a
/// shortfall at offset 2 re-checks offsets 1 and 0 and escalates only if
/// all three days fell short. A shortfall at offset 1 alone raises nothing.
pub fn evaluate_therapy(ctx: TherapyContext<'_>, intakes: &DailyIntakes) -> Vec<AlertDraft> {
    let expected = ctx.therapy.daily_intakes as usize;
    let mut drafts = Vec::new();

    for (offset, &actual) in intakes.counts.iter().enumerate() {
        if actual >= expected {
            continue;
        }

        if offset == 0 {
            let missing = expected - actual;
            drafts.push(AlertDraft {
                patient_id: ctx.patient.id,
                kind: AlertKind::Medication,
                severity: Severity::Low,
                description: format!(
                    "Reminder: {} dose(s) of {} still to take today",
                    missing, ctx.medication.name
                ),
            });
        }

        if offset == ESCALATION_DAYS as usize - 1 {
            let all_short = intakes.counts.iter().all(|&count| count < expected);
            if all_short {
                drafts.push(AlertDraft {
                    patient_id: ctx.patient.id,
                    kind: AlertKind::Medication,
                    severity: Severity::High,
                    description: format!(
                        "Patient {} has not followed therapy {} for {} consecutive days",
                        ctx.patient.full_name(),
                        ctx.medication.name,
                        ESCALATION_DAYS
                    ),
                });
            }
        }
    }

    tracing::debug!(
        "Therapy {}: expected {}/day, actual {:?}, {} alert(s)",
        ctx.therapy.id,
        expected,
        intakes.counts,
        drafts.len()
    );
    drafts
}

/// Query the intake counts for the three-day window ending on `today`
pub fn gather_intakes<S: RecordStore>(
    store: &S,
    therapy: &Therapy,
    today: NaiveDate,
) -> Result<DailyIntakes> {
    let count_on = |offset: u64| -> Result<usize> {
        let day = today.checked_sub_days(Days::new(offset)).ok_or_else(|| {
            crate::Error::Other(format!("date {} minus {} days out of range", today, offset))
        })?;
        store.intake_count(therapy.patient_id, therapy.id, day)
    };

    Ok(DailyIntakes::new(count_on(0)?, count_on(1)?, count_on(2)?))
}

/// A therapy whose evaluation failed during a run
#[derive(Clone, Debug, PartialEq)]
pub struct TherapyFailure {
    pub therapy_id: Uuid,
    pub error: String,
}

/// Summary of one monitor run, for the operator
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonitorReport {
    pub therapies_checked: usize,
    pub reminders: usize,
    pub escalations: usize,
    pub skipped_no_physician: usize,
    pub failures: Vec<TherapyFailure>,
}

impl MonitorReport {
    pub fn alerts_raised(&self) -> usize {
        self.reminders + self.escalations
    }
}

/// Run the monitor over every therapy active on `today`
///
/// A failure in one therapy (missing patient or medication record, sink
/// error) is logged and counted; the remaining therapies are still checked.
/// Only the initial therapy query can fail the whole run.
pub fn run_adherence_monitor<S>(
    store: &mut S,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<MonitorReport>
where
    S: RecordStore + AlertSink,
{
    let therapies = store.active_therapies(today)?;
    tracing::info!(
        "Adherence check for {}: {} active therapies",
        today,
        therapies.len()
    );

    let mut report = MonitorReport::default();
    for therapy in &therapies {
        report.therapies_checked += 1;
        if let Err(e) = check_therapy(store, therapy, today, now, &mut report) {
            tracing::warn!("Adherence check failed for therapy {}: {}", therapy.id, e);
            report.failures.push(TherapyFailure {
                therapy_id: therapy.id,
                error: e.to_string(),
            });
        }
    }

    tracing::info!(
        "Adherence check for {} done: {} reminders, {} escalations, {} skipped, {} failed",
        today,
        report.reminders,
        report.escalations,
        report.skipped_no_physician,
        report.failures.len()
    );
    Ok(report)
}

/// Evaluate one therapy, tallying each alert as soon as it is emitted
///
/// An error part-way through leaves the alerts already written counted.
fn check_therapy<S>(
    store: &mut S,
    therapy: &Therapy,
    today: NaiveDate,
    now: DateTime<Utc>,
    report: &mut MonitorReport,
) -> Result<()>
where
    S: RecordStore + AlertSink,
{
    let patient = store.patient(therapy.patient_id)?;
    let medication = store.medication(therapy.medication_id)?;
    let intakes = gather_intakes(store, therapy, today)?;

    let ctx = TherapyContext {
        therapy,
        patient: &patient,
        medication: &medication,
    };

    for draft in evaluate_therapy(ctx, &intakes) {
        match emit(store, draft, now)? {
            AlertOutcome::Raised(alert) if alert.severity == Severity::High => {
                report.escalations += 1
            }
            AlertOutcome::Raised(_) => report.reminders += 1,
            AlertOutcome::SkippedNoPhysician { .. } => report.skipped_no_physician += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::store::MemoryStore;
    use crate::{MedicationIntake, MedicationKind, Physician};
    use chrono::{NaiveTime, TimeZone};

    struct Fixture {
        store: MemoryStore,
        patient: Patient,
        therapy: Therapy,
        today: NaiveDate,
    }

    fn fixture(daily_intakes: u32) -> Fixture {
        let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let physician = Physician {
            id: Uuid::new_v4(),
            first_name: "Doc".into(),
            last_name: "Medico".into(),
        };
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: "Mario".into(),
            last_name: "Rossi".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            assigned_physician: Some(physician.id),
            risk_factors: Default::default(),
            past_conditions: String::new(),
            comorbidities: String::new(),
        };
        let medication = Medication {
            id: Uuid::new_v4(),
            name: "Metformin".into(),
            kind: MedicationKind::Oral,
            description: String::new(),
        };
        let therapy = Therapy {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            physician_id: physician.id,
            medication_id: medication.id,
            start_date: today - Days::new(30),
            end_date: today + Days::new(30),
            daily_intakes,
            quantity_per_intake: 1.0,
            instructions: String::new(),
            active: true,
        };

        let mut registry = Registry::default();
        registry.add_physician(physician).unwrap();
        registry.add_patient(patient.clone()).unwrap();
        registry.add_medication(medication).unwrap();
        registry.add_therapy(therapy.clone()).unwrap();

        Fixture {
            store: MemoryStore::new(registry),
            patient,
            therapy,
            today,
        }
    }

    impl Fixture {
        fn take(&mut self, days_ago: u64, times: usize) {
            let day = self.today - Days::new(days_ago);
            for i in 0..times {
                let at = Utc.from_utc_datetime(
                    &day.and_time(NaiveTime::from_hms_opt(8 + i as u32, 0, 0).unwrap()),
                );
                self.store.intakes.push(MedicationIntake {
                    id: Uuid::new_v4(),
                    patient_id: self.patient.id,
                    therapy_id: self.therapy.id,
                    medication_id: self.therapy.medication_id,
                    taken_at: at,
                    quantity: 1.0,
                });
            }
        }

        fn run(&mut self) -> MonitorReport {
            run_adherence_monitor(&mut self.store, self.today, Utc::now()).unwrap()
        }
    }

    #[test]
    fn test_missing_doses_today_raise_one_reminder() {
        let mut f = fixture(2);
        f.take(1, 2);
        f.take(2, 2);

        let report = f.run();

        assert_eq!(report.reminders, 1);
        assert_eq!(report.escalations, 0);
        assert_eq!(f.store.alerts.len(), 1);
        let alert = &f.store.alerts[0];
        assert_eq!(alert.kind, AlertKind::Medication);
        assert_eq!(alert.severity, Severity::Low);
        assert_eq!(
            alert.description,
            "Reminder: 2 dose(s) of Metformin still to take today"
        );
    }

    #[test]
    fn test_partial_intake_reports_remaining_doses() {
        let mut f = fixture(3);
        f.take(0, 1);
        f.take(1, 3);

        f.run();

        assert_eq!(f.store.alerts.len(), 1);
        assert!(f.store.alerts[0].description.contains("2 dose(s)"));
    }

    #[test]
    fn test_three_missed_days_raise_reminder_and_escalation() {
        let mut f = fixture(2);

        let report = f.run();

        assert_eq!(report.reminders, 1);
        assert_eq!(report.escalations, 1);
        let severities: Vec<Severity> = f.store.alerts.iter().map(|a| a.severity).collect();
        assert_eq!(severities, vec![Severity::Low, Severity::High]);
        assert_eq!(
            f.store.alerts[1].description,
            "Patient Mario Rossi has not followed therapy Metformin for 3 consecutive days"
        );
    }

    #[test]
    fn test_adherent_yesterday_prevents_escalation() {
        let mut f = fixture(2);
        f.take(1, 2);

        let report = f.run();

        assert_eq!(report.reminders, 1);
        assert_eq!(report.escalations, 0);
    }

    #[test]
    fn test_shortfall_yesterday_alone_raises_nothing() {
        let mut f = fixture(1);
        f.take(0, 1);
        f.take(2, 1);

        let report = f.run();

        assert_eq!(report.alerts_raised(), 0);
        assert!(f.store.alerts.is_empty());
    }

    #[test]
    fn test_fully_adherent_raises_nothing() {
        let mut f = fixture(2);
        for day in 0..3 {
            f.take(day, 2);
        }

        assert_eq!(f.run().alerts_raised(), 0);
    }

    #[test]
    fn test_complete_today_blocks_escalation() {
        let mut f = fixture(2);
        f.take(0, 2);

        let report = f.run();

        assert_eq!(report.alerts_raised(), 0);
    }

    #[test]
    fn test_running_twice_duplicates_alerts() {
        // No deduplication: a second run on the same day repeats everything
        let mut f = fixture(2);

        f.run();
        f.run();

        assert_eq!(f.store.alerts.len(), 4);
        let high = f
            .store
            .alerts
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count();
        assert_eq!(high, 2);
    }

    #[test]
    fn test_inactive_and_expired_therapies_are_ignored() {
        let mut f = fixture(2);
        f.store
            .registry
            .set_therapy_active(f.therapy.id, false)
            .unwrap();

        let report = f.run();

        assert_eq!(report.therapies_checked, 0);
        assert!(f.store.alerts.is_empty());
    }

    #[test]
    fn test_therapy_starting_today_is_checked() {
        let mut f = fixture(1);
        f.store
            .registry
            .therapies
            .get_mut(&f.therapy.id)
            .unwrap()
            .start_date = f.today;

        let report = f.run();

        assert_eq!(report.therapies_checked, 1);
        assert_eq!(report.reminders, 1);
    }

    #[test]
    fn test_failing_therapy_does_not_abort_batch() {
        crate::logging::init_test();
        let mut f = fixture(2);

        // A second therapy referencing a medication that no longer exists
        let mut broken = f.therapy.clone();
        broken.id = Uuid::new_v4();
        broken.medication_id = Uuid::new_v4();
        f.store.registry.therapies.insert(broken.id, broken.clone());

        let report = f.run();

        assert_eq!(report.therapies_checked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].therapy_id, broken.id);
        assert_eq!(report.reminders, 1);
        assert_eq!(report.escalations, 1);
    }

    #[test]
    fn test_patient_without_physician_is_skipped() {
        let mut f = fixture(2);
        f.store
            .registry
            .assign_physician(f.patient.id, None)
            .unwrap();

        let report = f.run();

        assert_eq!(report.skipped_no_physician, 2);
        assert_eq!(report.alerts_raised(), 0);
        assert!(report.failures.is_empty());
        assert!(f.store.alerts.is_empty());
    }

    #[test]
    fn test_evaluate_therapy_is_pure() {
        let f = fixture(2);
        let medication = f.store.registry.medication(f.therapy.medication_id).unwrap();
        let ctx = TherapyContext {
            therapy: &f.therapy,
            patient: &f.patient,
            medication,
        };

        let drafts = evaluate_therapy(ctx, &DailyIntakes::new(1, 0, 1));
        assert_eq!(drafts.len(), 2);
        assert!(drafts[0].description.contains("1 dose(s)"));
        assert_eq!(drafts[1].severity, Severity::High);

        assert!(evaluate_therapy(ctx, &DailyIntakes::new(2, 0, 0)).is_empty());
    }

    /// Store whose alert sink rejects everything after `accept` alerts
    struct FlakySink {
        inner: MemoryStore,
        accept: usize,
    }

    impl RecordStore for FlakySink {
        fn active_therapies(&self, day: NaiveDate) -> Result<Vec<Therapy>> {
            self.inner.active_therapies(day)
        }

        fn intake_count(&self, patient_id: Uuid, therapy_id: Uuid, day: NaiveDate) -> Result<usize> {
            self.inner.intake_count(patient_id, therapy_id, day)
        }

        fn patient(&self, id: Uuid) -> Result<Patient> {
            self.inner.patient(id)
        }

        fn physician(&self, id: Uuid) -> Result<Physician> {
            self.inner.physician(id)
        }

        fn medication(&self, id: Uuid) -> Result<Medication> {
            self.inner.medication(id)
        }

        fn therapy(&self, id: Uuid) -> Result<Therapy> {
            self.inner.therapy(id)
        }

        fn calendar_offset(&self) -> chrono::FixedOffset {
            self.inner.calendar_offset()
        }
    }

    impl AlertSink for FlakySink {
        fn append_alert(&mut self, alert: &crate::Alert) -> Result<()> {
            if self.inner.alerts.len() >= self.accept {
                return Err(crate::Error::Other("alert journal unavailable".into()));
            }
            self.inner.append_alert(alert)
        }
    }

    #[test]
    fn test_sink_failure_keeps_written_alerts_counted() {
        crate::logging::init_test();
        let f = fixture(2);
        let mut store = FlakySink {
            inner: f.store,
            accept: 1,
        };

        let report = run_adherence_monitor(&mut store, f.today, Utc::now()).unwrap();

        // Reminder written, escalation rejected
        assert_eq!(store.inner.alerts.len(), 1);
        assert_eq!(report.reminders, 1);
        assert_eq!(report.escalations, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].therapy_id, f.therapy.id);
        assert_eq!(report.alerts_raised(), store.inner.alerts.len());
    }

    #[test]
    fn test_daily_intakes_outside_window_is_none() {
        let intakes = DailyIntakes::new(2, 1, 0);

        assert_eq!(intakes.on(0), Some(2));
        assert_eq!(intakes.on(2), Some(0));
        assert_eq!(intakes.on(ESCALATION_DAYS as usize), None);
        assert_eq!(intakes.on(usize::MAX), None);
    }
}
