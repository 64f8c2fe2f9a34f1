//! Alert emission shared by both evaluators.
//!
//! Evaluators produce [`AlertDraft`]s; [`emit`] resolves the addressee and
//! appends exactly one [`Alert`] per draft. Alerts are never deduplicated,
//! coalesced or rate-limited here: two identical drafts become two alerts.

use crate::store::{AlertSink, RecordStore};
use crate::{Alert, AlertKind, Result, Severity};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An alert an evaluator wants raised, before it is addressed
#[derive(Clone, Debug, PartialEq)]
pub struct AlertDraft {
    pub patient_id: Uuid,
    pub kind: AlertKind,
    pub severity: Severity,
    pub description: String,
}

/// What happened to a draft handed to [`emit`]
#[derive(Clone, Debug, PartialEq)]
pub enum AlertOutcome {
    /// The alert was appended to the sink
    Raised(Alert),
    /// The patient has no assigned physician, so nobody could receive it
    SkippedNoPhysician { patient_id: Uuid },
}

impl AlertOutcome {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            AlertOutcome::Raised(alert) => Some(alert),
            AlertOutcome::SkippedNoPhysician { .. } => None,
        }
    }
}

/// Address a draft to the patient's current physician and append it
///
/// With no assigned physician the alert is skipped and logged; the
/// triggering write is not failed. Sink errors propagate without retry.
pub fn emit<S>(store: &mut S, draft: AlertDraft, now: DateTime<Utc>) -> Result<AlertOutcome>
where
    S: RecordStore + AlertSink,
{
    let Some(physician_id) = store.assigned_physician(draft.patient_id)? else {
        tracing::warn!(
            "Patient {} has no assigned physician; dropping {} alert ({}): {}",
            draft.patient_id,
            draft.kind,
            draft.severity,
            draft.description
        );
        return Ok(AlertOutcome::SkippedNoPhysician {
            patient_id: draft.patient_id,
        });
    };

    let alert = Alert {
        id: Uuid::new_v4(),
        patient_id: draft.patient_id,
        physician_id,
        created_at: now,
        kind: draft.kind,
        description: draft.description,
        severity: draft.severity,
        resolved: false,
    };
    store.append_alert(&alert)?;

    tracing::info!(
        "Raised {} {} alert {} for patient {}",
        alert.severity,
        alert.kind,
        alert.id,
        alert.patient_id
    );
    Ok(AlertOutcome::Raised(alert))
}

/// Criteria for listing alerts
#[derive(Clone, Debug, Default)]
pub struct AlertFilter {
    pub patient_id: Option<Uuid>,
    pub physician_id: Option<Uuid>,
    pub unresolved_only: bool,
    pub min_severity: Option<Severity>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.patient_id.map_or(true, |id| alert.patient_id == id)
            && self.physician_id.map_or(true, |id| alert.physician_id == id)
            && !(self.unresolved_only && alert.resolved)
            && self.min_severity.map_or(true, |min| alert.severity >= min)
    }
}

/// Apply a filter and order newest first, most severe first on ties
pub fn select_alerts(alerts: Vec<Alert>, filter: &AlertFilter) -> Vec<Alert> {
    let mut selected: Vec<Alert> = alerts.into_iter().filter(|a| filter.matches(a)).collect();
    selected.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.severity.cmp(&a.severity))
    });
    selected
}
