//! Materializes a day's pending dose logs from the active schedules.
//!
//! Safe to run on every home refresh: a (schedule, minute) slot that
//! already has a log is left alone, whatever its status.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::recurrence;
use super::store::DoseStore;
use crate::db::DatabaseError;
use crate::models::{MedicationLog, PatientScope};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    pub schedules_scanned: usize,
    pub logs_created: usize,
    pub logs_existing: usize,
}

/// Ensures one log per scheduled time of `day` for every active schedule in
/// the scope. The scan runs in one transaction; any write failure rolls it
/// back and is returned.
pub fn materialize_day<S: DoseStore>(
    store: &S,
    scope: &PatientScope,
    day: NaiveDate,
    now: NaiveDateTime,
) -> Result<MaterializeReport, DatabaseError> {
    let report = store.transaction(|store| {
        let schedules = store.active_schedules(scope)?;
        let mut report = MaterializeReport {
            schedules_scanned: schedules.len(),
            ..Default::default()
        };

        for schedule in &schedules {
            for time in recurrence::times_on(schedule, day) {
                if store.log_exists(&schedule.id, &time)? {
                    report.logs_existing += 1;
                    continue;
                }
                let log = MedicationLog::pending(schedule.medication_id, Some(schedule.id), time, now);
                store.insert_log(&log)?;
                report.logs_created += 1;
            }
        }

        Ok::<_, DatabaseError>(report)
    })?;

    tracing::info!(
        %day,
        scanned = report.schedules_scanned,
        created = report.logs_created,
        existing = report.logs_existing,
        "Materialized dose logs"
    );
    Ok(report)
}
