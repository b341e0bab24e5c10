//! Dose-log state machine.
//!
//! `pending` and `snoozed` are open states. `taken`, `delayed` and `skipped`
//! are terminal. Snoozing records a deadline in `snoozed_until` and leaves
//! `scheduled_time` untouched so the log keeps its (schedule, minute) slot.

use chrono::{Duration, NaiveDateTime};

use super::TransitionError;
use crate::config;
use crate::models::enums::LogStatus;
use crate::models::MedicationLog;

/// Status as seen at `now`: a snooze whose deadline has passed reads as pending.
pub fn effective_status(log: &MedicationLog, now: NaiveDateTime) -> LogStatus {
    match (log.status, log.snoozed_until) {
        (LogStatus::Snoozed, Some(until)) if now >= until => LogStatus::Pending,
        (status, _) => status,
    }
}

/// An open dose whose time has come and that is not currently snoozed.
pub fn is_due(log: &MedicationLog, now: NaiveDateTime) -> bool {
    effective_status(log, now) == LogStatus::Pending && log.scheduled_time <= now
}

fn ensure_open(log: &MedicationLog) -> Result<(), TransitionError> {
    if log.status.is_terminal() {
        return Err(TransitionError::AlreadyResolved(log.status));
    }
    Ok(())
}

/// Records the dose as taken at `at`. Returns `Delayed` when `at` is more
/// than the grace period after the scheduled time.
pub fn mark_taken(log: &mut MedicationLog, at: NaiveDateTime) -> Result<LogStatus, TransitionError> {
    ensure_open(log)?;

    let late_by = at - log.scheduled_time;
    let status = if late_by > Duration::minutes(config::DELAYED_DOSE_GRACE_MINUTES) {
        LogStatus::Delayed
    } else {
        LogStatus::Taken
    };

    log.status = status;
    log.actual_time = Some(at);
    log.snoozed_until = None;
    Ok(status)
}

/// Records the dose as skipped; the reason, if any, replaces the notes.
pub fn mark_skipped(
    log: &mut MedicationLog,
    reason: Option<String>,
    at: NaiveDateTime,
) -> Result<(), TransitionError> {
    ensure_open(log)?;

    log.status = LogStatus::Skipped;
    log.actual_time = Some(at);
    log.snoozed_until = None;
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        log.notes = Some(reason);
    }
    Ok(())
}

/// Postpones the reminder by `minutes`. Returns the new deadline.
pub fn snooze(
    log: &mut MedicationLog,
    minutes: u32,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, TransitionError> {
    ensure_open(log)?;
    if minutes == 0 {
        return Err(TransitionError::InvalidSnooze);
    }

    let until = now + Duration::minutes(i64::from(minutes));
    log.status = LogStatus::Snoozed;
    log.snooze_count += 1;
    log.snoozed_until = Some(until);
    Ok(until)
}
