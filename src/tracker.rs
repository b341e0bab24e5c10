//! `DoseTracker`: the service the apps call.
//!
//! Owns nothing global: it borrows the SQLite connection and the injected
//! capabilities for its lifetime. Every mutation is persisted first; reminder
//! and health-store side effects follow and are logged if they fail.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::adherence::calculator::{
    self, AdherenceRate, DateWindow, StatusBadge, TimeOfDayGroup,
};
use crate::adherence::store::{current_streak, DoseStore};
use crate::adherence::{materialize_day, recurrence, transitions, MaterializeReport, TransitionError};
use crate::capabilities::{
    plan_reminders, schedule_reminders, snooze_identifier, snooze_reminder, Capabilities, EntitlementError,
    ReminderAction, ReminderError, ReminderRequest,
};
use crate::db::{repository, DatabaseError};
use crate::models::enums::{LogStatus, MedicationColor, MedicationForm, ScheduleType};
use crate::models::*;

// ═══════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Reminder(#[from] ReminderError),

    #[error(transparent)]
    Entitlement(#[from] EntitlementError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl TrackerError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(_) => "Failed to save. Please try again.".into(),
            Self::NotFound(_) => "This item no longer exists.".into(),
            Self::Reminder(_) => "Reminders could not be scheduled.".into(),
            Self::Serialization(_) => "Data could not be prepared for display.".into(),
            other => other.to_string(),
        }
    }
}

// ═══════════════════════════════════════════
// Read models
// ═══════════════════════════════════════════

/// A log joined with the display fields of its medication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseItem {
    pub log: MedicationLog,
    pub medication_name: String,
    pub dosage: String,
    pub form: MedicationForm,
    pub color: MedicationColor,
    /// Status as seen at refresh time (expired snoozes read as pending).
    pub status: LogStatus,
    pub badge: StatusBadge,
}

impl DoseItem {
    pub fn new(log: &MedicationLog, med: Option<&Medication>, now: NaiveDateTime) -> Self {
        let status = transitions::effective_status(log, now);
        Self {
            log: log.clone(),
            medication_name: med.map(|m| m.name.clone()).unwrap_or_default(),
            dosage: med.map(|m| m.dosage.clone()).unwrap_or_default(),
            form: med.map(|m| m.form).unwrap_or(MedicationForm::Other),
            color: med.map(|m| m.color).unwrap_or(MedicationColor::White),
            status,
            badge: calculator::status_badge(status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeSnapshot {
    pub date: NaiveDate,
    pub scope: PatientScope,
    pub materialized: MaterializeReport,
    pub today: Vec<DoseItem>,
    pub groups: Vec<TimeOfDayGroup>,
    pub today_rate: AdherenceRate,
    pub week_rate: AdherenceRate,
    pub month_rate: AdherenceRate,
    pub streak_days: u32,
    pub pending_due_count: usize,
    pub completed_count: usize,
    pub is_all_completed: bool,
    pub next_dose: Option<DoseItem>,
    pub low_stock: Vec<Medication>,
    pub appointments: Vec<Appointment>,
}

// ═══════════════════════════════════════════
// DoseTracker
// ═══════════════════════════════════════════

pub struct DoseTracker<'a> {
    conn: &'a Connection,
    caps: Capabilities<'a>,
}

impl<'a> DoseTracker<'a> {
    pub fn new(conn: &'a Connection, caps: Capabilities<'a>) -> Self {
        Self { conn, caps }
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }

    /// Materializes today, then assembles the home screen state for `scope`.
    pub fn refresh_home(&self, scope: PatientScope, now: NaiveDateTime) -> Result<HomeSnapshot, TrackerError> {
        let today = now.date();
        let materialized = materialize_day(self.conn, &scope, today, now)?;

        let day = DateWindow::day(today);
        let week = DateWindow::week_containing(today);
        let month = DateWindow::month_containing(today);

        let history = self.conn.logs_between(&week.start.min(month.start), &day.end, &scope)?;
        let today_logs: Vec<MedicationLog> = history
            .iter()
            .filter(|l| day.contains(l.scheduled_time))
            .cloned()
            .collect();

        let meds: HashMap<Uuid, Medication> = repository::fetch_medications(self.conn, &scope)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        let today_items: Vec<DoseItem> = today_logs
            .iter()
            .map(|l| DoseItem::new(l, meds.get(&l.medication_id), now))
            .collect();

        let next_dose = today_items
            .iter()
            .find(|item| !item.status.is_terminal() && item.log.scheduled_time > now)
            .cloned();
        let completed_count = today_logs.iter().filter(|l| l.status.is_completed()).count();
        let pending_due_count = today_logs.iter().filter(|l| transitions::is_due(l, now)).count();

        let mut low_stock: Vec<Medication> = meds
            .values()
            .filter(|m| m.needs_refill())
            .cloned()
            .collect();
        low_stock.sort_by(|a, b| a.stock_count.cmp(&b.stock_count).then_with(|| a.name.cmp(&b.name)));

        let appointments = repository::fetch_open_appointments_between(self.conn, &day.start, &day.end, &scope)?;

        let snapshot = HomeSnapshot {
            date: today,
            scope,
            materialized,
            groups: calculator::group_by_time_of_day(&today_logs),
            today_rate: calculator::completion_rate(&history, &day, now),
            week_rate: calculator::completion_rate(&history, &week, now),
            month_rate: calculator::completion_rate(&history, &month, now),
            streak_days: current_streak(self.conn, &scope, now)?,
            pending_due_count,
            completed_count,
            is_all_completed: !today_logs.is_empty() && completed_count == today_logs.len(),
            next_dose,
            today: today_items,
            low_stock,
            appointments,
        };

        tracing::debug!(
            %today,
            doses = snapshot.today.len(),
            due = snapshot.pending_due_count,
            streak = snapshot.streak_days,
            "Home refreshed"
        );
        Ok(snapshot)
    }

    // ── Dose transitions ────────────────────────────────────

    fn load_log(conn: &Connection, log_id: &Uuid) -> Result<MedicationLog, TrackerError> {
        repository::get_log(conn, log_id)?
            .ok_or_else(|| TrackerError::NotFound(format!("dose log {log_id}")))
    }

    fn load_medication(conn: &Connection, med_id: &Uuid) -> Result<Medication, TrackerError> {
        repository::get_medication(conn, med_id)?
            .ok_or_else(|| TrackerError::NotFound(format!("medication {med_id}")))
    }

    /// Marks a dose taken and uses one unit of stock, atomically.
    pub fn mark_taken(&self, log_id: &Uuid, at: NaiveDateTime) -> Result<MedicationLog, TrackerError> {
        let (log, med) = DoseStore::transaction(self.conn, |conn| {
            let mut log = Self::load_log(conn, log_id)?;
            transitions::mark_taken(&mut log, at)?;
            repository::update_log(conn, &log)?;

            let mut med = Self::load_medication(conn, &log.medication_id)?;
            med.stock_count = repository::set_medication_stock(conn, &med.id, med.stock_after_use(1))?;
            Ok::<_, TrackerError>((log, med))
        })?;

        tracing::info!(log_id = %log.id, status = %log.status, stock = med.stock_count, "Dose taken");
        self.withdraw_snooze(&log);
        if med.needs_refill() {
            self.notify_low_stock(&med);
        }
        Ok(log)
    }

    pub fn mark_skipped(
        &self,
        log_id: &Uuid,
        reason: Option<String>,
        at: NaiveDateTime,
    ) -> Result<MedicationLog, TrackerError> {
        let mut log = Self::load_log(self.conn, log_id)?;
        transitions::mark_skipped(&mut log, reason, at)?;
        repository::update_log(self.conn, &log)?;
        tracing::info!(log_id = %log.id, "Dose skipped");
        self.withdraw_snooze(&log);
        Ok(log)
    }

    /// Snoozes a dose and requests a one-off follow-up reminder.
    pub fn snooze(&self, log_id: &Uuid, minutes: u32, now: NaiveDateTime) -> Result<MedicationLog, TrackerError> {
        let mut log = Self::load_log(self.conn, log_id)?;
        let until = transitions::snooze(&mut log, minutes, now)?;
        repository::update_log(self.conn, &log)?;
        tracing::info!(log_id = %log.id, %until, count = log.snooze_count, "Dose snoozed");

        let med = Self::load_medication(self.conn, &log.medication_id)?;
        self.request(&snooze_reminder(&med, &log, until));
        Ok(log)
    }

    /// Applies an action picked on a delivered reminder. `ViewDetails` changes nothing.
    pub fn apply_reminder_action(
        &self,
        log_id: &Uuid,
        action: ReminderAction,
        now: NaiveDateTime,
    ) -> Result<Option<MedicationLog>, TrackerError> {
        match action {
            ReminderAction::Taken => self.mark_taken(log_id, now).map(Some),
            ReminderAction::Snooze(minutes) => self.snooze(log_id, minutes, now).map(Some),
            ReminderAction::Skip => self.mark_skipped(log_id, None, now).map(Some),
            ReminderAction::ViewDetails => Ok(None),
        }
    }

    // ── Medications ─────────────────────────────────────────

    /// Registers a medication, subject to the free-plan limit.
    pub fn add_medication(&self, med: &Medication) -> Result<(), TrackerError> {
        if med.name.trim().is_empty() {
            return Err(TrackerError::Validation("medication name is required".into()));
        }
        let count = repository::count_medications(self.conn)?;
        self.caps.entitlements.check_medication_quota(count)?;

        repository::insert_medication(self.conn, med)?;
        tracing::info!(medication_id = %med.id, "Medication added");
        Ok(())
    }

    /// Soft enable/disable. Disabling cancels the medication's reminders,
    /// enabling schedules them again.
    pub fn set_medication_active(&self, med_id: &Uuid, is_active: bool) -> Result<(), TrackerError> {
        repository::set_medication_active(self.conn, med_id, is_active)?;
        let med = Self::load_medication(self.conn, med_id)?;

        for schedule in repository::fetch_schedules_for_medication(self.conn, med_id)? {
            self.cancel_reminders(&schedule.id);
            if is_active && schedule.is_active {
                for request in schedule_reminders(&med, &schedule) {
                    self.request(&request);
                }
            }
        }
        tracing::info!(medication_id = %med_id, is_active, "Medication active state changed");
        Ok(())
    }

    /// Deletes a medication with its schedules and logs.
    pub fn delete_medication(&self, med_id: &Uuid) -> Result<(), TrackerError> {
        let schedules = repository::fetch_schedules_for_medication(self.conn, med_id)?;
        repository::delete_medication_cascade(self.conn, med_id)?;
        for schedule in &schedules {
            self.cancel_reminders(&schedule.id);
        }
        tracing::info!(medication_id = %med_id, schedules = schedules.len(), "Medication deleted");
        Ok(())
    }

    /// Changes stock by `delta` (refill or manual correction), floored at zero.
    pub fn adjust_stock(&self, med_id: &Uuid, delta: i32) -> Result<Medication, TrackerError> {
        let mut med = Self::load_medication(self.conn, med_id)?;
        med.stock_count = repository::set_medication_stock(self.conn, med_id, med.stock_count.saturating_add(delta))?;

        if delta < 0 && med.needs_refill() {
            self.notify_low_stock(&med);
        }
        Ok(med)
    }

    // ── Schedules ───────────────────────────────────────────

    pub fn add_schedule(&self, schedule: &MedicationSchedule) -> Result<(), TrackerError> {
        validate_schedule(schedule)?;
        let med = Self::load_medication(self.conn, &schedule.medication_id)?;

        repository::insert_schedule(self.conn, schedule)?;
        if med.is_active && schedule.is_active {
            for request in schedule_reminders(&med, schedule) {
                self.request(&request);
            }
        }
        tracing::info!(schedule_id = %schedule.id, medication_id = %med.id, "Schedule added");
        Ok(())
    }

    /// Replaces a schedule's rule and reschedules its reminders. Logs already
    /// materialized keep their times.
    pub fn update_schedule(&self, schedule: &MedicationSchedule) -> Result<(), TrackerError> {
        validate_schedule(schedule)?;
        let med = Self::load_medication(self.conn, &schedule.medication_id)?;

        repository::update_schedule(self.conn, schedule)?;
        self.cancel_reminders(&schedule.id);
        if med.is_active && schedule.is_active {
            for request in schedule_reminders(&med, schedule) {
                self.request(&request);
            }
        }
        Ok(())
    }

    pub fn delete_schedule(&self, schedule_id: &Uuid) -> Result<(), TrackerError> {
        repository::delete_schedule(self.conn, schedule_id)?;
        self.cancel_reminders(schedule_id);
        tracing::info!(%schedule_id, "Schedule deleted");
        Ok(())
    }

    /// Rebuilds every pending reminder within the platform cap.
    /// Returns how many were scheduled.
    pub fn sync_reminders(&self, now: NaiveDateTime) -> Result<usize, TrackerError> {
        let meds: HashMap<Uuid, Medication> = repository::fetch_all_medications(self.conn)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        let schedules = repository::fetch_all_schedules(self.conn)?;

        for schedule in &schedules {
            self.caps.reminders.cancel_for_schedule(&schedule.id)?;
        }

        let items: Vec<(Medication, MedicationSchedule)> = schedules
            .into_iter()
            .filter_map(|s| meds.get(&s.medication_id).map(|m| (m.clone(), s)))
            .collect();
        let planned = plan_reminders(&items, now);
        for request in &planned {
            self.caps.reminders.schedule(request)?;
        }

        tracing::info!(scheduled = planned.len(), "Reminders synchronized");
        Ok(planned.len())
    }

    // ── Health metrics ──────────────────────────────────────

    /// Stores a reading and forwards it to the platform health store when
    /// the metric type has a counterpart there.
    pub fn record_health_metric(&self, metric: &HealthMetric) -> Result<(), TrackerError> {
        repository::insert_health_metric(self.conn, metric)?;
        if metric.metric_type.supports_health_store() {
            if let Err(e) = self.caps.health.write_metric(metric) {
                tracing::warn!(metric_id = %metric.id, error = %e, "Health store write failed");
            }
        }
        Ok(())
    }

    // ── Side effects ────────────────────────────────────────

    fn request(&self, request: &ReminderRequest) {
        if let Err(e) = self.caps.reminders.schedule(request) {
            tracing::warn!(identifier = %request.identifier, error = %e, "Reminder request failed");
        }
    }

    fn cancel_reminders(&self, schedule_id: &Uuid) {
        if let Err(e) = self.caps.reminders.cancel_for_schedule(schedule_id) {
            tracing::warn!(%schedule_id, error = %e, "Reminder cancellation failed");
        }
    }

    /// A resolved dose that was ever snoozed may still have a follow-up queued.
    fn withdraw_snooze(&self, log: &MedicationLog) {
        if log.snooze_count == 0 {
            return;
        }
        let identifier = snooze_identifier(&log.id);
        if let Err(e) = self.caps.reminders.cancel(&identifier) {
            tracing::warn!(%identifier, error = %e, "Snooze reminder cancellation failed");
        }
    }

    fn notify_low_stock(&self, med: &Medication) {
        tracing::info!(medication_id = %med.id, stock = med.stock_count, "Low stock");
        if let Err(e) = self.caps.reminders.notify_low_stock(med) {
            tracing::warn!(medication_id = %med.id, error = %e, "Low-stock reminder failed");
        }
    }
}

fn validate_schedule(schedule: &MedicationSchedule) -> Result<(), TrackerError> {
    if schedule.schedule_type != ScheduleType::AsNeeded && schedule.times.is_empty() {
        return Err(TrackerError::Validation("at least one dose time is required".into()));
    }
    if schedule.interval_days == 0 {
        return Err(TrackerError::Validation("interval must be at least one day".into()));
    }
    if schedule.schedule_type == ScheduleType::SpecificDays
        && (schedule.specific_days.is_empty() || schedule.specific_days.iter().any(|d| *d > 6))
    {
        return Err(TrackerError::Validation("weekdays must be between 0 (Sunday) and 6".into()));
    }
    if schedule.end_date.is_some_and(|end| end < schedule.start_date) {
        return Err(TrackerError::Validation("end date precedes start date".into()));
    }
    Ok(())
}

/// Next dose time today across a medication's schedules.
pub fn next_dose_time(schedules: &[MedicationSchedule], now: NaiveDateTime) -> Option<NaiveDateTime> {
    schedules
        .iter()
        .filter_map(|s| recurrence::next_time_after(s, now))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::NaiveTime;

    use crate::capabilities::{
        EntitlementError, FreeTier, HealthDataSink, HealthSinkError, NoHealthSink, Premium,
        ReminderScheduler,
    };
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{DataSource, MetricType};

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: RefCell<Vec<ReminderRequest>>,
        cancelled: RefCell<Vec<Uuid>>,
        withdrawn: RefCell<Vec<String>>,
        low_stock: RefCell<Vec<Uuid>>,
    }

    impl ReminderScheduler for RecordingScheduler {
        fn schedule(&self, request: &ReminderRequest) -> Result<(), ReminderError> {
            self.scheduled.borrow_mut().push(request.clone());
            Ok(())
        }

        fn cancel_for_schedule(&self, schedule_id: &Uuid) -> Result<(), ReminderError> {
            self.cancelled.borrow_mut().push(*schedule_id);
            Ok(())
        }

        fn cancel(&self, identifier: &str) -> Result<(), ReminderError> {
            self.withdrawn.borrow_mut().push(identifier.to_string());
            Ok(())
        }

        fn notify_low_stock(&self, medication: &Medication) -> Result<(), ReminderError> {
            self.low_stock.borrow_mut().push(medication.id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        written: RefCell<Vec<MetricType>>,
    }

    impl HealthDataSink for RecordingSink {
        fn write_metric(&self, metric: &HealthMetric) -> Result<(), HealthSinkError> {
            self.written.borrow_mut().push(metric.metric_type);
            Ok(())
        }
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn caps<'a>(reminders: &'a RecordingScheduler) -> Capabilities<'a> {
        Capabilities { reminders, entitlements: &FreeTier, health: &NoHealthSink }
    }

    fn med(name: &str, stock: i32) -> Medication {
        let mut med = Medication::new(name);
        med.dosage = "1 tablet".into();
        med.stock_count = stock;
        med
    }

    fn daily(med_id: Uuid, hours: &[u32]) -> MedicationSchedule {
        MedicationSchedule::daily(
            med_id,
            hours.iter().map(|h| NaiveTime::from_hms_opt(*h, 0, 0).unwrap()).collect(),
            at(1, 0, 0).date(),
            at(1, 0, 0),
        )
    }

    fn setup(conn: &Connection, reminders: &RecordingScheduler, hours: &[u32], stock: i32) -> (Medication, MedicationSchedule) {
        let tracker = DoseTracker::new(conn, caps(reminders));
        let m = med("Metformin", stock);
        tracker.add_medication(&m).unwrap();
        let s = daily(m.id, hours);
        tracker.add_schedule(&s).unwrap();
        (m, s)
    }

    #[test]
    fn refresh_materializes_and_reports_today() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        setup(&conn, &reminders, &[8, 20], 30);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 12, 0)).unwrap();
        assert_eq!(home.materialized.logs_created, 2);
        assert_eq!(home.today.len(), 2);
        assert_eq!(home.today[0].medication_name, "Metformin");
        assert_eq!(home.pending_due_count, 1);
        assert_eq!(home.next_dose.as_ref().map(|d| d.log.scheduled_time), Some(at(5, 20, 0)));
        assert!(!home.is_all_completed);

        let again = tracker.refresh_home(PatientScope::Myself, at(5, 12, 5)).unwrap();
        assert_eq!(again.materialized.logs_created, 0);
        assert_eq!(again.today.len(), 2);
    }

    #[test]
    fn taken_morning_dose_with_future_evening_gives_full_rate() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        setup(&conn, &reminders, &[8, 20], 30);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 7, 0)).unwrap();
        tracker.mark_taken(&home.today[0].log.id, at(5, 8, 5)).unwrap();

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 12, 0)).unwrap();
        assert_eq!(home.today_rate.value(), 1.0);
        assert_eq!(home.completed_count, 1);
        assert_eq!(home.streak_days, 1);
    }

    #[test]
    fn mark_taken_decrements_stock_and_flags_low_stock() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let (m, _) = setup(&conn, &reminders, &[8], 6);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 7, 0)).unwrap();
        let log = tracker.mark_taken(&home.today[0].log.id, at(5, 9, 0)).unwrap();
        assert_eq!(log.status, LogStatus::Delayed);

        let stored = repository::get_medication(&conn, &m.id).unwrap().unwrap();
        assert_eq!(stored.stock_count, 5);
        assert_eq!(reminders.low_stock.borrow().as_slice(), &[m.id]);
    }

    #[test]
    fn stock_never_drops_below_zero() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let (m, _) = setup(&conn, &reminders, &[8], 0);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 7, 0)).unwrap();
        tracker.mark_taken(&home.today[0].log.id, at(5, 8, 0)).unwrap();
        assert_eq!(repository::get_medication(&conn, &m.id).unwrap().unwrap().stock_count, 0);
        assert_eq!(tracker.adjust_stock(&m.id, -3).unwrap().stock_count, 0);
        assert_eq!(tracker.adjust_stock(&m.id, 30).unwrap().stock_count, 30);
    }

    #[test]
    fn resolved_dose_cannot_be_taken_twice() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let (m, _) = setup(&conn, &reminders, &[8], 10);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 7, 0)).unwrap();
        let id = home.today[0].log.id;
        tracker.mark_skipped(&id, Some("ran out".into()), at(5, 8, 0)).unwrap();

        let err = tracker.mark_taken(&id, at(5, 8, 5)).unwrap_err();
        assert!(matches!(err, TrackerError::Transition(TransitionError::AlreadyResolved(LogStatus::Skipped))));
        // Stock untouched by the rejected transition.
        assert_eq!(repository::get_medication(&conn, &m.id).unwrap().unwrap().stock_count, 10);
    }

    #[test]
    fn resolving_snoozed_dose_withdraws_follow_up() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        setup(&conn, &reminders, &[8, 20], 10);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 8, 0)).unwrap();
        let morning = home.today[0].log.id;
        let evening = home.today[1].log.id;

        tracker.snooze(&morning, 10, at(5, 8, 1)).unwrap();
        tracker.mark_taken(&morning, at(5, 8, 5)).unwrap();
        assert_eq!(reminders.withdrawn.borrow().as_slice(), &[snooze_identifier(&morning)]);

        tracker.snooze(&evening, 5, at(5, 20, 0)).unwrap();
        tracker.mark_skipped(&evening, None, at(5, 20, 2)).unwrap();
        assert_eq!(reminders.withdrawn.borrow().len(), 2);
        assert_eq!(reminders.withdrawn.borrow()[1], snooze_identifier(&evening));
    }

    #[test]
    fn unsnoozed_dose_withdraws_nothing() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        setup(&conn, &reminders, &[8], 10);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 8, 0)).unwrap();
        tracker.mark_taken(&home.today[0].log.id, at(5, 8, 0)).unwrap();
        assert!(reminders.withdrawn.borrow().is_empty());
    }

    #[test]
    fn snooze_schedules_follow_up_and_keeps_slot() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        setup(&conn, &reminders, &[8], 10);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 8, 0)).unwrap();
        let log = tracker.snooze(&home.today[0].log.id, 10, at(5, 8, 1)).unwrap();
        assert_eq!(log.snoozed_until, Some(at(5, 8, 11)));
        let last = reminders.scheduled.borrow().last().cloned().unwrap();
        assert_eq!(last.log_id, Some(log.id));

        let snoozed = tracker.refresh_home(PatientScope::Myself, at(5, 8, 5)).unwrap();
        assert_eq!(snoozed.materialized.logs_created, 0);
        assert_eq!(snoozed.today[0].status, LogStatus::Snoozed);
        assert_eq!(snoozed.pending_due_count, 0);

        let expired = tracker.refresh_home(PatientScope::Myself, at(5, 8, 11)).unwrap();
        assert_eq!(expired.today[0].status, LogStatus::Pending);
        assert_eq!(expired.pending_due_count, 1);
    }

    #[test]
    fn reminder_actions_drive_transitions() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        setup(&conn, &reminders, &[8], 10);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        let home = tracker.refresh_home(PatientScope::Myself, at(5, 8, 0)).unwrap();
        let id = home.today[0].log.id;
        assert!(tracker.apply_reminder_action(&id, ReminderAction::ViewDetails, at(5, 8, 0)).unwrap().is_none());
        let log = tracker.apply_reminder_action(&id, ReminderAction::Taken, at(5, 8, 2)).unwrap().unwrap();
        assert_eq!(log.status, LogStatus::Taken);
    }

    #[test]
    fn free_tier_limited_to_three_medications() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let tracker = DoseTracker::new(&conn, caps(&reminders));
        for name in ["A", "B", "C"] {
            tracker.add_medication(&med(name, 10)).unwrap();
        }

        let err = tracker.add_medication(&med("D", 10)).unwrap_err();
        assert!(matches!(err, TrackerError::Entitlement(EntitlementError::MedicationLimit { limit: 3 })));
        assert_eq!(err.user_message(), "Free plan allows up to 3 medications");

        let premium = DoseTracker::new(
            &conn,
            Capabilities { reminders: &reminders, entitlements: &Premium, health: &NoHealthSink },
        );
        premium.add_medication(&med("D", 10)).unwrap();
    }

    #[test]
    fn deactivating_cancels_and_excludes_from_materialization() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let (m, s) = setup(&conn, &reminders, &[8], 10);
        let tracker = DoseTracker::new(&conn, caps(&reminders));

        tracker.set_medication_active(&m.id, false).unwrap();
        assert!(reminders.cancelled.borrow().contains(&s.id));
        let home = tracker.refresh_home(PatientScope::Myself, at(5, 7, 0)).unwrap();
        assert!(home.today.is_empty());
        assert_eq!(home.today_rate.value(), 0.0);
    }

    #[test]
    fn deleting_medication_cancels_and_cascades() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let (m, s) = setup(&conn, &reminders, &[8], 10);
        let tracker = DoseTracker::new(&conn, caps(&reminders));
        tracker.refresh_home(PatientScope::Myself, at(5, 7, 0)).unwrap();

        tracker.delete_medication(&m.id).unwrap();
        assert!(reminders.cancelled.borrow().contains(&s.id));
        assert!(repository::fetch_all_logs(&conn).unwrap().is_empty());
        assert!(repository::get_schedule(&conn, &s.id).unwrap().is_none());
    }

    #[test]
    fn add_schedule_validates_and_schedules_reminders() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let (m, _) = setup(&conn, &reminders, &[8, 20], 10);
        assert_eq!(reminders.scheduled.borrow().len(), 2);

        let tracker = DoseTracker::new(&conn, caps(&reminders));
        let mut bad = daily(m.id, &[9]);
        bad.schedule_type = ScheduleType::SpecificDays;
        bad.specific_days = vec![7];
        assert!(matches!(tracker.add_schedule(&bad), Err(TrackerError::Validation(_))));

        let orphan = daily(Uuid::new_v4(), &[9]);
        assert!(matches!(tracker.add_schedule(&orphan), Err(TrackerError::NotFound(_))));
    }

    #[test]
    fn sync_reminders_reschedules_everything() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        setup(&conn, &reminders, &[8, 20], 10);
        reminders.scheduled.borrow_mut().clear();

        let tracker = DoseTracker::new(&conn, caps(&reminders));
        assert_eq!(tracker.sync_reminders(at(5, 7, 0)).unwrap(), 2);
        assert_eq!(reminders.scheduled.borrow().len(), 2);
        assert_eq!(reminders.cancelled.borrow().len(), 1);
    }

    #[test]
    fn health_metrics_forwarded_except_mood() {
        let conn = open_memory_database().unwrap();
        let reminders = RecordingScheduler::default();
        let sink = RecordingSink::default();
        let tracker = DoseTracker::new(
            &conn,
            Capabilities { reminders: &reminders, entitlements: &FreeTier, health: &sink },
        );

        for metric_type in [MetricType::Weight, MetricType::Mood] {
            tracker
                .record_health_metric(&HealthMetric {
                    id: Uuid::new_v4(),
                    medication_id: None,
                    log_id: None,
                    metric_type,
                    value: 3.0,
                    systolic: None,
                    diastolic: None,
                    source: DataSource::Manual,
                    recorded_at: at(5, 9, 0),
                    notes: None,
                })
                .unwrap();
        }

        assert_eq!(sink.written.borrow().as_slice(), &[MetricType::Weight]);
        assert_eq!(repository::fetch_all_health_metrics(&conn).unwrap().len(), 2);
    }

    #[test]
    fn database_errors_have_generic_user_message() {
        let err = TrackerError::Database(DatabaseError::ConstraintViolation("x".into()));
        assert_eq!(err.user_message(), "Failed to save. Please try again.");
    }

    #[test]
    fn json_failures_are_not_reported_as_database_errors() {
        let err: TrackerError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, TrackerError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));
        assert_eq!(err.user_message(), "Data could not be prepared for display.");
    }

    #[test]
    fn next_dose_time_is_earliest_upcoming() {
        let id = Uuid::new_v4();
        let schedules = vec![daily(id, &[21]), daily(id, &[13])];
        assert_eq!(next_dose_time(&schedules, at(5, 12, 0)), Some(at(5, 13, 0)));
    }
}
