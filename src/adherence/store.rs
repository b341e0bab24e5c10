use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use super::calculator::{consecutive_days, DateWindow};
use crate::db::{repository, DatabaseError};
use crate::models::{MedicationLog, MedicationSchedule, PatientScope};

/// The persistence operations the materializer and calculator rely on.
pub trait DoseStore {
    /// Active schedules of active medications in the scope.
    fn active_schedules(&self, scope: &PatientScope) -> Result<Vec<MedicationSchedule>, DatabaseError>;

    /// Logs scheduled in `[start, end)` in the scope, ordered by time.
    fn logs_between(
        &self,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
        scope: &PatientScope,
    ) -> Result<Vec<MedicationLog>, DatabaseError>;

    fn log_exists(&self, schedule_id: &Uuid, scheduled_time: &NaiveDateTime) -> Result<bool, DatabaseError>;

    fn insert_log(&self, log: &MedicationLog) -> Result<(), DatabaseError>;

    /// Runs `f` atomically: committed on `Ok`, rolled back on `Err`.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DatabaseError>,
        F: FnOnce(&Self) -> Result<T, E>;
}

impl DoseStore for Connection {
    fn active_schedules(&self, scope: &PatientScope) -> Result<Vec<MedicationSchedule>, DatabaseError> {
        repository::fetch_active_schedules(self, scope)
    }

    fn logs_between(
        &self,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
        scope: &PatientScope,
    ) -> Result<Vec<MedicationLog>, DatabaseError> {
        repository::fetch_logs_between(self, start, end, scope)
    }

    fn log_exists(&self, schedule_id: &Uuid, scheduled_time: &NaiveDateTime) -> Result<bool, DatabaseError> {
        repository::log_exists(self, schedule_id, scheduled_time)
    }

    fn insert_log(&self, log: &MedicationLog) -> Result<(), DatabaseError> {
        repository::insert_log(self, log)
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DatabaseError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        let tx = self
            .unchecked_transaction()
            .map_err(|e| E::from(DatabaseError::from(e)))?;
        // Dropping `tx` without commit rolls back.
        let value = f(self)?;
        tx.commit().map_err(|e| E::from(DatabaseError::from(e)))?;
        Ok(value)
    }
}

/// Days fetched by the first streak lookup; each further lookup doubles it.
const STREAK_LOOKBACK_DAYS: i64 = 32;

/// Consecutive compliant days ending today, reading only as much history as
/// the streak spans. The lookback doubles while every fetched day counts.
pub fn current_streak<S: DoseStore>(
    store: &S,
    scope: &PatientScope,
    now: NaiveDateTime,
) -> Result<u32, DatabaseError> {
    let today = DateWindow::day(now.date());
    let mut lookback = STREAK_LOOKBACK_DAYS;
    loop {
        let start = today.end - Duration::days(lookback);
        let logs = store.logs_between(&start, &today.end, scope)?;
        let streak = consecutive_days(&logs, now.date(), now);
        // Older logs can only extend a streak that fills the window.
        if i64::from(streak) < lookback {
            return Ok(streak);
        }
        lookback *= 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Medication;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 2).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn day(d: i64) -> NaiveDateTime {
        at(8) + Duration::days(d)
    }

    /// Connection wrapper that records the start of every range read.
    struct CountingStore {
        conn: Connection,
        starts: std::cell::RefCell<Vec<NaiveDateTime>>,
    }

    impl DoseStore for CountingStore {
        fn active_schedules(&self, scope: &PatientScope) -> Result<Vec<MedicationSchedule>, DatabaseError> {
            self.conn.active_schedules(scope)
        }

        fn logs_between(
            &self,
            start: &NaiveDateTime,
            end: &NaiveDateTime,
            scope: &PatientScope,
        ) -> Result<Vec<MedicationLog>, DatabaseError> {
            self.starts.borrow_mut().push(*start);
            self.conn.logs_between(start, end, scope)
        }

        fn log_exists(&self, schedule_id: &Uuid, time: &NaiveDateTime) -> Result<bool, DatabaseError> {
            self.conn.log_exists(schedule_id, time)
        }

        fn insert_log(&self, log: &MedicationLog) -> Result<(), DatabaseError> {
            self.conn.insert_log(log)
        }

        fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
        where
            E: From<DatabaseError>,
            F: FnOnce(&Self) -> Result<T, E>,
        {
            f(self)
        }
    }

    fn taken_daily(conn: &Connection, days: std::ops::Range<i64>) {
        let med = Medication::new("Aspirin");
        repository::insert_medication(conn, &med).unwrap();
        for d in days {
            let mut log = MedicationLog::pending(med.id, None, day(d), day(d));
            log.status = crate::models::enums::LogStatus::Taken;
            repository::insert_log(conn, &log).unwrap();
        }
    }

    #[test]
    fn short_streak_reads_one_window() {
        let conn = open_memory_database().unwrap();
        taken_daily(&conn, -3..1);
        let store = CountingStore { conn, starts: Default::default() };

        assert_eq!(current_streak(&store, &PatientScope::Myself, day(0) + Duration::hours(4)).unwrap(), 4);
        let starts = store.starts.borrow();
        assert_eq!(starts.len(), 1);
        assert!(starts[0] > day(-STREAK_LOOKBACK_DAYS));
    }

    #[test]
    fn long_streak_widens_lookback() {
        let conn = open_memory_database().unwrap();
        taken_daily(&conn, -49..1);
        let store = CountingStore { conn, starts: Default::default() };

        assert_eq!(current_streak(&store, &PatientScope::Myself, day(0) + Duration::hours(4)).unwrap(), 50);
        assert_eq!(store.starts.borrow().len(), 2);
    }

    #[test]
    fn no_logs_is_zero_streak() {
        let conn = open_memory_database().unwrap();
        assert_eq!(current_streak(&conn, &PatientScope::Myself, day(0)).unwrap(), 0);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let conn = open_memory_database().unwrap();
        let med = Medication::new("Aspirin");
        repository::insert_medication(&conn, &med).unwrap();

        let result: Result<(), DatabaseError> = DoseStore::transaction(&conn, |store| {
            store.insert_log(&MedicationLog::pending(med.id, None, at(8), at(0)))?;
            Err(DatabaseError::ConstraintViolation("boom".into()))
        });

        assert!(result.is_err());
        let logs = conn.logs_between(&at(0), &at(23), &PatientScope::Myself).unwrap();
        assert!(logs.is_empty());
    }

    #[test]
    fn committed_transaction_persists() {
        let conn = open_memory_database().unwrap();
        let med = Medication::new("Aspirin");
        repository::insert_medication(&conn, &med).unwrap();

        DoseStore::transaction(&conn, |store| {
            store.insert_log(&MedicationLog::pending(med.id, None, at(8), at(0)))
        })
        .unwrap();

        let logs = conn.logs_between(&at(0), &at(23), &PatientScope::Myself).unwrap();
        assert_eq!(logs.len(), 1);
    }
}
