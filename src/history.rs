//! Log history screen: period statistics, status filter, calendar cells and
//! CSV export.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Months, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adherence::calculator::{self, AdherenceRate, DayStatus, StatusBreakdown};
use crate::adherence::store::{current_streak, DoseStore};
use crate::db::{repository, DatabaseError};
use crate::models::enums::LogStatus;
use crate::models::{LogFilter, Medication, MedicationLog, PatientScope};

pub const CSV_HEADER: &str = "date,time,medication,dosage,status,actual_time,notes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsPeriod {
    Week,
    #[default]
    Month,
    ThreeMonths,
    Year,
}

impl StatisticsPeriod {
    /// Nominal length, used for chart axes.
    pub fn days(&self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::ThreeMonths => 90,
            Self::Year => 365,
        }
    }

    /// Start of the period ending at `now`, in calendar terms.
    pub fn start(&self, now: NaiveDateTime) -> NaiveDateTime {
        let back = match self {
            Self::Week => return now - Duration::days(7),
            Self::Month => Months::new(1),
            Self::ThreeMonths => Months::new(3),
            Self::Year => Months::new(12),
        };
        now.checked_sub_months(back)
            .unwrap_or_else(|| now - Duration::days(i64::from(self.days())))
    }
}

impl LogFilter {
    pub fn matches(&self, status: LogStatus) -> bool {
        match self {
            Self::All => true,
            Self::Taken => status == LogStatus::Taken,
            Self::Skipped => status == LogStatus::Skipped,
            Self::Delayed => status == LogStatus::Delayed,
        }
    }
}

/// A history row with its medication's display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub log: MedicationLog,
    pub medication_name: String,
    pub dosage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogHistory {
    pub period: StatisticsPeriod,
    pub filter: LogFilter,
    /// Filtered entries, newest first.
    pub entries: Vec<HistoryEntry>,
    pub rate: AdherenceRate,
    pub breakdown: StatusBreakdown,
    pub streak_days: u32,
}

/// Loads the logs of `period` up to `now` in scope. Statistics cover the
/// whole period; `filter` only narrows `entries`.
pub fn load_history(
    conn: &Connection,
    scope: &PatientScope,
    period: StatisticsPeriod,
    filter: LogFilter,
    now: NaiveDateTime,
) -> Result<LogHistory, DatabaseError> {
    let start = period.start(now);
    // Inclusive of `now`; stored times have second resolution.
    let end = now + Duration::seconds(1);
    let logs = conn.logs_between(&start, &end, scope)?;

    let rate = AdherenceRate::from_logs(&logs, now);
    let breakdown = StatusBreakdown::from_logs(logs.iter().filter(|l| l.scheduled_time <= now), now);

    let streak_days = current_streak(conn, scope, now)?;

    let meds = medication_lookup(conn, scope)?;
    let mut entries: Vec<HistoryEntry> = logs
        .into_iter()
        .filter(|l| filter.matches(l.status))
        .map(|log| entry(log, &meds))
        .collect();
    entries.sort_by(|a, b| b.log.scheduled_time.cmp(&a.log.scheduled_time));

    Ok(LogHistory { period, filter, entries, rate, breakdown, streak_days })
}

fn medication_lookup(conn: &Connection, scope: &PatientScope) -> Result<HashMap<Uuid, Medication>, DatabaseError> {
    Ok(repository::fetch_medications(conn, scope)?
        .into_iter()
        .map(|m| (m.id, m))
        .collect())
}

fn entry(log: MedicationLog, meds: &HashMap<Uuid, Medication>) -> HistoryEntry {
    let med = meds.get(&log.medication_id);
    HistoryEntry {
        medication_name: med.map(|m| m.name.clone()).unwrap_or_default(),
        dosage: med.map(|m| m.dosage.clone()).unwrap_or_default(),
        log,
    }
}

/// Logs of one calendar day, earliest first.
pub fn logs_for_date(
    conn: &Connection,
    scope: &PatientScope,
    date: NaiveDate,
) -> Result<Vec<HistoryEntry>, DatabaseError> {
    let window = calculator::DateWindow::day(date);
    let meds = medication_lookup(conn, scope)?;
    Ok(conn
        .logs_between(&window.start, &window.end, scope)?
        .into_iter()
        .map(|log| entry(log, &meds))
        .collect())
}

/// Day-status cells for the calendar month containing `month`.
pub fn month_calendar(
    conn: &Connection,
    scope: &PatientScope,
    month: NaiveDate,
    now: NaiveDateTime,
) -> Result<BTreeMap<NaiveDate, DayStatus>, DatabaseError> {
    let window = calculator::DateWindow::month_containing(month);
    let logs = conn.logs_between(&window.start, &window.end, scope)?;

    let mut by_day: BTreeMap<NaiveDate, Vec<MedicationLog>> = BTreeMap::new();
    for log in logs {
        by_day.entry(log.scheduled_time.date()).or_default().push(log);
    }
    Ok(by_day
        .into_iter()
        .filter_map(|(day, logs)| calculator::day_status(&logs, now).map(|s| (day, s)))
        .collect())
}

fn status_label(status: LogStatus) -> &'static str {
    match status {
        LogStatus::Taken => "Taken",
        LogStatus::Skipped => "Skipped",
        LogStatus::Delayed => "Delayed",
        LogStatus::Snoozed => "Snoozed",
        LogStatus::Pending => "Pending",
    }
}

/// Free text as a single CSV cell: commas become `;`, line breaks spaces.
fn csv_text(text: &str) -> String {
    text.replace(',', ";").replace(['\r', '\n'], " ")
}

/// CSV of the given entries in their current order.
pub fn to_csv(entries: &[HistoryEntry]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for e in entries {
        let actual = e
            .log
            .actual_time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default();
        let notes = csv_text(e.log.notes.as_deref().unwrap_or_default());
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            e.log.scheduled_time.format("%Y-%m-%d"),
            e.log.scheduled_time.format("%H:%M"),
            csv_text(&e.medication_name),
            csv_text(&e.dosage),
            status_label(e.log.status),
            actual,
            notes,
        ));
    }
    csv
}
