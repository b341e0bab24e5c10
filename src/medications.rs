//! Medication list and detail screens: view types and the queries behind
//! them.
//!
//! Detail rates use rolling windows ending at `now`: today, the last 7 days
//! and the last calendar month.

use std::collections::BTreeMap;

use chrono::{Duration, Months, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adherence::calculator::{
    self, AdherenceRate, DateWindow, DayStatus, StatusBreakdown,
};
use crate::db::{repository, DatabaseError};
use crate::models::{HealthMetric, Medication, MedicationFilter, MedicationLog, MedicationSchedule, MedicationSort, PatientScope};
use crate::tracker::next_dose_time;

// ═══════════════════════════════════════════
// View types
// ═══════════════════════════════════════════

/// Filter parameters for the medication list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MedicationListFilter {
    #[serde(default)]
    pub filter: MedicationFilter,
    pub search_query: Option<String>,
    #[serde(default)]
    pub sort: MedicationSort,
}

/// A medication card for the list view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationCard {
    pub medication: Medication,
    pub schedule_count: usize,
    /// Next dose time today, if any remain.
    pub next_dose: Option<NaiveDateTime>,
    pub is_low_stock: bool,
}

/// Counts shown in the list header. They ignore search and filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MedicationCounts {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub low_stock: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationListData {
    pub medications: Vec<MedicationCard>,
    pub counts: MedicationCounts,
}

/// One day of a medication's dose history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayLogs {
    pub date: NaiveDate,
    pub status: Option<DayStatus>,
    pub logs: Vec<MedicationLog>,
}

/// Full medication detail (expanded view).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationDetail {
    pub medication: Medication,
    pub schedules: Vec<MedicationSchedule>,
    pub daily_rate: AdherenceRate,
    pub weekly_rate: AdherenceRate,
    pub monthly_rate: AdherenceRate,
    pub streak_days: u32,
    pub breakdown: StatusBreakdown,
    /// Latest reading of each metric related to the medication's category.
    pub latest_metrics: Vec<HealthMetric>,
    /// Newest day first.
    pub days: Vec<DayLogs>,
}

// ═══════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════

/// Medication list for the scope with counts for the header.
pub fn fetch_medication_list(
    conn: &Connection,
    scope: &PatientScope,
    filter: &MedicationListFilter,
    now: NaiveDateTime,
) -> Result<MedicationListData, DatabaseError> {
    let meds = repository::search_medications(
        conn,
        scope,
        filter.filter,
        filter.search_query.as_deref(),
        filter.sort,
    )?;

    let mut cards = Vec::with_capacity(meds.len());
    for medication in meds {
        let schedules = repository::fetch_schedules_for_medication(conn, &medication.id)?;
        let next_dose = if medication.is_active {
            next_dose_time(&schedules, now)
        } else {
            None
        };
        cards.push(MedicationCard {
            is_low_stock: medication.needs_refill(),
            schedule_count: schedules.len(),
            next_dose,
            medication,
        });
    }

    if filter.sort == MedicationSort::NextDose {
        // Medications with no dose left today go last, keeping name order.
        cards.sort_by_key(|c| (c.next_dose.is_none(), c.next_dose));
    }

    let counts = medication_counts(conn, scope)?;
    Ok(MedicationListData { medications: cards, counts })
}

pub fn medication_counts(conn: &Connection, scope: &PatientScope) -> Result<MedicationCounts, DatabaseError> {
    let meds = repository::fetch_medications(conn, scope)?;
    let active = meds.iter().filter(|m| m.is_active).count();
    Ok(MedicationCounts {
        total: meds.len(),
        active,
        inactive: meds.len() - active,
        low_stock: meds.iter().filter(|m| m.needs_refill()).count(),
    })
}

/// Detail statistics for one medication as of `now`.
pub fn fetch_medication_detail(
    conn: &Connection,
    medication_id: &Uuid,
    now: NaiveDateTime,
) -> Result<Option<MedicationDetail>, DatabaseError> {
    let Some(medication) = repository::get_medication(conn, medication_id)? else {
        return Ok(None);
    };
    let schedules = repository::fetch_schedules_for_medication(conn, medication_id)?;
    let logs = repository::fetch_logs_for_medication(conn, medication_id)?;

    let until_now = now + Duration::seconds(1);
    let today = DateWindow::day(now.date());
    let week = DateWindow::new(now - Duration::days(7), until_now);
    let month_start = now
        .checked_sub_months(Months::new(1))
        .unwrap_or(now - Duration::days(30));
    let month = DateWindow::new(month_start, until_now);

    let mut by_day: BTreeMap<NaiveDate, Vec<MedicationLog>> = BTreeMap::new();
    for log in &logs {
        by_day.entry(log.scheduled_time.date()).or_default().push(log.clone());
    }
    let days = by_day
        .into_iter()
        .rev()
        .map(|(date, mut day_logs)| {
            day_logs.sort_by_key(|l| l.scheduled_time);
            DayLogs {
                date,
                status: calculator::day_status(&day_logs, now),
                logs: day_logs,
            }
        })
        .collect();

    let mut latest_metrics = Vec::new();
    for metric_type in medication.category.related_metric_types() {
        if let Some(metric) = repository::latest_metric_for_medication(conn, medication_id, *metric_type)? {
            latest_metrics.push(metric);
        }
    }

    Ok(Some(MedicationDetail {
        daily_rate: calculator::completion_rate(&logs, &today, now),
        weekly_rate: calculator::completion_rate(&logs, &week, now),
        monthly_rate: calculator::completion_rate(&logs, &month, now),
        streak_days: calculator::consecutive_days(&logs, now.date(), now),
        breakdown: StatusBreakdown::from_logs(logs.iter().filter(|l| l.scheduled_time <= now), now),
        latest_metrics,
        days,
        schedules,
        medication,
    }))
}
