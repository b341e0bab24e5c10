//! Adherence statistics over already-fetched logs.
//!
//! Every function is pure and takes the evaluation moment `now` explicitly.
//! A log is *eligible* once its scheduled time is at or before `now`;
//! future doses never weigh on a rate.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use uuid::Uuid;

use super::transitions::effective_status;
use crate::models::enums::LogStatus;
use crate::models::MedicationLog;

// ═══════════════════════════════════════════
// Windows
// ═══════════════════════════════════════════

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN);
        Self { start, end: start + Duration::days(1) }
    }

    /// Calendar week containing `date`, starting on Sunday.
    pub fn week_containing(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_sunday());
        let start = (date - Duration::days(offset)).and_time(chrono::NaiveTime::MIN);
        Self { start, end: start + Duration::days(7) }
    }

    /// Calendar month containing `date`.
    pub fn month_containing(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let next = first.checked_add_months(Months::new(1)).unwrap_or(first + Duration::days(31));
        Self {
            start: first.and_time(chrono::NaiveTime::MIN),
            end: next.and_time(chrono::NaiveTime::MIN),
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

// ═══════════════════════════════════════════
// Completion rate
// ═══════════════════════════════════════════

/// Completed-over-eligible count pair.
///
/// An empty eligible set has a value of 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdherenceRate {
    pub completed: usize,
    pub eligible: usize,
}

impl AdherenceRate {
    pub fn from_logs<'a, I>(logs: I, now: NaiveDateTime) -> Self
    where
        I: IntoIterator<Item = &'a MedicationLog>,
    {
        let mut rate = Self::default();
        for log in logs.into_iter().filter(|l| l.scheduled_time <= now) {
            rate.eligible += 1;
            if log.status.is_completed() {
                rate.completed += 1;
            }
        }
        rate
    }

    pub fn value(&self) -> f64 {
        if self.eligible == 0 {
            return 0.0;
        }
        self.completed as f64 / self.eligible as f64
    }

    /// Rounded percentage, 0..=100.
    pub fn percent(&self) -> u32 {
        (self.value() * 100.0).round() as u32
    }

    pub fn has_data(&self) -> bool {
        self.eligible > 0
    }
}

/// Completion rate of the logs falling inside `window`.
pub fn completion_rate(logs: &[MedicationLog], window: &DateWindow, now: NaiveDateTime) -> AdherenceRate {
    AdherenceRate::from_logs(logs.iter().filter(|l| window.contains(l.scheduled_time)), now)
}

/// Completion rate of one medication's logs inside `window`.
pub fn medication_rate(
    logs: &[MedicationLog],
    medication_id: &Uuid,
    window: &DateWindow,
    now: NaiveDateTime,
) -> AdherenceRate {
    AdherenceRate::from_logs(
        logs.iter()
            .filter(|l| l.medication_id == *medication_id && window.contains(l.scheduled_time)),
        now,
    )
}

// ═══════════════════════════════════════════
// Breakdown & streak
// ═══════════════════════════════════════════

/// Log counts by status as seen at `now`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub taken: usize,
    pub delayed: usize,
    pub skipped: usize,
    pub snoozed: usize,
    pub pending: usize,
}

impl StatusBreakdown {
    pub fn from_logs<'a, I>(logs: I, now: NaiveDateTime) -> Self
    where
        I: IntoIterator<Item = &'a MedicationLog>,
    {
        let mut breakdown = Self::default();
        for log in logs {
            match effective_status(log, now) {
                LogStatus::Taken => breakdown.taken += 1,
                LogStatus::Delayed => breakdown.delayed += 1,
                LogStatus::Skipped => breakdown.skipped += 1,
                LogStatus::Snoozed => breakdown.snoozed += 1,
                LogStatus::Pending => breakdown.pending += 1,
            }
        }
        breakdown
    }

    pub fn completed(&self) -> usize {
        self.taken + self.delayed
    }

    pub fn total(&self) -> usize {
        self.taken + self.delayed + self.skipped + self.snoozed + self.pending
    }
}

pub fn status_breakdown(logs: &[MedicationLog], window: &DateWindow, now: NaiveDateTime) -> StatusBreakdown {
    StatusBreakdown::from_logs(logs.iter().filter(|l| window.contains(l.scheduled_time)), now)
}

/// Consecutive fully-compliant days ending today.
///
/// A day counts when it has at least one log and every log due by `now`
/// is taken or delayed. The walk stops at the first day without logs or
/// with a missed dose.
pub fn consecutive_days(logs: &[MedicationLog], today: NaiveDate, now: NaiveDateTime) -> u32 {
    let mut by_day: BTreeMap<NaiveDate, Vec<&MedicationLog>> = BTreeMap::new();
    for log in logs {
        by_day.entry(log.scheduled_time.date()).or_default().push(log);
    }

    let mut streak = 0;
    let mut day = today;
    while let Some(day_logs) = by_day.get(&day) {
        let compliant = day_logs
            .iter()
            .filter(|l| l.scheduled_time <= now)
            .all(|l| l.status.is_completed());
        if !compliant {
            break;
        }
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

// ═══════════════════════════════════════════
// Calendar & badges
// ═══════════════════════════════════════════

/// Summary status of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Taken,
    Skipped,
    Pending,
    Delayed,
}

/// `None` when the day has no logs. Open (pending or snoozed) doses make
/// the day pending; a mix of completed and skipped doses reads as delayed.
pub fn day_status(day_logs: &[MedicationLog], now: NaiveDateTime) -> Option<DayStatus> {
    if day_logs.is_empty() {
        return None;
    }

    let statuses: Vec<LogStatus> = day_logs.iter().map(|l| effective_status(l, now)).collect();
    if statuses.iter().all(|s| s.is_completed()) {
        Some(DayStatus::Taken)
    } else if statuses.iter().all(|s| *s == LogStatus::Skipped) {
        Some(DayStatus::Skipped)
    } else if statuses.iter().any(|s| !s.is_terminal()) {
        Some(DayStatus::Pending)
    } else {
        Some(DayStatus::Delayed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Completed,
    Late,
    Missed,
    Deferred,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeColor {
    Green,
    Orange,
    Red,
    Yellow,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub category: BadgeCategory,
    pub color: BadgeColor,
    pub icon: &'static str,
}

pub fn status_badge(status: LogStatus) -> StatusBadge {
    let (category, color, icon) = match status {
        LogStatus::Taken => (BadgeCategory::Completed, BadgeColor::Green, "checkmark.circle.fill"),
        LogStatus::Delayed => (BadgeCategory::Late, BadgeColor::Orange, "clock.badge.exclamationmark.fill"),
        LogStatus::Skipped => (BadgeCategory::Missed, BadgeColor::Red, "xmark.circle.fill"),
        LogStatus::Snoozed => (BadgeCategory::Deferred, BadgeColor::Yellow, "bell.slash.fill"),
        LogStatus::Pending => (BadgeCategory::Open, BadgeColor::Gray, "circle"),
    };
    StatusBadge { category, color, icon }
}

// ═══════════════════════════════════════════
// Time-of-day grouping
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn of(t: NaiveDateTime) -> Self {
        Self::from_hour(t.hour())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeOfDayGroup {
    pub period: TimeOfDay,
    pub logs: Vec<MedicationLog>,
}

/// Non-empty groups in morning → night order; logs keep their input order.
pub fn group_by_time_of_day(logs: &[MedicationLog]) -> Vec<TimeOfDayGroup> {
    let mut groups: BTreeMap<TimeOfDay, Vec<MedicationLog>> = BTreeMap::new();
    for log in logs {
        groups.entry(TimeOfDay::of(log.scheduled_time)).or_default().push(log.clone());
    }
    groups
        .into_iter()
        .map(|(period, logs)| TimeOfDayGroup { period, logs })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn log(med: Uuid, time: NaiveDateTime, status: LogStatus) -> MedicationLog {
        let mut log = MedicationLog::pending(med, None, time, time);
        log.status = status;
        log
    }

    #[test]
    fn future_logs_are_not_eligible() {
        let med = Uuid::new_v4();
        let logs = vec![
            log(med, at(5, 8, 0), LogStatus::Taken),
            log(med, at(5, 20, 0), LogStatus::Pending),
        ];
        let now = at(5, 12, 0);
        let rate = completion_rate(&logs, &DateWindow::day(now.date()), now);
        assert_eq!(rate, AdherenceRate { completed: 1, eligible: 1 });
        assert_eq!(rate.value(), 1.0);
    }

    #[test]
    fn delayed_counts_as_completed() {
        let med = Uuid::new_v4();
        let logs = vec![
            log(med, at(5, 8, 0), LogStatus::Delayed),
            log(med, at(5, 9, 0), LogStatus::Skipped),
            log(med, at(5, 10, 0), LogStatus::Pending),
            log(med, at(5, 11, 0), LogStatus::Taken),
        ];
        let rate = completion_rate(&logs, &DateWindow::day(at(5, 0, 0).date()), at(5, 23, 0));
        assert_eq!(rate.completed, 2);
        assert_eq!(rate.eligible, 4);
        assert_eq!(rate.percent(), 50);
    }

    #[test]
    fn empty_window_rate_is_zero() {
        let rate = completion_rate(&[], &DateWindow::day(at(5, 0, 0).date()), at(5, 12, 0));
        assert_eq!(rate.value(), 0.0);
        assert!(!rate.has_data());

        let only_future = vec![log(Uuid::new_v4(), at(5, 20, 0), LogStatus::Pending)];
        let rate = completion_rate(&only_future, &DateWindow::day(at(5, 0, 0).date()), at(5, 12, 0));
        assert_eq!(rate.value(), 0.0);
    }

    #[test]
    fn window_excludes_end_instant() {
        let med = Uuid::new_v4();
        let logs = vec![log(med, at(6, 0, 0), LogStatus::Skipped)];
        let rate = completion_rate(&logs, &DateWindow::day(at(5, 0, 0).date()), at(6, 12, 0));
        assert_eq!(rate.eligible, 0);
    }

    #[test]
    fn medication_rate_ignores_other_medications() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let logs = vec![
            log(a, at(5, 8, 0), LogStatus::Taken),
            log(b, at(5, 8, 0), LogStatus::Skipped),
        ];
        let window = DateWindow::day(at(5, 0, 0).date());
        assert_eq!(medication_rate(&logs, &a, &window, at(5, 12, 0)).value(), 1.0);
        assert_eq!(medication_rate(&logs, &b, &window, at(5, 12, 0)).value(), 0.0);
    }

    #[test]
    fn breakdown_counts_expired_snooze_as_pending() {
        let med = Uuid::new_v4();
        let mut snoozed = log(med, at(5, 8, 0), LogStatus::Snoozed);
        snoozed.snoozed_until = Some(at(5, 8, 10));
        let logs = vec![snoozed, log(med, at(5, 9, 0), LogStatus::Taken)];
        let window = DateWindow::day(at(5, 0, 0).date());

        let early = status_breakdown(&logs, &window, at(5, 8, 5));
        assert_eq!((early.snoozed, early.pending, early.taken), (1, 0, 1));
        let late = status_breakdown(&logs, &window, at(5, 8, 30));
        assert_eq!((late.snoozed, late.pending), (0, 1));
        assert_eq!(late.total(), 2);
        assert_eq!(late.completed(), 1);
    }

    #[test]
    fn streak_stops_at_first_missed_day() {
        let med = Uuid::new_v4();
        let logs = vec![
            log(med, at(5, 8, 0), LogStatus::Taken),
            log(med, at(4, 8, 0), LogStatus::Delayed),
            log(med, at(4, 20, 0), LogStatus::Taken),
            log(med, at(3, 8, 0), LogStatus::Taken),
            log(med, at(2, 8, 0), LogStatus::Skipped),
            log(med, at(1, 8, 0), LogStatus::Taken),
        ];
        assert_eq!(consecutive_days(&logs, at(5, 0, 0).date(), at(5, 21, 0)), 3);
    }

    #[test]
    fn streak_ignores_doses_not_yet_due_today() {
        let med = Uuid::new_v4();
        let logs = vec![
            log(med, at(5, 8, 0), LogStatus::Taken),
            log(med, at(5, 20, 0), LogStatus::Pending),
            log(med, at(4, 8, 0), LogStatus::Taken),
        ];
        assert_eq!(consecutive_days(&logs, at(5, 0, 0).date(), at(5, 12, 0)), 2);
    }

    #[test]
    fn streak_breaks_on_day_without_logs() {
        let med = Uuid::new_v4();
        let logs = vec![
            log(med, at(5, 8, 0), LogStatus::Taken),
            log(med, at(3, 8, 0), LogStatus::Taken),
        ];
        assert_eq!(consecutive_days(&logs, at(5, 0, 0).date(), at(5, 12, 0)), 1);
        assert_eq!(consecutive_days(&[], at(5, 0, 0).date(), at(5, 12, 0)), 0);
    }

    #[test]
    fn day_status_rules() {
        let med = Uuid::new_v4();
        let now = at(6, 0, 0);
        assert_eq!(day_status(&[], now), None);
        assert_eq!(
            day_status(&[log(med, at(5, 8, 0), LogStatus::Taken), log(med, at(5, 9, 0), LogStatus::Delayed)], now),
            Some(DayStatus::Taken)
        );
        assert_eq!(day_status(&[log(med, at(5, 8, 0), LogStatus::Skipped)], now), Some(DayStatus::Skipped));
        assert_eq!(
            day_status(&[log(med, at(5, 8, 0), LogStatus::Taken), log(med, at(5, 9, 0), LogStatus::Pending)], now),
            Some(DayStatus::Pending)
        );
        assert_eq!(
            day_status(&[log(med, at(5, 8, 0), LogStatus::Taken), log(med, at(5, 9, 0), LogStatus::Skipped)], now),
            Some(DayStatus::Delayed)
        );
    }

    #[test]
    fn every_status_has_a_badge() {
        for status in LogStatus::ALL {
            let badge = status_badge(*status);
            assert!(!badge.icon.is_empty());
        }
        assert_eq!(status_badge(LogStatus::Taken).color, BadgeColor::Green);
        assert_eq!(status_badge(LogStatus::Skipped).color, BadgeColor::Red);
        assert_eq!(status_badge(LogStatus::Delayed).color, BadgeColor::Orange);
        assert_eq!(status_badge(LogStatus::Snoozed).color, BadgeColor::Yellow);
        assert_eq!(status_badge(LogStatus::Pending).color, BadgeColor::Gray);
    }

    #[test]
    fn time_of_day_boundaries() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Night);
    }

    #[test]
    fn groups_are_ordered_and_non_empty() {
        let med = Uuid::new_v4();
        let logs = vec![
            log(med, at(5, 22, 0), LogStatus::Pending),
            log(med, at(5, 8, 0), LogStatus::Taken),
            log(med, at(5, 9, 0), LogStatus::Pending),
        ];
        let groups = group_by_time_of_day(&logs);
        let periods: Vec<TimeOfDay> = groups.iter().map(|g| g.period).collect();
        assert_eq!(periods, vec![TimeOfDay::Morning, TimeOfDay::Night]);
        assert_eq!(groups[0].logs.len(), 2);
    }

    #[test]
    fn week_starts_on_sunday_and_month_on_first() {
        // 2025-03-05 is a Wednesday.
        let week = DateWindow::week_containing(at(5, 0, 0).date());
        assert_eq!(week.start, at(2, 0, 0));
        assert_eq!(week.end, at(9, 0, 0));

        let month = DateWindow::month_containing(at(5, 0, 0).date());
        assert_eq!(month.start, at(1, 0, 0));
        assert_eq!(month.end, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }
}
