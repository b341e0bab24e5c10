//! Expands a schedule's recurrence rule into concrete dose times.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::models::enums::ScheduleType;
use crate::models::MedicationSchedule;

/// Whether the schedule produces doses on `date`.
pub fn is_due_on(schedule: &MedicationSchedule, date: NaiveDate) -> bool {
    if !schedule.is_active || date < schedule.start_date {
        return false;
    }
    if schedule.end_date.is_some_and(|end| date > end) {
        return false;
    }

    match schedule.schedule_type {
        ScheduleType::Daily => true,
        ScheduleType::SpecificDays => {
            let weekday = date.weekday().num_days_from_sunday() as u8;
            schedule.specific_days.contains(&weekday)
        }
        ScheduleType::Interval => {
            let elapsed = (date - schedule.start_date).num_days();
            elapsed % i64::from(schedule.interval_days.max(1)) == 0
        }
        ScheduleType::AsNeeded => false,
    }
}

/// Sorted, minute-truncated dose times of the schedule on `date`.
pub fn times_on(schedule: &MedicationSchedule, date: NaiveDate) -> Vec<NaiveDateTime> {
    if !is_due_on(schedule, date) {
        return Vec::new();
    }

    let mut times: Vec<NaiveDateTime> = schedule
        .times
        .iter()
        .map(|t| truncate_to_minute(date.and_time(*t)))
        .collect();
    times.sort();
    times.dedup();
    times
}

/// First of today's dose times strictly after `now`.
pub fn next_time_after(schedule: &MedicationSchedule, now: NaiveDateTime) -> Option<NaiveDateTime> {
    times_on(schedule, now.date()).into_iter().find(|t| *t > now)
}

pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn schedule(times: Vec<NaiveTime>) -> MedicationSchedule {
        MedicationSchedule::daily(
            Uuid::new_v4(),
            times,
            date(3, 1),
            date(3, 1).and_hms_opt(0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn daily_times_are_sorted() {
        let s = schedule(vec![time(20, 0), time(8, 0)]);
        let times = times_on(&s, date(3, 5));
        assert_eq!(times, vec![date(3, 5).and_time(time(8, 0)), date(3, 5).and_time(time(20, 0))]);
    }

    #[test]
    fn nothing_before_start_or_after_end() {
        let mut s = schedule(vec![time(8, 0)]);
        s.end_date = Some(date(3, 10));
        assert!(times_on(&s, date(2, 28)).is_empty());
        assert_eq!(times_on(&s, date(3, 10)).len(), 1);
        assert!(times_on(&s, date(3, 11)).is_empty());
    }

    #[test]
    fn inactive_schedule_has_no_doses() {
        let mut s = schedule(vec![time(8, 0)]);
        s.is_active = false;
        assert!(times_on(&s, date(3, 5)).is_empty());
    }

    #[test]
    fn as_needed_is_never_materialized() {
        let mut s = schedule(vec![time(8, 0)]);
        s.schedule_type = ScheduleType::AsNeeded;
        assert!(times_on(&s, date(3, 5)).is_empty());
    }

    #[test]
    fn specific_days_use_sunday_zero() {
        let mut s = schedule(vec![time(8, 0)]);
        s.schedule_type = ScheduleType::SpecificDays;
        s.specific_days = vec![0, 3]; // Sunday, Wednesday
        // 2025-03-02 is a Sunday, 03-05 a Wednesday.
        assert_eq!(times_on(&s, date(3, 2)).len(), 1);
        assert_eq!(times_on(&s, date(3, 5)).len(), 1);
        assert!(times_on(&s, date(3, 3)).is_empty());
    }

    #[test]
    fn interval_fires_only_on_matching_days() {
        let mut s = schedule(vec![time(8, 0)]);
        s.schedule_type = ScheduleType::Interval;
        s.interval_days = 3;
        let due: Vec<u32> = (1..=10).filter(|d| is_due_on(&s, date(3, *d))).collect();
        assert_eq!(due, vec![1, 4, 7, 10]);
    }

    #[test]
    fn times_are_truncated_to_the_minute() {
        let s = schedule(vec![NaiveTime::from_hms_opt(8, 0, 45).unwrap()]);
        assert_eq!(times_on(&s, date(3, 5)), vec![date(3, 5).and_time(time(8, 0))]);
    }

    #[test]
    fn next_time_is_strictly_later() {
        let s = schedule(vec![time(8, 0), time(20, 0)]);
        let now = date(3, 5).and_time(time(8, 0));
        assert_eq!(next_time_after(&s, now), Some(date(3, 5).and_time(time(20, 0))));
        let late = date(3, 5).and_time(time(21, 0));
        assert_eq!(next_time_after(&s, late), None);
    }
}
