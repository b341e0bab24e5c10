use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{MealRelation, ScheduleType};

/// Recurrence rule plus the times of day a medication is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub schedule_type: ScheduleType,
    pub times: Vec<NaiveTime>,
    /// Weekday numbers, 0 = Sunday .. 6 = Saturday. Only read for `SpecificDays`.
    pub specific_days: Vec<u8>,
    /// Only read for `Interval`; values below 1 are treated as 1.
    pub interval_days: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub meal_relation: MealRelation,
    pub is_active: bool,
    pub notification_enabled: bool,
    pub reminder_minutes_before: u32,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl MedicationSchedule {
    /// A daily schedule starting on `start_date`.
    pub fn daily(
        medication_id: Uuid,
        times: Vec<NaiveTime>,
        start_date: NaiveDate,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            medication_id,
            schedule_type: ScheduleType::Daily,
            times,
            specific_days: Vec::new(),
            interval_days: 1,
            start_date,
            end_date: None,
            meal_relation: MealRelation::Anytime,
            is_active: true,
            notification_enabled: true,
            reminder_minutes_before: 0,
            notes: None,
            created_at,
            updated_at: created_at,
        }
    }
}
