use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::LogStatus;

/// One concrete, dated dose event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationLog {
    pub id: Uuid,
    pub medication_id: Uuid,
    /// `None` for ad hoc entries that no schedule generated.
    pub schedule_id: Option<Uuid>,
    pub scheduled_time: NaiveDateTime,
    pub status: LogStatus,
    pub actual_time: Option<NaiveDateTime>,
    /// Free-form notes; holds the reason when the dose was skipped.
    pub notes: Option<String>,
    pub snooze_count: u32,
    pub snoozed_until: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl MedicationLog {
    pub fn pending(
        medication_id: Uuid,
        schedule_id: Option<Uuid>,
        scheduled_time: NaiveDateTime,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            medication_id,
            schedule_id,
            scheduled_time,
            status: LogStatus::Pending,
            actual_time: None,
            notes: None,
            snooze_count: 0,
            snoozed_until: None,
            created_at,
        }
    }
}
