use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub doctor_name: String,
    pub specialty: Option<String>,
    pub location: Option<String>,
    pub appointment_time: NaiveDateTime,
    pub notes: Option<String>,
    pub is_completed: bool,
}
