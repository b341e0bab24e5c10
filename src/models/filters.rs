use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whose medications a query covers.
///
/// `Myself` matches only medications with no patient; it never widens to
/// every medication in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PatientScope {
    #[default]
    Myself,
    Patient(Uuid),
}

impl PatientScope {
    pub fn from_patient_id(patient_id: Option<Uuid>) -> Self {
        match patient_id {
            Some(id) => Self::Patient(id),
            None => Self::Myself,
        }
    }

    pub fn patient_id(&self) -> Option<Uuid> {
        match self {
            Self::Myself => None,
            Self::Patient(id) => Some(*id),
        }
    }

    pub fn contains(&self, patient_id: Option<Uuid>) -> bool {
        self.patient_id() == patient_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationFilter {
    #[default]
    All,
    Active,
    Inactive,
    LowStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationSort {
    #[default]
    Name,
    Newest,
    NextDose,
    Stock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFilter {
    #[default]
    All,
    Taken,
    Skipped,
    Delayed,
}
