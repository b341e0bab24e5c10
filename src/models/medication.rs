use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{MedicationCategory, MedicationColor, MedicationForm};
use crate::config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub name: String,
    pub dosage: String,
    pub strength: String,
    pub form: MedicationForm,
    pub color: MedicationColor,
    pub category: MedicationCategory,
    pub purpose: String,
    pub prescribing_doctor: String,
    pub notes: Option<String>,
    pub stock_count: i32,
    pub low_stock_threshold: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl Medication {
    /// A tablet for the app's own user with default stock settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: None,
            name: name.into(),
            dosage: String::new(),
            strength: String::new(),
            form: MedicationForm::Tablet,
            color: MedicationColor::White,
            category: MedicationCategory::Other,
            purpose: String::new(),
            prescribing_doctor: String::new(),
            notes: None,
            stock_count: 0,
            low_stock_threshold: config::DEFAULT_LOW_STOCK_THRESHOLD,
            is_active: true,
            created_at: Local::now().naive_local(),
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_count <= self.low_stock_threshold
    }

    /// Low stock that still matters: paused medications are never flagged.
    pub fn needs_refill(&self) -> bool {
        self.is_active && self.is_low_stock()
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_count <= 0
    }

    pub fn is_critical_stock(&self) -> bool {
        self.stock_count <= config::CRITICAL_STOCK_THRESHOLD
    }

    /// Stock after taking `amount` units, floored at zero.
    pub fn stock_after_use(&self, amount: i32) -> i32 {
        (self.stock_count - amount).max(0)
    }
}
