use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PatientRelationship;

/// A dependent whose medications the app's user manages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub relationship: PatientRelationship,
    pub birth_date: Option<NaiveDate>,
    pub profile_color: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl Patient {
    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut years = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    /// Two-letter initials: first letters of the first two words, or the first two letters.
    pub fn initials(&self) -> String {
        let words: Vec<&str> = self.name.split_whitespace().collect();
        let raw: String = if words.len() >= 2 {
            words.iter().take(2).filter_map(|w| w.chars().next()).collect()
        } else {
            self.name.chars().take(2).collect()
        };
        raw.to_uppercase()
    }
}
