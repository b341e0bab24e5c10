use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(ScheduleType {
    Daily => "daily",
    SpecificDays => "specific_days",
    Interval => "interval",
    AsNeeded => "as_needed",
});

str_enum!(LogStatus {
    Pending => "pending",
    Taken => "taken",
    Delayed => "delayed",
    Skipped => "skipped",
    Snoozed => "snoozed",
});

impl LogStatus {
    /// Taken on time or late both count as adherent.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Taken | Self::Delayed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Taken | Self::Delayed | Self::Skipped)
    }
}

str_enum!(MealRelation {
    BeforeMeal => "before_meal",
    AfterMeal => "after_meal",
    WithMeal => "with_meal",
    Anytime => "anytime",
    EmptyStomach => "empty_stomach",
});

str_enum!(MedicationForm {
    Tablet => "tablet",
    Capsule => "capsule",
    Syrup => "syrup",
    Injection => "injection",
    Patch => "patch",
    Cream => "cream",
    Inhaler => "inhaler",
    Drops => "drops",
    Powder => "powder",
    Other => "other",
});

str_enum!(MedicationColor {
    White => "white",
    Yellow => "yellow",
    Orange => "orange",
    Pink => "pink",
    Red => "red",
    Brown => "brown",
    Green => "green",
    Blue => "blue",
    Purple => "purple",
    Black => "black",
    Multicolor => "multicolor",
});

str_enum!(MedicationCategory {
    Cardiovascular => "cardiovascular",
    Diabetes => "diabetes",
    Respiratory => "respiratory",
    Pain => "pain",
    Gastrointestinal => "gastrointestinal",
    Mental => "mental",
    Antibiotic => "antibiotic",
    Vitamin => "vitamin",
    Thyroid => "thyroid",
    Other => "other",
});

impl MedicationCategory {
    /// Health metrics worth recording after a dose of this category.
    pub fn related_metric_types(&self) -> &'static [MetricType] {
        match self {
            Self::Cardiovascular => &[MetricType::BloodPressure, MetricType::HeartRate],
            Self::Diabetes => &[MetricType::BloodGlucose, MetricType::Hba1c, MetricType::Weight],
            Self::Respiratory => &[MetricType::OxygenSaturation],
            Self::Pain => &[MetricType::Mood],
            Self::Gastrointestinal => &[MetricType::Weight, MetricType::Mood],
            Self::Mental => &[MetricType::Mood, MetricType::Sleep],
            Self::Antibiotic => &[MetricType::BodyTemperature],
            Self::Vitamin => &[MetricType::Weight],
            Self::Thyroid => &[MetricType::Weight, MetricType::HeartRate],
            Self::Other => &[],
        }
    }
}

str_enum!(MetricType {
    Weight => "weight",
    BloodPressure => "blood_pressure",
    BloodGlucose => "blood_glucose",
    Hba1c => "hba1c",
    WaterIntake => "water_intake",
    BodyTemperature => "body_temperature",
    OxygenSaturation => "oxygen_saturation",
    Mood => "mood",
    HeartRate => "heart_rate",
    Steps => "steps",
    Sleep => "sleep",
});

impl MetricType {
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Weight => "kg",
            Self::BloodPressure => "mmHg",
            Self::BloodGlucose => "mg/dL",
            Self::Hba1c => "%",
            Self::WaterIntake => "ml",
            Self::BodyTemperature => "°C",
            Self::OxygenSaturation => "%",
            Self::Mood => "",
            Self::HeartRate => "bpm",
            Self::Steps => "steps",
            Self::Sleep => "h",
        }
    }

    /// Mood has no platform health-store counterpart.
    pub fn supports_health_store(&self) -> bool {
        !matches!(self, Self::Mood)
    }
}

str_enum!(DataSource {
    Manual => "manual",
    HealthKit => "health_kit",
});

str_enum!(PatientRelationship {
    Myself => "myself",
    Parent => "parent",
    Grandparent => "grandparent",
    Spouse => "spouse",
    Child => "child",
    Sibling => "sibling",
    Relative => "relative",
    Friend => "friend",
    Other => "other",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn log_status_round_trip() {
        for (variant, s) in [
            (LogStatus::Pending, "pending"),
            (LogStatus::Taken, "taken"),
            (LogStatus::Delayed, "delayed"),
            (LogStatus::Skipped, "skipped"),
            (LogStatus::Snoozed, "snoozed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(LogStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn schedule_type_round_trip() {
        for variant in ScheduleType::ALL {
            assert_eq!(ScheduleType::from_str(variant.as_str()).unwrap(), *variant);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = LogStatus::from_str("missed").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
        assert!(err.to_string().contains("LogStatus"));
    }

    #[test]
    fn completed_statuses() {
        assert!(LogStatus::Taken.is_completed());
        assert!(LogStatus::Delayed.is_completed());
        assert!(!LogStatus::Skipped.is_completed());
        assert!(!LogStatus::Snoozed.is_completed());
        assert!(!LogStatus::Pending.is_completed());
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = LogStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&LogStatus::Taken, &LogStatus::Delayed, &LogStatus::Skipped]);
    }

    #[test]
    fn serde_uses_store_strings() {
        let json = serde_json::to_string(&MealRelation::EmptyStomach).unwrap();
        assert_eq!(json, "\"empty_stomach\"");
    }

    #[test]
    fn other_category_has_no_metrics() {
        assert!(MedicationCategory::Other.related_metric_types().is_empty());
        assert_eq!(
            MedicationCategory::Diabetes.related_metric_types().first(),
            Some(&MetricType::BloodGlucose)
        );
    }

    #[test]
    fn mood_stays_local() {
        assert!(!MetricType::Mood.supports_health_store());
        assert!(MetricType::HeartRate.supports_health_store());
    }
}
