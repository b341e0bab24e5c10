use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DataSource, MetricType};

/// A health measurement, optionally tied to the dose that prompted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
    pub id: Uuid,
    pub medication_id: Option<Uuid>,
    pub log_id: Option<Uuid>,
    pub metric_type: MetricType,
    pub value: f64,
    /// Blood pressure only.
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub source: DataSource,
    pub recorded_at: NaiveDateTime,
    pub notes: Option<String>,
}

impl HealthMetric {
    pub fn display_value(&self) -> String {
        match (self.metric_type, self.systolic, self.diastolic) {
            (MetricType::BloodPressure, Some(sys), Some(dia)) => {
                format!("{sys:.0}/{dia:.0} {}", self.metric_type.unit())
            }
            (MetricType::Mood, _, _) => format!("{:.0}", self.value),
            _ => format!("{:.1} {}", self.value, self.metric_type.unit()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metric(metric_type: MetricType, value: f64, bp: Option<(f64, f64)>) -> HealthMetric {
        HealthMetric {
            id: Uuid::new_v4(),
            medication_id: None,
            log_id: None,
            metric_type,
            value,
            systolic: bp.map(|b| b.0),
            diastolic: bp.map(|b| b.1),
            source: DataSource::Manual,
            recorded_at: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            notes: None,
        }
    }

    #[test]
    fn blood_pressure_shows_both_readings() {
        let m = metric(MetricType::BloodPressure, 120.0, Some((120.0, 80.0)));
        assert_eq!(m.display_value(), "120/80 mmHg");
    }

    #[test]
    fn weight_shows_one_decimal() {
        assert_eq!(metric(MetricType::Weight, 70.25, None).display_value(), "70.2 kg");
    }
}
