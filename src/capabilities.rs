//! Platform collaborators injected into the tracker.
//!
//! The host app supplies real implementations (local notifications, billing,
//! the platform health store). The bundled ones log or no-op so the core
//! runs headless and in tests.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::adherence::recurrence;
use crate::config;
use crate::models::enums::{MealRelation, ScheduleType};
use crate::models::{HealthMetric, Medication, MedicationLog, MedicationSchedule};

// ═══════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReminderError {
    #[error("Reminders are not authorized on this device")]
    NotAuthorized,

    #[error("Failed to schedule reminder: {0}")]
    ScheduleFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    #[error("Free plan allows up to {limit} medications")]
    MedicationLimit { limit: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Health store write failed: {0}")]
pub struct HealthSinkError(pub String);

// ═══════════════════════════════════════════
// Reminder requests
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReminderCategory {
    MedicationReminder,
    CriticalMedication,
    LowStock,
}

impl ReminderCategory {
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::MedicationReminder => "MEDICATION_REMINDER",
            Self::CriticalMedication => "CRITICAL_MEDICATION",
            Self::LowStock => "LOW_STOCK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderTrigger {
    /// Repeats every day at this time.
    Daily(NaiveTime),
    /// Fires once.
    At(NaiveDateTime),
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderRequest {
    pub identifier: String,
    pub category: ReminderCategory,
    pub medication_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub log_id: Option<Uuid>,
    pub trigger: ReminderTrigger,
    pub title: String,
    pub body: String,
}

fn dose_body(med: &Medication, meal: MealRelation) -> String {
    let mut body = format!("Take {} {}.", med.name, med.dosage).replace(" .", ".");
    let hint = match meal {
        MealRelation::BeforeMeal => Some("before meal"),
        MealRelation::AfterMeal => Some("after meal"),
        MealRelation::WithMeal => Some("with meal"),
        MealRelation::EmptyStomach => Some("on an empty stomach"),
        MealRelation::Anytime => None,
    };
    if let Some(hint) = hint {
        body.push_str(&format!(" ({hint})"));
    }
    body
}

/// One daily reminder per time of the schedule, shifted by its lead time.
pub fn schedule_reminders(med: &Medication, schedule: &MedicationSchedule) -> Vec<ReminderRequest> {
    if !schedule.notification_enabled || schedule.schedule_type == ScheduleType::AsNeeded {
        return Vec::new();
    }

    let lead = Duration::minutes(i64::from(schedule.reminder_minutes_before));
    schedule
        .times
        .iter()
        .enumerate()
        .map(|(index, time)| ReminderRequest {
            identifier: format!("dosemate.schedule.{}.{index}", schedule.id),
            category: ReminderCategory::MedicationReminder,
            medication_id: med.id,
            schedule_id: Some(schedule.id),
            log_id: None,
            trigger: ReminderTrigger::Daily(time.overflowing_sub_signed(lead).0),
            title: "Time for your medication".into(),
            body: dose_body(med, schedule.meal_relation),
        })
        .collect()
}

/// Identifier of the one-off follow-up requested when a dose is snoozed.
pub fn snooze_identifier(log_id: &Uuid) -> String {
    format!("dosemate.snooze.{log_id}")
}

pub fn snooze_reminder(med: &Medication, log: &MedicationLog, until: NaiveDateTime) -> ReminderRequest {
    ReminderRequest {
        identifier: snooze_identifier(&log.id),
        category: ReminderCategory::MedicationReminder,
        medication_id: med.id,
        schedule_id: log.schedule_id,
        log_id: Some(log.id),
        trigger: ReminderTrigger::At(until),
        title: "Medication reminder (snoozed)".into(),
        body: dose_body(med, MealRelation::Anytime),
    }
}

pub fn low_stock_reminder(med: &Medication) -> ReminderRequest {
    let category = if med.is_critical_stock() {
        ReminderCategory::CriticalMedication
    } else {
        ReminderCategory::LowStock
    };
    ReminderRequest {
        identifier: format!("dosemate.lowstock.{}", med.id),
        category,
        medication_id: med.id,
        schedule_id: None,
        log_id: None,
        trigger: ReminderTrigger::Immediate,
        title: "Running low on stock".into(),
        body: format!("{} has {} left.", med.name, med.stock_count),
    }
}

/// Reminders for all schedules, within the platform's pending-reminder cap.
///
/// Schedules are ordered by their next dose today (none sorts last) and
/// admitted whole while they fit.
pub fn plan_reminders(
    items: &[(Medication, MedicationSchedule)],
    now: NaiveDateTime,
) -> Vec<ReminderRequest> {
    let mut candidates: Vec<(Option<NaiveDateTime>, Vec<ReminderRequest>)> = items
        .iter()
        .filter(|(med, schedule)| med.is_active && schedule.is_active)
        .map(|(med, schedule)| {
            (recurrence::next_time_after(schedule, now), schedule_reminders(med, schedule))
        })
        .filter(|(_, requests)| !requests.is_empty())
        .collect();

    candidates.sort_by_key(|(next, _)| (next.is_none(), *next));

    let mut planned = Vec::new();
    for (_, requests) in candidates {
        if planned.len() + requests.len() > config::MAX_PENDING_REMINDERS {
            break;
        }
        planned.extend(requests);
    }
    planned
}

// ═══════════════════════════════════════════
// Reminder actions
// ═══════════════════════════════════════════

/// Action chosen on a delivered reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReminderAction {
    Taken,
    Snooze(u32),
    Skip,
    ViewDetails,
}

impl ReminderAction {
    pub fn from_identifier(id: &str) -> Option<Self> {
        match id {
            "TAKEN_ACTION" => Some(Self::Taken),
            "SNOOZE_5_ACTION" => Some(Self::Snooze(5)),
            "SNOOZE_10_ACTION" => Some(Self::Snooze(10)),
            "SNOOZE_15_ACTION" => Some(Self::Snooze(15)),
            "SNOOZE_30_ACTION" => Some(Self::Snooze(30)),
            "SKIP_ACTION" => Some(Self::Skip),
            "VIEW_DETAILS_ACTION" => Some(Self::ViewDetails),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════
// Capability traits
// ═══════════════════════════════════════════

pub trait ReminderScheduler {
    fn schedule(&self, request: &ReminderRequest) -> Result<(), ReminderError>;
    fn cancel_for_schedule(&self, schedule_id: &Uuid) -> Result<(), ReminderError>;
    /// Withdraws a single pending request by identifier.
    fn cancel(&self, identifier: &str) -> Result<(), ReminderError>;
    fn notify_low_stock(&self, medication: &Medication) -> Result<(), ReminderError>;
}

pub trait Entitlements {
    fn is_premium(&self) -> bool;

    /// Errors when one more medication would exceed the free plan.
    fn check_medication_quota(&self, current_count: usize) -> Result<(), EntitlementError> {
        if self.is_premium() || current_count < config::FREE_MEDICATION_LIMIT {
            Ok(())
        } else {
            Err(EntitlementError::MedicationLimit { limit: config::FREE_MEDICATION_LIMIT })
        }
    }
}

pub trait HealthDataSink {
    fn write_metric(&self, metric: &HealthMetric) -> Result<(), HealthSinkError>;
}

/// The collaborators a `DoseTracker` works with.
pub struct Capabilities<'a> {
    pub reminders: &'a dyn ReminderScheduler,
    pub entitlements: &'a dyn Entitlements,
    pub health: &'a dyn HealthDataSink,
}

// ═══════════════════════════════════════════
// Bundled implementations
// ═══════════════════════════════════════════

/// Logs every request instead of delivering it.
#[derive(Debug, Default)]
pub struct TracingReminderScheduler;

impl ReminderScheduler for TracingReminderScheduler {
    fn schedule(&self, request: &ReminderRequest) -> Result<(), ReminderError> {
        tracing::info!(
            identifier = %request.identifier,
            category = request.category.identifier(),
            trigger = ?request.trigger,
            "Reminder scheduled"
        );
        Ok(())
    }

    fn cancel_for_schedule(&self, schedule_id: &Uuid) -> Result<(), ReminderError> {
        tracing::info!(%schedule_id, "Reminders cancelled");
        Ok(())
    }

    fn cancel(&self, identifier: &str) -> Result<(), ReminderError> {
        tracing::info!(identifier, "Reminder cancelled");
        Ok(())
    }

    fn notify_low_stock(&self, medication: &Medication) -> Result<(), ReminderError> {
        self.schedule(&low_stock_reminder(medication))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FreeTier;

impl Entitlements for FreeTier {
    fn is_premium(&self) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Premium;

impl Entitlements for Premium {
    fn is_premium(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoHealthSink;

impl HealthDataSink for NoHealthSink {
    fn write_metric(&self, _metric: &HealthMetric) -> Result<(), HealthSinkError> {
        Ok(())
    }
}
