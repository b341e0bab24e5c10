//! Adherence core: recurrence expansion, daily log materialization,
//! the dose-log state machine and the pure statistics over logs.
//!
//! Data flow on a home refresh:
//! `store` (schedules) → `materializer` (pending logs for today)
//! → `store` (today's logs) → `calculator` (rates, streak, groups).

pub mod calculator;
pub mod materializer;
pub mod recurrence;
pub mod store;
pub mod transitions;

use thiserror::Error;

use crate::models::enums::LogStatus;

pub use calculator::*;
pub use materializer::{materialize_day, MaterializeReport};
pub use store::{current_streak, DoseStore};

/// Rejected state-machine transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Dose already resolved as {0}")]
    AlreadyResolved(LogStatus),

    #[error("Snooze length must be at least one minute")]
    InvalidSnooze,
}
