pub mod adherence; // Materializer, adherence calculator, log state machine
pub mod capabilities; // Reminders, entitlements, health store
pub mod config;
pub mod db;
pub mod export; // JSON backup + widget snapshot
pub mod history; // Log history & CSV
pub mod medications; // Medication list & detail
pub mod models;
pub mod tracker; // Home screen + dose actions

use chrono::Local;
use tracing_subscriber::EnvFilter;

use crate::capabilities::{Capabilities, FreeTier, NoHealthSink, TracingReminderScheduler};
use crate::models::PatientScope;
use crate::tracker::{DoseTracker, TrackerError};

/// Installs the global fmt subscriber. `RUST_LOG` wins over the default
/// filter. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Opens the user's database, refreshes today's home screen for their own
/// medications and returns it as JSON.
pub fn run() -> Result<String, TrackerError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let conn = db::sqlite::open_database(&config::database_path())?;

    let scheduler = TracingReminderScheduler;
    let entitlements = FreeTier;
    let health = NoHealthSink;
    let tracker = DoseTracker::new(
        &conn,
        Capabilities { reminders: &scheduler, entitlements: &entitlements, health: &health },
    );

    let snapshot = tracker.refresh_home(PatientScope::Myself, Local::now().naive_local())?;
    Ok(serde_json::to_string_pretty(&snapshot)?)
}
