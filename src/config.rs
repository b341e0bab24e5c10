use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "DoseMate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database file name inside the app data directory.
pub const DATABASE_FILE: &str = "dosemate.sqlite";

/// A dose taken more than this many minutes after its scheduled time is `delayed`.
pub const DELAYED_DOSE_GRACE_MINUTES: i64 = 30;

/// Snooze length offered by default on a reminder.
pub const DEFAULT_SNOOZE_MINUTES: u32 = 10;

/// Snooze choices offered in the UI and on reminder actions.
pub const SNOOZE_OPTIONS: &[u32] = &[5, 10, 15, 30, 60];

/// Stock level at or below which a medication is low on stock, unless overridden.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Stock level that triggers the critical reminder category.
pub const CRITICAL_STOCK_THRESHOLD: i32 = 2;

/// Free tier: maximum number of registered medications.
pub const FREE_MEDICATION_LIMIT: usize = 3;

/// The platform keeps at most this many pending local reminders.
pub const MAX_PENDING_REMINDERS: usize = 64;

/// Version stamped into JSON exports so future imports can migrate them.
pub const EXPORT_DATA_VERSION: u32 = 1;

/// Get the application data directory.
/// ~/DoseMate/ on all platforms; falls back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the path of the SQLite database.
pub fn database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,dosemate_lib=debug"
}
