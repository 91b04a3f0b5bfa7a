use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Sahha";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hard per-attempt timeout for the completion service.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries after the first upstream attempt (3 attempts total).
pub const UPSTREAM_MAX_RETRIES: u32 = 2;

/// Linear backoff unit: attempt N waits N x this before resubmission.
pub const BACKOFF_UNIT: Duration = Duration::from_millis(1000);

/// Completion request parameters (observed service defaults).
pub const COMPLETION_MODEL: &str = "command";
pub const COMPLETION_MAX_TOKENS: u32 = 500;
pub const COMPLETION_TEMPERATURE: f64 = 0.3;

/// Fixed admission window shared by all rate-limited endpoints.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Per-identity request budget for the symptom-analysis endpoint.
pub const ANALYZE_MAX_PER_WINDOW: u32 = 10;

/// Per-identity request budget for the lower-risk facility-lookup endpoint.
pub const FACILITY_MAX_PER_WINDOW: u32 = 20;

/// Request validation bounds for `POST /api/analyze`.
pub const MAX_SYMPTOM_CHARS: usize = 2000;
pub const MAX_PATIENT_AGE: i64 = 150;

/// Capacity of the in-memory result cache. The persistent store keeps
/// everything; only the hot layer is bounded.
pub const CACHE_CAPACITY: usize = 512;

/// Get the application data directory (~/Sahha on all platforms).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Path of the local triage database (cache + offline queue).
pub fn triage_db_path() -> PathBuf {
    app_data_dir().join("triage.db")
}
