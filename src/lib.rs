pub mod aggregation;
pub mod calendar;
pub mod db;
pub mod errors;
pub mod forecast;
pub mod models;
pub mod notify;
pub mod oracle;
pub mod scheduler;
pub mod scoring;
pub mod streak;
pub mod tracker;
pub mod weights;

pub use crate::calendar::DayKey;
pub use crate::db::Database;
pub use crate::errors::{AppError, AppResult};
pub use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
pub use crate::oracle::{HttpOracle, MockOracle, ScoringOracle};
pub use crate::tracker::GoalTracker;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs JSON logging to `<data_dir>/logs/goal-tracker.log`, rotated daily.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(data_dir: &Path) -> AppResult<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "goal-tracker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}
