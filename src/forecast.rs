//! Completion forecast.
//!
//! A heuristic, not a fitted projection: current progress is assumed to have
//! been earned linearly over a fixed 30-day reference window, and the remaining
//! percent is extrapolated at that same daily rate. UI copy ("ahead of pace",
//! "behind pace") is tuned to this exact formula.

use crate::calendar::MILLIS_PER_DAY;
use crate::models::Forecast;
use chrono::{DateTime, Utc};

pub const REFERENCE_WINDOW_DAYS: f64 = 30.0;

pub fn forecast(deadline: Option<DateTime<Utc>>, progress_percent: f64) -> Forecast {
    forecast_at(deadline, progress_percent, Utc::now())
}

pub fn forecast_at(
    deadline: Option<DateTime<Utc>>,
    progress_percent: f64,
    now: DateTime<Utc>,
) -> Forecast {
    let Some(deadline) = deadline else {
        return Forecast {
            days_left: None,
            on_track: true,
            projected_days: None,
        };
    };

    let remaining_ms = (deadline - now).num_milliseconds() as f64;
    let days_left = (remaining_ms / MILLIS_PER_DAY as f64).ceil() as i64;

    let projected_days = (progress_percent > 0.0).then(|| {
        let daily_rate = progress_percent / REFERENCE_WINDOW_DAYS;
        ((100.0 - progress_percent) / daily_rate).ceil() as i64
    });

    let on_track = projected_days.map(|days| days <= days_left).unwrap_or(true);

    Forecast {
        days_left: Some(days_left),
        on_track,
        projected_days,
    }
}
