use anyhow::Context;
use goal_tracker_lib::{init_tracing, GoalTracker};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));

    init_tracing(&data_dir).context("failed to initialize logging")?;
    let tracker = GoalTracker::new(data_dir.clone())
        .with_context(|| format!("failed to open goal tracker in {}", data_dir.display()))?;

    if tracker.start_sweeps()? {
        tracing::info!("notification sweeps running");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracker.stop_sweeps();
    tracing::info!("goal tracker shutting down");
    Ok(())
}
