use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::study_groups as group_service;
use crate::state::AppState;

/// Spawns the background inactivity reaper.
///
/// Runs the same sweep as the cleanup endpoint on a fixed interval, so
/// abandoned live sessions are reclaimed even when no client polls. The
/// task stops when `shutdown` flips, which `main` wires to the server's
/// graceful shutdown.
pub fn spawn(state: AppState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let threshold =
            chrono::Duration::minutes(state.config.inactivity_threshold_minutes);
        let mut ticker =
            tokio::time::interval(Duration::from_secs(state.config.reaper_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately; skip it so the sweep only
        // starts one full interval after boot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match group_service::cleanup_inactive(state.groups.as_ref(), threshold).await {
                        Ok(0) => {
                            tracing::debug!("🧹 Inactivity sweep: nothing to reap");
                        }
                        Ok(deleted) => {
                            tracing::info!("🧹 Inactivity sweep reaped {} groups", deleted);
                        }
                        Err(e) => {
                            tracing::error!("❌ Inactivity sweep failed: {}", e);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Inactivity reaper stopped");
                    break;
                }
            }
        }
    })
}
