//! Background expiration sweep.
//!
//! The worker wakes up on a fixed interval and runs one sweep through a
//! [`SweepGuard`]. The same guard is handed to the operator console, so a
//! manual sweep and a scheduled one never run at the same time: whichever
//! arrives second is skipped. Sweep failures are logged and the worker keeps
//! its schedule.

use crate::{
    config::SchedulerConfig,
    core::{
        expiration::{self, SweepResult},
        settings::SettingsCache,
    },
    errors::Result,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Run-lock shared by every caller that may start a sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepGuard {
    lock: Arc<Mutex<()>>,
}

impl SweepGuard {
    /// Creates an unlocked guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sweep holds the guard right now.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Runs one sweep with the current settings, unless another sweep is in
    /// flight, in which case nothing happens and `Ok(None)` is returned.
    pub async fn run(
        &self,
        db: &DatabaseConnection,
        settings: &SettingsCache,
        dry_run: bool,
    ) -> Result<Option<SweepResult>> {
        let Ok(_running) = self.lock.try_lock() else {
            warn!(dry_run, "Expiration sweep already in progress, skipping");
            return Ok(None);
        };

        let settings = settings.get().await?;
        let result = expiration::sweep_expired_points(db, settings.expiry_days, dry_run).await?;
        Ok(Some(result))
    }
}

/// One scheduled cycle. Errors end here.
async fn run_scheduled_sweep(
    db: &DatabaseConnection,
    settings: &SettingsCache,
    guard: &SweepGuard,
    dry_run: bool,
) {
    match guard.run(db, settings, dry_run).await {
        Ok(Some(result)) if result.customers_affected > 0 => {
            info!(
                customers_affected = result.customers_affected,
                total_points_expired = result.total_points_expired,
                entries_processed = result.entries_processed,
                dry_run,
                "Scheduled expiration sweep complete"
            );
        }
        Ok(Some(_)) => debug!("Scheduled expiration sweep complete, nothing to expire"),
        Ok(None) => {}
        Err(e) => error!(error = %e, "Scheduled expiration sweep failed, retrying next cycle"),
    }
}

/// Starts the sweep worker. Runs until the task is cancelled.
///
/// The first sweep happens immediately; missed ticks are skipped rather than
/// replayed in a burst.
pub async fn start_sweep_worker(
    db: DatabaseConnection,
    settings: Arc<SettingsCache>,
    guard: SweepGuard,
    config: SchedulerConfig,
) {
    if !config.enabled {
        info!("Expiration sweep worker disabled by configuration");
        return;
    }

    let dry_run_msg = if config.dry_run { " (DRY RUN)" } else { "" };
    info!(
        interval_hours = config.interval_hours,
        dry_run = config.dry_run,
        "Starting expiration sweep worker{}",
        dry_run_msg
    );

    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        run_scheduled_sweep(&db, &settings, &guard, config.dry_run).await;
    }
}
