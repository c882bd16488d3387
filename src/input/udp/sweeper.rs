//! Interval sweeper: periodically applies withheld values.

use crate::device::DeviceRegistry;
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Spawn a task that flushes pending values once per `period`.
///
/// The first sweep happens one full period after spawning. The task ends as
/// soon as `cancel` fires; a sweep in progress always completes first since
/// it never yields.
///
/// # Returns
///
/// A `JoinHandle` that resolves once the task has stopped.
pub fn spawn_sweeper(
    registry: Arc<DeviceRegistry>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    // tokio intervals reject a zero period
    let period = period.max(MIN_PERIOD);

    tokio::spawn(async move {
        info!("[Sweeper] Started (every {:?})", period);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    debug!(
                        "[Sweeper] Processing pending updates for {} device(s)",
                        registry.device_count()
                    );
                    registry.flush_pending(Utc::now());
                }
            }
        }

        info!("[Sweeper] Stopped");
    })
}
