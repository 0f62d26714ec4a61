//! Upload watchdog: timer-driven loop pushing partial snapshots to the
//! remote store while capture is in progress, so a crash or a reader
//! arriving mid-capture still sees recent output.
use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logtier_model::LogKey;

use crate::manager::TieredLogManager;

/// Spawn the watchdog for one capture scope.
///
/// Each tick: sleep the interval, re-check the cancellation signal before any
/// remote I/O, then trigger a partial upload via
/// [`TieredLogManager::on_progress`]. The loop exits when the signal is
/// raised, the manager is gone, or the capture has completed. Shutdown is
/// signal-and-forget: the owner never joins this task.
pub(crate) fn spawn(
    manager: Weak<TieredLogManager>,
    key: LogKey,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(key = %key, interval_ms = interval.as_millis() as u64, "upload watchdog armed");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
            if cancel.is_cancelled() {
                break;
            }
            let Some(manager) = manager.upgrade() else {
                break;
            };
            if manager.is_capture_complete(&key) {
                break;
            }
            if let Err(e) = manager.on_progress(&key).await {
                // a failed tick is superseded by the next one
                warn!(key = %key, error = %e, "partial upload failed");
            }
        }
        debug!(key = %key, "upload watchdog disarmed");
    })
}
