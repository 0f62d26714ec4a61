//! Tiered log manager: the single entry point for capture, read and
//! subscribe access to task output.
//!
//! Reads resolve per stream in tier order:
//! 1. local artifact (this process captured it or previously downloaded it);
//! 2. remote complete object, downloaded to the local path on demand;
//! 3. remote partial snapshot, downloaded to a distinct partial path.
//!
//! Local is assumed fresher than anything remote during active capture, so
//! tier 1 always wins while the artifact exists. A reader attaching after a
//! crash (no complete object anywhere) still sees the last watchdog snapshot
//! through tier 3.
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logtier_model::{CapturedLogData, CapturedLogMetadata, LogKey, StreamSelector};
use logtier_store::{CaptureSink, LocalCaptureStore, RemoteObjectStore};

use crate::config::TierConfig;
use crate::error::{TierError, TierResult};
use crate::subscription::{LogSubscription, SubscriptionRegistry};
use crate::watchdog;

/// Orchestrates the local capture store, the remote object store, the upload
/// watchdog and the subscription registry behind one read/write/subscribe
/// surface.
///
/// Must be constructed inside a tokio runtime: construction spawns the
/// shared subscription poll loop.
pub struct TieredLogManager {
    local: Arc<dyn LocalCaptureStore>,
    remote: Arc<dyn RemoteObjectStore>,
    config: TierConfig,
    pub(crate) subscriptions: SubscriptionRegistry,
}

impl TieredLogManager {
    /// Create a manager over the given stores and start its poll loop.
    pub fn new(
        local: Arc<dyn LocalCaptureStore>,
        remote: Arc<dyn RemoteObjectStore>,
        config: TierConfig,
    ) -> Arc<Self> {
        let subscriptions = SubscriptionRegistry::new(config.poll_interval());
        let manager = Arc::new(Self {
            local,
            remote,
            config,
            subscriptions,
        });
        manager
            .subscriptions
            .spawn_poll_loop(Arc::downgrade(&manager));
        manager
    }

    /// The local capture store backing this manager.
    pub fn local(&self) -> &Arc<dyn LocalCaptureStore> {
        &self.local
    }

    /// The remote object store backing this manager.
    pub fn remote(&self) -> &Arc<dyn RemoteObjectStore> {
        &self.remote
    }

    pub(crate) fn read_chunk_bytes(&self) -> u64 {
        self.config.read_chunk_bytes
    }

    /// Open a capture scope for a key, arming the upload watchdog when an
    /// upload interval is configured.
    ///
    /// Single writer per key: opening a second scope for a key that is
    /// already being captured is undefined behavior.
    pub async fn start_capture(self: &Arc<Self>, key: &LogKey) -> TierResult<ScopedCapture> {
        let sink = self.local.begin_capture(key).await?;
        let cancel = CancellationToken::new();
        match self.config.upload_interval() {
            Some(interval) => {
                watchdog::spawn(Arc::downgrade(self), key.clone(), interval, cancel.clone());
            }
            None => {
                debug!(key = %key, "no upload interval configured; capture is local-only");
            }
        }
        Ok(ScopedCapture {
            manager: Arc::clone(self),
            key: key.clone(),
            sink: Some(sink),
            cancel,
        })
    }

    /// Read both streams past `cursor`, capped at `max_bytes` per stream.
    pub async fn get_log_data(
        &self,
        key: &LogKey,
        cursor: Option<&str>,
        max_bytes: Option<u64>,
    ) -> TierResult<CapturedLogData> {
        let mut cursor = self.local.parse_cursor(cursor)?;
        let mut stdout = None;
        let mut stderr = None;
        for selector in StreamSelector::BOTH {
            let offset = cursor.offset(selector);
            let (data, new_offset) = self.stream_data(key, selector, offset, max_bytes).await?;
            cursor.set_offset(selector, new_offset);
            match selector {
                StreamSelector::Stdout => stdout = data,
                StreamSelector::Stderr => stderr = data,
            }
        }
        Ok(CapturedLogData {
            log_key: key.clone(),
            stdout,
            stderr,
            cursor: self.local.build_cursor(&cursor),
        })
    }

    /// Resolve one stream at one offset through the tier cascade.
    async fn stream_data(
        &self,
        key: &LogKey,
        selector: StreamSelector,
        offset: u64,
        max_bytes: Option<u64>,
    ) -> TierResult<(Option<Vec<u8>>, u64)> {
        let local_path = self.local.local_path(key, selector, false);
        if file_exists(&local_path).await {
            return Ok(self.local.read_path(&local_path, offset, max_bytes).await?);
        }
        if self.remote.has_object(key, selector, false).await? {
            self.remote
                .download(key, selector, false, &local_path)
                .await?;
            debug!(key = %key, stream = %selector, "complete object cached locally");
            return Ok(self.local.read_path(&local_path, offset, max_bytes).await?);
        }
        if self.remote.has_object(key, selector, true).await? {
            let partial_path = self.local.local_path(key, selector, true);
            self.remote
                .download(key, selector, true, &partial_path)
                .await?;
            debug!(key = %key, stream = %selector, "partial snapshot cached locally");
            return Ok(self
                .local
                .read_path(&partial_path, offset, max_bytes)
                .await?);
        }
        Ok((None, offset))
    }

    /// Display paths and download URLs for a key, without fetching data.
    ///
    /// Safe to call regardless of completion state.
    pub fn get_log_metadata(&self, key: &LogKey) -> CapturedLogMetadata {
        CapturedLogMetadata {
            stdout_location: Some(self.remote.display_path(key, StreamSelector::Stdout)),
            stderr_location: Some(self.remote.display_path(key, StreamSelector::Stderr)),
            stdout_download_url: self.remote.download_url(key, StreamSelector::Stdout),
            stderr_download_url: self.remote.download_url(key, StreamSelector::Stderr),
        }
    }

    /// Whether the capture owning this key has been closed.
    ///
    /// Delegates to local bookkeeping; does not require the remote upload to
    /// have succeeded.
    pub fn is_capture_complete(&self, key: &LogKey) -> bool {
        self.local.is_capture_complete(key)
    }

    /// Push a partial snapshot of both streams to the remote store.
    ///
    /// Idempotent and cheap to call repeatedly; no-ops once the capture is
    /// complete. The watchdog calls this on every tick.
    pub async fn on_progress(&self, key: &LogKey) -> TierResult<()> {
        if self.is_capture_complete(key) {
            return Ok(());
        }
        for selector in StreamSelector::BOTH {
            let src = self.local.local_path(key, selector, false);
            if !file_exists(&src).await {
                continue;
            }
            self.remote.upload(key, selector, true, &src).await?;
        }
        Ok(())
    }

    /// Register a live subscription for incremental updates to a key.
    ///
    /// If the key is already complete the receiver yields exactly one final
    /// chunk and closes; otherwise chunks arrive on the poll cadence until
    /// the capture finalizes or [`unsubscribe`](Self::unsubscribe) is called.
    pub async fn subscribe(
        self: &Arc<Self>,
        key: &LogKey,
        cursor: Option<&str>,
    ) -> TierResult<(Arc<LogSubscription>, mpsc::UnboundedReceiver<CapturedLogData>)> {
        let (subscription, rx) =
            LogSubscription::new(key.clone(), cursor.unwrap_or_default().to_string());
        self.subscriptions
            .add_subscription(self, Arc::clone(&subscription))
            .await?;
        Ok((subscription, rx))
    }

    /// Subscribe by run/step pair.
    ///
    /// Resolved into the conventional log key via the local capture store;
    /// bookkeeping is normalized to the log key either way.
    pub async fn subscribe_for_run(
        self: &Arc<Self>,
        run_id: &str,
        step_key: &str,
        cursor: Option<&str>,
    ) -> TierResult<(Arc<LogSubscription>, mpsc::UnboundedReceiver<CapturedLogData>)> {
        let key = self.local.build_log_key(run_id, step_key)?;
        self.subscribe(&key, cursor).await
    }

    /// Deregister and retire a subscription; unknown subscriptions are a
    /// no-op.
    pub fn unsubscribe(&self, subscription: &Arc<LogSubscription>) {
        self.subscriptions.remove_subscription(subscription);
    }

    /// Signal the subscription poll loop to exit.
    pub fn dispose(&self) {
        self.subscriptions.dispose();
    }

    /// Remove all local artifacts and remote objects for a key.
    pub async fn delete_logs(&self, key: &LogKey) -> TierResult<()> {
        self.local.delete_logs(key).await?;
        for selector in StreamSelector::BOTH {
            self.remote.delete_object(key, selector, false).await?;
            self.remote.delete_object(key, selector, true).await?;
        }
        Ok(())
    }

    pub(crate) async fn poll_subscriptions(&self) {
        self.subscriptions.poll_once(self).await;
    }

    /// Finalization: runs after the local capture has been closed.
    ///
    /// Uploads the complete object for both streams (failure propagates to
    /// the capture caller), then drops the superseded partial snapshots
    /// best-effort, then delivers a final fetch to every subscriber of the
    /// key and retires them.
    pub(crate) async fn finalize_capture(&self, key: &LogKey) -> TierResult<()> {
        for selector in StreamSelector::BOTH {
            let src = self.local.local_path(key, selector, false);
            self.remote.upload(key, selector, false, &src).await?;
        }
        for selector in StreamSelector::BOTH {
            if let Err(e) = self.remote.delete_object(key, selector, true).await {
                warn!(key = %key, stream = %selector, error = %e, "failed to delete stale partial object");
            }
        }
        self.subscriptions.notify_subscriptions(self, key).await;
        self.subscriptions.remove_all_subscriptions(key);
        debug!(key = %key, "capture finalized");
        Ok(())
    }
}

/// Scoped write target for one capture session.
///
/// Obtained from [`TieredLogManager::start_capture`]; the scope owns the
/// local append sink and the watchdog's cancellation signal. Call
/// [`finalize`](Self::finalize) when the task is done: it surfaces the final
/// upload error synchronously, the one remote failure that must not be
/// swallowed. Dropping the scope without finalizing disarms the watchdog and
/// leaves the key's data local-only.
pub struct ScopedCapture {
    manager: Arc<TieredLogManager>,
    key: LogKey,
    sink: Option<Box<dyn CaptureSink>>,
    cancel: CancellationToken,
}

impl ScopedCapture {
    /// Key this scope captures for.
    pub fn log_key(&self) -> &LogKey {
        &self.key
    }

    /// Append bytes to one stream of the local artifact.
    pub async fn append(&mut self, selector: StreamSelector, bytes: &[u8]) -> TierResult<()> {
        match self.sink.as_mut() {
            Some(sink) => Ok(sink.append(selector, bytes).await?),
            None => Err(TierError::CaptureFinalized(self.key.clone())),
        }
    }

    /// Flush buffered bytes to local storage.
    pub async fn flush(&mut self) -> TierResult<()> {
        match self.sink.as_mut() {
            Some(sink) => Ok(sink.flush().await?),
            None => Err(TierError::CaptureFinalized(self.key.clone())),
        }
    }

    /// Close the capture: disarm the watchdog, mark the key complete
    /// locally, upload the complete objects and retire subscribers.
    ///
    /// A failed final upload propagates; the key's data then remains
    /// accessible from local storage only.
    pub async fn finalize(mut self) -> TierResult<()> {
        self.cancel.cancel();
        let Some(sink) = self.sink.take() else {
            return Ok(());
        };
        sink.complete().await?;
        self.manager.finalize_capture(&self.key).await
    }
}

impl Drop for ScopedCapture {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.sink.is_some() {
            warn!(key = %self.key, "capture scope dropped without finalize; data remains local-only");
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
