//! Subscription registry: coarse fixed-interval polling that delivers
//! incremental log data to live subscribers.
//!
//! Polling is the deliberate trade-off against building a file-watching or
//! push mechanism per storage backend: one shared loop per manager fetches
//! every registered subscription each pass.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logtier_model::{CapturedLogData, LogKey};

use crate::error::TierResult;
use crate::manager::TieredLogManager;

/// Live subscription to incremental updates for one log key.
///
/// Data chunks arrive on the receiver handed out by
/// [`TieredLogManager::subscribe`]; the channel closes once the subscription
/// completes (capture finalized, or explicitly unsubscribed).
pub struct LogSubscription {
    key: LogKey,
    cursor: Mutex<String>,
    sender: Mutex<Option<mpsc::UnboundedSender<CapturedLogData>>>,
    complete: AtomicBool,
}

impl LogSubscription {
    pub(crate) fn new(
        key: LogKey,
        cursor: String,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<CapturedLogData>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = Arc::new(Self {
            key,
            cursor: Mutex::new(cursor),
            sender: Mutex::new(Some(tx)),
            complete: AtomicBool::new(false),
        });
        (subscription, rx)
    }

    /// Key this subscription watches.
    pub fn log_key(&self) -> &LogKey {
        &self.key
    }

    /// Whether the subscription has been retired.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Fetch newly available data past the stored cursor and deliver it.
    ///
    /// Returns `true` if a chunk was delivered.
    pub(crate) async fn fetch(&self, manager: &TieredLogManager) -> TierResult<bool> {
        if self.is_complete() {
            return Ok(false);
        }
        let cursor = {
            let Ok(guard) = self.cursor.lock() else {
                return Ok(false);
            };
            guard.clone()
        };
        let data = manager
            .get_log_data(&self.key, Some(&cursor), Some(manager.read_chunk_bytes()))
            .await?;
        if data.is_empty() {
            return Ok(false);
        }
        if let Ok(mut guard) = self.cursor.lock() {
            *guard = data.cursor.clone();
        }
        if let Ok(guard) = self.sender.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(data);
            }
        }
        Ok(true)
    }

    /// Retire the subscription; idempotent.
    ///
    /// Dropping the sender closes the receiver stream, which is how the
    /// consumer observes completion.
    pub(crate) fn complete(&self) {
        if self.complete.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

/// Bookkeeping for all live subscriptions of one manager.
pub(crate) struct SubscriptionRegistry {
    subscriptions: Mutex<HashMap<String, Vec<Arc<LogSubscription>>>>,
    shutdown: CancellationToken,
    poll_interval: Duration,
}

impl SubscriptionRegistry {
    pub(crate) fn new(poll_interval: Duration) -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            poll_interval,
        }
    }

    /// Stable map key derived from the log key segments.
    fn watch_key(key: &LogKey) -> String {
        serde_json::to_string(key.segments()).unwrap_or_else(|_| key.to_string())
    }

    /// Register a subscription, or short-circuit it if the key is already
    /// complete: one final fetch, immediate retirement, no polling ever.
    pub(crate) async fn add_subscription(
        &self,
        manager: &TieredLogManager,
        subscription: Arc<LogSubscription>,
    ) -> TierResult<()> {
        if manager.is_capture_complete(subscription.log_key()) {
            subscription.fetch(manager).await?;
            subscription.complete();
            return Ok(());
        }
        let watch = Self::watch_key(subscription.log_key());
        if let Ok(mut map) = self.subscriptions.lock() {
            map.entry(watch).or_default().push(subscription);
        }
        Ok(())
    }

    /// Remove one subscription and retire it.
    ///
    /// The lookup key is derived from the subscription's own log key, the
    /// same derivation `add_subscription` uses. Removing a subscription that
    /// was never registered is a no-op.
    pub(crate) fn remove_subscription(&self, subscription: &Arc<LogSubscription>) {
        let watch = Self::watch_key(subscription.log_key());
        let Ok(mut map) = self.subscriptions.lock() else {
            return;
        };
        let Some(list) = map.get_mut(&watch) else {
            return;
        };
        let before = list.len();
        list.retain(|s| !Arc::ptr_eq(s, subscription));
        if list.len() < before {
            subscription.complete();
        }
        if list.is_empty() {
            map.remove(&watch);
        }
    }

    /// Pop every subscription of a key and retire them all.
    ///
    /// Invoked when the key's capture finalizes; a second call finds no
    /// entry and is a no-op.
    pub(crate) fn remove_all_subscriptions(&self, key: &LogKey) {
        let popped = {
            let Ok(mut map) = self.subscriptions.lock() else {
                return;
            };
            map.remove(&Self::watch_key(key))
        };
        let Some(subscriptions) = popped else {
            return;
        };
        debug!(key = %key, count = subscriptions.len(), "retiring subscriptions");
        for subscription in subscriptions {
            subscription.complete();
        }
    }

    /// Immediate fetch pass for one key, outside the regular poll cadence.
    pub(crate) async fn notify_subscriptions(&self, manager: &TieredLogManager, key: &LogKey) {
        let snapshot = {
            let Ok(map) = self.subscriptions.lock() else {
                return;
            };
            map.get(&Self::watch_key(key)).cloned().unwrap_or_default()
        };
        for subscription in snapshot {
            if let Err(e) = subscription.fetch(manager).await {
                warn!(key = %key, error = %e, "subscription fetch failed");
            }
        }
    }

    /// One poll pass over every registered subscription.
    ///
    /// A failing fetch is logged and skipped so one bad subscriber cannot
    /// abort delivery to the rest of the pass.
    pub(crate) async fn poll_once(&self, manager: &TieredLogManager) {
        let snapshot: Vec<Arc<LogSubscription>> = {
            let Ok(map) = self.subscriptions.lock() else {
                return;
            };
            map.values().flatten().cloned().collect()
        };
        for subscription in snapshot {
            if subscription.is_complete() {
                continue;
            }
            match subscription.fetch(manager).await {
                Ok(delivered) => {
                    // a drained, completed key has nothing more to deliver
                    if !delivered && manager.is_capture_complete(subscription.log_key()) {
                        subscription.complete();
                    }
                }
                Err(e) => {
                    warn!(key = %subscription.log_key(), error = %e, "subscription fetch failed");
                }
            }
        }
        if let Ok(mut map) = self.subscriptions.lock() {
            for list in map.values_mut() {
                list.retain(|s| !s.is_complete());
            }
            map.retain(|_, list| !list.is_empty());
        }
    }

    /// Spawn the shared poll loop; it exits within one interval of
    /// [`dispose`](Self::dispose) or of the manager being dropped.
    pub(crate) fn spawn_poll_loop(&self, manager: Weak<TieredLogManager>) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        let interval = self.poll_interval;
        tokio::spawn(async move {
            debug!(interval_ms = interval.as_millis() as u64, "subscription poll loop started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.cancelled() => break,
                }
                if shutdown.is_cancelled() {
                    break;
                }
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.poll_subscriptions().await;
            }
            debug!("subscription poll loop stopped");
        })
    }

    /// Signal the poll loop to exit.
    pub(crate) fn dispose(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::time::timeout;

    use logtier_model::{LogKey, StreamSelector};
    use logtier_store::{FsCaptureStore, FsRemoteStore};

    use crate::config::TierConfig;
    use crate::manager::TieredLogManager;

    const WAIT: Duration = Duration::from_millis(500);

    fn key() -> LogKey {
        LogKey::new(["run-1", "stepA"]).unwrap()
    }

    fn manager_with_fast_poll(dir: &TempDir) -> Arc<TieredLogManager> {
        let local = Arc::new(FsCaptureStore::new(dir.path().join("local")));
        let remote = Arc::new(FsRemoteStore::new(dir.path().join("remote")));
        TieredLogManager::new(local, remote, TierConfig::default().with_poll_interval_ms(20))
    }

    #[tokio::test]
    async fn completed_key_short_circuits_to_a_single_fetch() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_fast_poll(&dir);
        let key = key();

        let mut scope = manager.start_capture(&key).await.unwrap();
        scope
            .append(StreamSelector::Stdout, b"finished output")
            .await
            .unwrap();
        scope.finalize().await.unwrap();

        let (subscription, mut rx) = manager.subscribe(&key, None).await.unwrap();
        assert!(subscription.is_complete());

        let data = rx.recv().await.expect("one final chunk");
        assert_eq!(data.stdout.as_deref(), Some(&b"finished output"[..]));
        // channel must close right after the single delivery
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn poll_loop_delivers_incremental_chunks() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_fast_poll(&dir);
        let key = key();

        let mut scope = manager.start_capture(&key).await.unwrap();
        let (_subscription, mut rx) = manager.subscribe(&key, None).await.unwrap();

        scope.append(StreamSelector::Stdout, b"first ").await.unwrap();
        scope.flush().await.unwrap();
        let data = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(data.stdout.as_deref(), Some(&b"first "[..]));

        scope.append(StreamSelector::Stdout, b"second").await.unwrap();
        scope.flush().await.unwrap();
        let data = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(data.stdout.as_deref(), Some(&b"second"[..]));

        scope.finalize().await.unwrap();
        // retirement closes the stream
        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finalize_flushes_pending_data_before_retiring() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_fast_poll(&dir);
        let key = key();

        let mut scope = manager.start_capture(&key).await.unwrap();
        let (_subscription, mut rx) = manager.subscribe(&key, None).await.unwrap();

        // data written immediately before finalize must still be delivered
        scope.append(StreamSelector::Stdout, b"tail").await.unwrap();
        scope.finalize().await.unwrap();

        let data = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(data.stdout.as_deref(), Some(&b"tail"[..]));
        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn run_addressed_subscription_normalizes_to_the_log_key() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_fast_poll(&dir);
        let key = key();

        let mut scope = manager.start_capture(&key).await.unwrap();
        let (subscription, mut rx) = manager
            .subscribe_for_run("run-1", "stepA", None)
            .await
            .unwrap();
        assert_eq!(subscription.log_key(), &key);

        scope.append(StreamSelector::Stdout, b"by-run").await.unwrap();
        scope.flush().await.unwrap();
        let data = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(data.stdout.as_deref(), Some(&b"by-run"[..]));

        // removal uses the same key derivation as registration
        manager.unsubscribe(&subscription);
        assert!(subscription.is_complete());
    }

    #[tokio::test]
    async fn unsubscribe_retires_and_closes_the_stream() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_fast_poll(&dir);
        let key = key();

        let _scope = manager.start_capture(&key).await.unwrap();
        let (subscription, mut rx) = manager.subscribe(&key, None).await.unwrap();

        manager.unsubscribe(&subscription);
        assert!(subscription.is_complete());
        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());

        // unsubscribing again is a no-op
        manager.unsubscribe(&subscription);
    }

    #[tokio::test]
    async fn remove_all_subscriptions_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_fast_poll(&dir);
        let key = key();

        let _scope = manager.start_capture(&key).await.unwrap();
        let (sub_a, mut rx_a) = manager.subscribe(&key, None).await.unwrap();
        let (sub_b, mut rx_b) = manager.subscribe(&key, None).await.unwrap();

        manager.subscriptions.remove_all_subscriptions(&key);
        assert!(sub_a.is_complete());
        assert!(sub_b.is_complete());
        assert!(timeout(WAIT, rx_a.recv()).await.unwrap().is_none());
        assert!(timeout(WAIT, rx_b.recv()).await.unwrap().is_none());

        manager.subscriptions.remove_all_subscriptions(&key);
    }

    #[tokio::test]
    async fn dispose_stops_delivery() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_fast_poll(&dir);
        let key = key();

        let mut scope = manager.start_capture(&key).await.unwrap();
        let (_subscription, mut rx) = manager.subscribe(&key, None).await.unwrap();
        manager.dispose();
        // give the loop one interval to observe the signal
        tokio::time::sleep(Duration::from_millis(60)).await;

        scope.append(StreamSelector::Stdout, b"late").await.unwrap();
        scope.flush().await.unwrap();
        let res = timeout(Duration::from_millis(120), rx.recv()).await;
        assert!(res.is_err(), "no delivery expected after dispose");
    }
}
