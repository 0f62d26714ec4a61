use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default interval between subscription poll passes (in milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Default per-stream byte cap for one subscription fetch.
pub const DEFAULT_READ_CHUNK_BYTES: u64 = 4 * 1024 * 1024;

/// Tiering configuration for a [`TieredLogManager`](crate::TieredLogManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Interval between watchdog partial uploads (in milliseconds).
    ///
    /// `None` disables tiering entirely: capture behaves as purely local and
    /// no watchdog is armed.
    pub upload_interval_ms: Option<u64>,
    /// Interval between subscription poll passes (in milliseconds).
    pub poll_interval_ms: u64,
    /// Per-stream byte cap applied to each subscription fetch.
    pub read_chunk_bytes: u64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            upload_interval_ms: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
        }
    }
}

impl TierConfig {
    /// Set the watchdog upload interval and return the updated config.
    pub fn with_upload_interval_ms(mut self, ms: u64) -> Self {
        self.upload_interval_ms = Some(ms);
        self
    }

    /// Set the subscription poll interval and return the updated config.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Watchdog upload interval, if tiering is enabled.
    pub fn upload_interval(&self) -> Option<Duration> {
        self.upload_interval_ms.map(Duration::from_millis)
    }

    /// Subscription poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_disables_tiering() {
        let config = TierConfig::default();
        assert!(config.upload_interval().is_none());
        assert_eq!(config.poll_interval(), Duration::from_millis(5_000));
    }

    #[test]
    fn builders_override_intervals() {
        let config = TierConfig::default()
            .with_upload_interval_ms(250)
            .with_poll_interval_ms(100);
        assert_eq!(config.upload_interval(), Some(Duration::from_millis(250)));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let config: TierConfig = serde_json::from_str(r#"{"upload_interval_ms": 1000}"#).unwrap();
        assert_eq!(config.upload_interval_ms, Some(1000));
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.read_chunk_bytes, DEFAULT_READ_CHUNK_BYTES);
    }
}
